// ==========================================
// CSV 数据导入系统 - 领域类型定义
// ==========================================
// 职责: 导入类型、声明编码、字段键、关联类型、自定义字段格式
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 导入类型 (Import Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportType {
    Issue,     // 问题（主记录）
    TimeEntry, // 工时（从属记录）
}

impl ImportType {
    /// 从字符串解析（兼容 "issue" / "time_entry"）
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "issue" => Some(ImportType::Issue),
            "time_entry" | "time-entry" => Some(ImportType::TimeEntry),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ImportType::Issue => "issue",
            ImportType::TimeEntry => "time_entry",
        }
    }

    /// 该导入类型可映射的固定属性
    pub fn attributes(&self) -> &'static [Attribute] {
        match self {
            ImportType::Issue => ISSUE_ATTRIBUTES,
            ImportType::TimeEntry => TIME_ENTRY_ATTRIBUTES,
        }
    }
}

impl fmt::Display for ImportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 声明编码 (Declared Encoding)
// ==========================================
// 上传时由用户声明: U = UTF-8, L1 = ISO-8859-1, L9 = ISO-8859-15
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclaredEncoding {
    #[serde(rename = "U")]
    Utf8,
    #[serde(rename = "L1")]
    Latin1,
    #[serde(rename = "L9")]
    Latin9,
}

impl DeclaredEncoding {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "U" | "UTF8" | "UTF-8" => Some(DeclaredEncoding::Utf8),
            "L1" | "LATIN1" | "ISO-8859-1" => Some(DeclaredEncoding::Latin1),
            "L9" | "LATIN9" | "ISO-8859-15" => Some(DeclaredEncoding::Latin9),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            DeclaredEncoding::Utf8 => "U",
            DeclaredEncoding::Latin1 => "L1",
            DeclaredEncoding::Latin9 => "L9",
        }
    }

    /// 是否为需要转码的单字节旧编码
    pub fn is_legacy(&self) -> bool {
        !matches!(self, DeclaredEncoding::Utf8)
    }
}

impl fmt::Display for DeclaredEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclaredEncoding::Utf8 => write!(f, "UTF-8"),
            DeclaredEncoding::Latin1 => write!(f, "ISO-8859-1"),
            DeclaredEncoding::Latin9 => write!(f, "ISO-8859-15"),
        }
    }
}

// ==========================================
// 固定属性键 (Attribute)
// ==========================================
// 问题与工时共用一个封闭集合，按导入类型各取子集
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    // ===== 问题 =====
    Id,
    Subject,
    AssignedTo,
    FixedVersion,
    Author,
    Description,
    Category,
    Priority,
    Tracker,
    Status,
    StartDate,
    DueDate,
    DoneRatio,
    EstimatedHours,
    ParentIssue,
    Watchers,
    CreatedOn,
    Project,

    // ===== 工时 =====
    IssueId,
    Comments,
    ActivityId,
    SpentOn,
    Hours,
    UserId,
}

pub const ISSUE_ATTRIBUTES: &[Attribute] = &[
    Attribute::Id,
    Attribute::Subject,
    Attribute::AssignedTo,
    Attribute::FixedVersion,
    Attribute::Author,
    Attribute::Description,
    Attribute::Category,
    Attribute::Priority,
    Attribute::Tracker,
    Attribute::Status,
    Attribute::StartDate,
    Attribute::DueDate,
    Attribute::DoneRatio,
    Attribute::EstimatedHours,
    Attribute::ParentIssue,
    Attribute::Watchers,
    Attribute::CreatedOn,
    Attribute::Project,
];

pub const TIME_ENTRY_ATTRIBUTES: &[Attribute] = &[
    Attribute::IssueId,
    Attribute::Comments,
    Attribute::ActivityId,
    Attribute::SpentOn,
    Attribute::Hours,
    Attribute::UserId,
    Attribute::Project,
];

impl Attribute {
    pub fn from_str(s: &str) -> Option<Self> {
        let attr = match s.trim() {
            "id" => Attribute::Id,
            "subject" => Attribute::Subject,
            "assigned_to" => Attribute::AssignedTo,
            "fixed_version" => Attribute::FixedVersion,
            "author" => Attribute::Author,
            "description" => Attribute::Description,
            "category" => Attribute::Category,
            "priority" => Attribute::Priority,
            "tracker" => Attribute::Tracker,
            "status" => Attribute::Status,
            "start_date" => Attribute::StartDate,
            "due_date" => Attribute::DueDate,
            "done_ratio" => Attribute::DoneRatio,
            "estimated_hours" => Attribute::EstimatedHours,
            "parent_issue" => Attribute::ParentIssue,
            "watchers" => Attribute::Watchers,
            "created_on" => Attribute::CreatedOn,
            "project" => Attribute::Project,
            "issue_id" => Attribute::IssueId,
            "comments" => Attribute::Comments,
            "activity_id" => Attribute::ActivityId,
            "spent_on" => Attribute::SpentOn,
            "hours" => Attribute::Hours,
            "user_id" => Attribute::UserId,
            _ => return None,
        };
        Some(attr)
    }

    pub fn key(&self) -> &'static str {
        match self {
            Attribute::Id => "id",
            Attribute::Subject => "subject",
            Attribute::AssignedTo => "assigned_to",
            Attribute::FixedVersion => "fixed_version",
            Attribute::Author => "author",
            Attribute::Description => "description",
            Attribute::Category => "category",
            Attribute::Priority => "priority",
            Attribute::Tracker => "tracker",
            Attribute::Status => "status",
            Attribute::StartDate => "start_date",
            Attribute::DueDate => "due_date",
            Attribute::DoneRatio => "done_ratio",
            Attribute::EstimatedHours => "estimated_hours",
            Attribute::ParentIssue => "parent_issue",
            Attribute::Watchers => "watchers",
            Attribute::CreatedOn => "created_on",
            Attribute::Project => "project",
            Attribute::IssueId => "issue_id",
            Attribute::Comments => "comments",
            Attribute::ActivityId => "activity_id",
            Attribute::SpentOn => "spent_on",
            Attribute::Hours => "hours",
            Attribute::UserId => "user_id",
        }
    }

    /// 对应 issues 表中可做等值过滤的列（唯一字段匹配用）
    ///
    /// 名称类属性（状态、跟踪器等）按外键 id 比较
    pub fn issue_column(&self) -> Option<&'static str> {
        let column = match self {
            Attribute::Id => "id",
            Attribute::Subject => "subject",
            Attribute::AssignedTo => "assigned_to_id",
            Attribute::FixedVersion => "fixed_version_id",
            Attribute::Author => "author_id",
            Attribute::Description => "description",
            Attribute::Category => "category_id",
            Attribute::Priority => "priority_id",
            Attribute::Tracker => "tracker_id",
            Attribute::Status => "status_id",
            Attribute::StartDate => "start_date",
            Attribute::DueDate => "due_date",
            Attribute::DoneRatio => "done_ratio",
            Attribute::EstimatedHours => "estimated_hours",
            Attribute::ParentIssue => "parent_id",
            Attribute::CreatedOn => "created_on",
            Attribute::Project => "project_id",
            _ => return None,
        };
        Some(column)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

// ==========================================
// 问题关联类型 (Relation Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Relates,
    Duplicates,
    Duplicated,
    Blocks,
    Blocked,
    Precedes,
    Follows,
    CopiedTo,
    CopiedFrom,
}

pub const RELATION_TYPES: &[RelationType] = &[
    RelationType::Relates,
    RelationType::Duplicates,
    RelationType::Duplicated,
    RelationType::Blocks,
    RelationType::Blocked,
    RelationType::Precedes,
    RelationType::Follows,
    RelationType::CopiedTo,
    RelationType::CopiedFrom,
];

impl RelationType {
    pub fn from_str(s: &str) -> Option<Self> {
        RELATION_TYPES.iter().copied().find(|t| t.to_db_str() == s.trim())
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            RelationType::Relates => "relates",
            RelationType::Duplicates => "duplicates",
            RelationType::Duplicated => "duplicated",
            RelationType::Blocks => "blocks",
            RelationType::Blocked => "blocked",
            RelationType::Precedes => "precedes",
            RelationType::Follows => "follows",
            RelationType::CopiedTo => "copied_to",
            RelationType::CopiedFrom => "copied_from",
        }
    }

    /// 关联的显示名 i18n 键
    pub fn label_key(&self) -> &'static str {
        match self {
            RelationType::Relates => "relation.relates",
            RelationType::Duplicates => "relation.duplicates",
            RelationType::Duplicated => "relation.duplicated",
            RelationType::Blocks => "relation.blocks",
            RelationType::Blocked => "relation.blocked",
            RelationType::Precedes => "relation.precedes",
            RelationType::Follows => "relation.follows",
            RelationType::CopiedTo => "relation.copied_to",
            RelationType::CopiedFrom => "relation.copied_from",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 自定义字段格式 (Custom Field Format)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomFieldFormat {
    String,
    Text,
    Int,
    Float,
    Date,
    Bool,
    List,
}

impl CustomFieldFormat {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "text" => CustomFieldFormat::Text,
            "int" => CustomFieldFormat::Int,
            "float" => CustomFieldFormat::Float,
            "date" => CustomFieldFormat::Date,
            "bool" => CustomFieldFormat::Bool,
            "list" => CustomFieldFormat::List,
            _ => CustomFieldFormat::String, // 默认值
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            CustomFieldFormat::String => "string",
            CustomFieldFormat::Text => "text",
            CustomFieldFormat::Int => "int",
            CustomFieldFormat::Float => "float",
            CustomFieldFormat::Date => "date",
            CustomFieldFormat::Bool => "bool",
            CustomFieldFormat::List => "list",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_key_roundtrip() {
        for attr in ISSUE_ATTRIBUTES.iter().chain(TIME_ENTRY_ATTRIBUTES) {
            assert_eq!(Attribute::from_str(attr.key()), Some(*attr));
        }
        assert_eq!(Attribute::from_str("unknown"), None);
    }

    #[test]
    fn test_declared_encoding_aliases() {
        assert_eq!(DeclaredEncoding::from_str("L1"), Some(DeclaredEncoding::Latin1));
        assert_eq!(DeclaredEncoding::from_str("iso-8859-15"), Some(DeclaredEncoding::Latin9));
        assert_eq!(DeclaredEncoding::from_str("u"), Some(DeclaredEncoding::Utf8));
        assert_eq!(DeclaredEncoding::from_str("cp1252"), None);
        assert!(!DeclaredEncoding::Utf8.is_legacy());
    }

    #[test]
    fn test_relation_type_parse() {
        assert_eq!(RelationType::from_str("copied_to"), Some(RelationType::CopiedTo));
        assert_eq!(RelationType::from_str("subject"), None);
    }

    #[test]
    fn test_import_type_attributes() {
        assert!(ImportType::Issue.attributes().contains(&Attribute::Subject));
        assert!(!ImportType::TimeEntry.attributes().contains(&Attribute::Subject));
        assert_eq!(ImportType::from_str("time_entry"), Some(ImportType::TimeEntry));
    }
}
