// ==========================================
// CSV 数据导入系统 - 目标实体领域模型
// ==========================================
// 职责: 问题（主记录）、工时（从属记录）及其名称查找实体
// 红线: 仅数据结构，不含数据访问逻辑
// ==========================================

use crate::domain::types::{CustomFieldFormat, RelationType};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// 名称查找实体
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracker {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueStatus {
    pub id: i64,
    pub name: String,
    pub is_closed: bool, // 关闭态（关闭的问题默认不参与更新）
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Priority {
    pub id: i64,
    pub name: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueCategory {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntryActivity {
    pub id: i64,
    pub name: String,
}

// ==========================================
// CustomField - 自定义字段定义
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    pub id: i64,
    pub name: String,
    pub field_format: CustomFieldFormat,
    pub is_required: bool,
    pub possible_values: Vec<String>, // 仅 list 格式有效
}

impl CustomField {
    /// 唯一字段别名（cf_<id>），用于匹配提示
    pub fn alias(&self) -> String {
        format!("cf_{}", self.id)
    }
}

// ==========================================
// Issue - 问题（主记录）
// ==========================================
// 对齐: issues 表 + custom_values / watchers / issue_relations
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Issue {
    // ===== 主键 =====
    pub id: Option<i64>, // 新建时可显式指定
    #[serde(skip)]
    pub persisted: bool, // 是否已落库（决定 INSERT / UPDATE）

    // ===== 归属与分类 =====
    pub project_id: i64,
    pub tracker_id: Option<i64>,
    pub status_id: Option<i64>,
    pub priority_id: Option<i64>,
    pub category_id: Option<i64>,
    pub fixed_version_id: Option<i64>,
    pub parent_id: Option<i64>,

    // ===== 人员 =====
    pub author_id: Option<i64>,
    pub assigned_to_id: Option<i64>,

    // ===== 文本 =====
    pub subject: String,
    pub description: Option<String>,

    // ===== 计划 =====
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub done_ratio: i32,
    pub estimated_hours: Option<f64>,

    // ===== 审计 =====
    pub created_on: Option<NaiveDateTime>,

    // ===== 扩展 =====
    pub custom_values: BTreeMap<i64, String>, // custom_field_id → 值
    pub watcher_ids: Vec<i64>,                // 待追加的关注者
    pub relations: Vec<(RelationType, i64)>,  // 待追加的关联（类型, 目标问题）
}

impl Issue {
    pub fn new(project_id: i64) -> Self {
        Self {
            project_id,
            ..Default::default()
        }
    }

    pub fn is_new(&self) -> bool {
        !self.persisted
    }

    /// 与更新前快照比较，生成日志明细（属性 + 自定义字段）
    pub fn changes_since(&self, before: &Issue) -> Vec<JournalDetail> {
        fn opt<T: ToString>(v: &Option<T>) -> Option<String> {
            v.as_ref().map(|x| x.to_string())
        }

        let pairs: Vec<(&str, Option<String>, Option<String>)> = vec![
            ("project_id", Some(before.project_id.to_string()), Some(self.project_id.to_string())),
            ("tracker_id", opt(&before.tracker_id), opt(&self.tracker_id)),
            ("status_id", opt(&before.status_id), opt(&self.status_id)),
            ("priority_id", opt(&before.priority_id), opt(&self.priority_id)),
            ("category_id", opt(&before.category_id), opt(&self.category_id)),
            ("fixed_version_id", opt(&before.fixed_version_id), opt(&self.fixed_version_id)),
            ("parent_id", opt(&before.parent_id), opt(&self.parent_id)),
            ("assigned_to_id", opt(&before.assigned_to_id), opt(&self.assigned_to_id)),
            ("subject", Some(before.subject.clone()), Some(self.subject.clone())),
            ("description", before.description.clone(), self.description.clone()),
            ("start_date", opt(&before.start_date), opt(&self.start_date)),
            ("due_date", opt(&before.due_date), opt(&self.due_date)),
            ("done_ratio", Some(before.done_ratio.to_string()), Some(self.done_ratio.to_string())),
            ("estimated_hours", opt(&before.estimated_hours), opt(&self.estimated_hours)),
        ];

        let mut details: Vec<JournalDetail> = pairs
            .into_iter()
            .filter(|(_, old, new)| old != new)
            .map(|(key, old_value, value)| JournalDetail {
                property: "attr".to_string(),
                prop_key: key.to_string(),
                old_value,
                value,
            })
            .collect();

        for (cf_id, value) in &self.custom_values {
            let old = before.custom_values.get(cf_id);
            if old != Some(value) {
                details.push(JournalDetail {
                    property: "cf".to_string(),
                    prop_key: cf_id.to_string(),
                    old_value: old.cloned(),
                    value: Some(value.clone()),
                });
            }
        }

        details
    }
}

// ==========================================
// Journal - 更新日志（变更说明）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    pub user_id: i64,
    pub notes: String,
    pub details: Vec<JournalDetail>,
}

impl Journal {
    /// 无说明且无明细的日志不落库
    pub fn is_empty(&self) -> bool {
        self.details.is_empty() && self.notes.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalDetail {
    pub property: String,         // attr / cf
    pub prop_key: String,         // 属性名或自定义字段 id
    pub old_value: Option<String>,
    pub value: Option<String>,
}

// ==========================================
// TimeEntry - 工时（从属记录）
// ==========================================
// 对齐: time_entries 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: Option<i64>,
    pub project_id: i64,
    pub issue_id: i64,
    pub user_id: Option<i64>,     // 记录人
    pub activity_id: Option<i64>, // 活动分类
    pub spent_on: NaiveDate,
    pub hours: f64,
    pub comments: Option<String>, // 最长 255 字符
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changes_since_detects_attribute_and_custom_field() {
        let mut before = Issue::new(1);
        before.id = Some(10);
        before.persisted = true;
        before.subject = "Old".to_string();
        before.custom_values.insert(3, "A".to_string());

        let mut after = before.clone();
        after.subject = "New".to_string();
        after.custom_values.insert(3, "B".to_string());

        let details = after.changes_since(&before);

        assert_eq!(details.len(), 2);
        assert_eq!(details[0].prop_key, "subject");
        assert_eq!(details[0].old_value.as_deref(), Some("Old"));
        assert_eq!(details[1].property, "cf");
        assert_eq!(details[1].value.as_deref(), Some("B"));
    }

    #[test]
    fn test_empty_journal() {
        let journal = Journal {
            user_id: 1,
            notes: "   ".to_string(),
            details: vec![],
        };
        assert!(journal.is_empty());
    }
}
