// ==========================================
// CSV 数据导入系统 - 字段映射解析
// ==========================================
// 职责:
// - 将用户声明的 {外部列名 → 内部字段键} 反转为 {内部字段键 → 外部列名}
// - 每个作业开始前对照目标结构解析一次，产出固定属性 / 自定义字段 / 关联类型三类映射
// 规则: 同一内部键被多个列选择时，后出现的列生效（产生警告）
// ==========================================

use crate::domain::row::Row;
use crate::domain::tracker::CustomField;
use crate::domain::types::{Attribute, ImportType, RelationType, RELATION_TYPES};
use crate::i18n;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// FieldKey - 内部字段键
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKey {
    Attribute(Attribute),
    CustomField(i64),
    Relation(RelationType),
}

impl FieldKey {
    /// 解析内部字段键：固定属性 > 关联类型 > 自定义字段（名称或 cf_<id>）
    pub fn resolve(
        key: &str,
        import_type: ImportType,
        custom_fields: &[CustomField],
    ) -> Option<FieldKey> {
        let key = key.trim();
        if let Some(attr) = Attribute::from_str(key) {
            return import_type
                .attributes()
                .contains(&attr)
                .then_some(FieldKey::Attribute(attr));
        }
        if import_type != ImportType::Issue {
            return None;
        }
        if let Some(relation) = RelationType::from_str(key) {
            return Some(FieldKey::Relation(relation));
        }
        custom_fields
            .iter()
            .find(|cf| cf.name == key || cf.alias() == key)
            .map(|cf| FieldKey::CustomField(cf.id))
    }
}

// ==========================================
// ColumnMapping - 反转后的列映射
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMapping {
    by_internal: BTreeMap<String, String>, // 内部键 → 外部列名
    by_external: BTreeMap<String, String>, // 外部列名 → 内部键（仅生效的列）
    warnings: Vec<String>,
}

impl ColumnMapping {
    /// 从 (外部列名, 内部字段键) 对构建；内部键为空的列视为未映射
    pub fn from_pairs<I, E, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (E, K)>,
        E: Into<String>,
        K: Into<String>,
    {
        let mut mapping = ColumnMapping::default();
        for (external, internal) in pairs {
            let external = external.into();
            let internal = internal.into().trim().to_string();
            if internal.is_empty() {
                continue;
            }
            if let Some(previous) = mapping.by_internal.insert(internal.clone(), external.clone()) {
                mapping.by_external.remove(&previous);
                mapping.warnings.push(format!(
                    "Field {} is mapped by both {} and {}; using {}",
                    internal, previous, external, external
                ));
            }
            mapping.by_external.insert(external, internal);
        }
        mapping
    }

    /// 内部键对应的外部列名
    pub fn column_for(&self, internal: &str) -> Option<&str> {
        self.by_internal.get(internal).map(String::as_str)
    }

    /// 外部列名对应的内部键
    pub fn internal_for(&self, column: &str) -> Option<&str> {
        self.by_external.get(column).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_internal
            .iter()
            .map(|(internal, column)| (internal.as_str(), column.as_str()))
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

// ==========================================
// ResolvedMapping - 对照目标结构解析后的映射表
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ResolvedMapping {
    attributes: BTreeMap<Attribute, String>,
    custom_fields: Vec<(CustomField, String)>,
    relations: Vec<(RelationType, String)>,
    unknown: Vec<String>,
}

impl ResolvedMapping {
    pub fn resolve(
        mapping: &ColumnMapping,
        import_type: ImportType,
        custom_fields: &[CustomField],
    ) -> Self {
        let mut resolved = ResolvedMapping::default();
        for (internal, column) in mapping.iter() {
            match FieldKey::resolve(internal, import_type, custom_fields) {
                Some(FieldKey::Attribute(attr)) => {
                    resolved.attributes.insert(attr, column.to_string());
                }
                Some(FieldKey::CustomField(id)) => {
                    if let Some(cf) = custom_fields.iter().find(|cf| cf.id == id) {
                        resolved.custom_fields.push((cf.clone(), column.to_string()));
                    }
                }
                Some(FieldKey::Relation(relation)) => {
                    resolved.relations.push((relation, column.to_string()));
                }
                None => resolved.unknown.push(internal.to_string()),
            }
        }
        resolved
    }

    pub fn column(&self, attr: Attribute) -> Option<&str> {
        self.attributes.get(&attr).map(String::as_str)
    }

    pub fn is_mapped(&self, attr: Attribute) -> bool {
        self.attributes.contains_key(&attr)
    }

    /// 行内该属性的原始值（列未映射返回 None）
    pub fn raw<'r>(&self, row: &'r Row, attr: Attribute) -> Option<&'r str> {
        self.column(attr).and_then(|column| row.raw(column))
    }

    /// 行内该属性的非空值（去除首尾空白）
    pub fn value<'r>(&self, row: &'r Row, attr: Attribute) -> Option<&'r str> {
        self.column(attr)
            .and_then(|column| row.value(column))
            .map(str::trim)
    }

    /// 行内该属性的非空文本（保留原样，用于描述等自由文本）
    pub fn text<'r>(&self, row: &'r Row, attr: Attribute) -> Option<&'r str> {
        self.column(attr).and_then(|column| row.value(column))
    }

    pub fn custom_fields(&self) -> &[(CustomField, String)] {
        &self.custom_fields
    }

    pub fn relations(&self) -> &[(RelationType, String)] {
        &self.relations
    }

    /// 无法识别的内部键（忽略，仅记录）
    pub fn unknown(&self) -> &[String] {
        &self.unknown
    }
}

// ==========================================
// 可选目标字段（映射下拉列表）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub key: String,
    pub label: String,
}

/// 导入类型的可选目标字段，按显示名排序
///
/// 问题: 固定属性 + 项目可用自定义字段 + 关联类型；工时: 固定属性
pub fn available_fields(import_type: ImportType, custom_fields: &[CustomField]) -> Vec<FieldOption> {
    let mut options: Vec<FieldOption> = import_type
        .attributes()
        .iter()
        .map(|attr| FieldOption {
            key: attr.key().to_string(),
            label: i18n::field_label(attr.key()),
        })
        .collect();

    if import_type == ImportType::Issue {
        options.extend(custom_fields.iter().map(|cf| FieldOption {
            key: cf.name.clone(),
            label: cf.name.clone(),
        }));
        options.extend(RELATION_TYPES.iter().map(|relation| FieldOption {
            key: relation.to_db_str().to_string(),
            label: i18n::t(relation.label_key()),
        }));
    }

    options.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.key.cmp(&b.key)));
    options
}
