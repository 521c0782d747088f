// ==========================================
// CSV 数据导入系统 - 行导入 Trait
// ==========================================
// 职责: 定义单行导入接口（不包含实现）
// 实现者: IssueImporter（主记录）, TimeEntryImporter（从属记录）
// ==========================================

use crate::domain::outcome::{RowError, RowErrorKind, RowOutcome};
use crate::domain::row::Row;
use crate::domain::types::Attribute;
use crate::i18n;
use crate::importer::data_cleaner::truncate_diagnostic;
use crate::importer::error::ImportResult;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};

/// 落库校验诊断信息保留的字符数
pub const DIAGNOSTIC_MAX_CHARS: usize = 50;

/// 行处理中间步骤：Err 为提前结束该行的结果
pub(crate) type RowStep<T> = Result<T, RowOutcome>;

// ==========================================
// RowImporter Trait
// ==========================================
// 构造即完成映射校验；构造失败返回 ImportError::Configuration，不处理任何行
pub trait RowImporter {
    /// 作业级警告（映射覆盖、无法识别的字段键）
    fn warnings(&self) -> Vec<String>;

    /// 导入一行
    ///
    /// # 返回
    /// - Ok(RowOutcome): 行级结果（失败也以值的形式返回）
    /// - Err: 不可恢复错误（存储不可用等），由协调器整批回滚
    fn import_row(&mut self, row: &Row) -> ImportResult<RowOutcome>;
}

// ==========================================
// 问题导入选项
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueImportOptions {
    /// 更新模式：按唯一字段匹配已有问题
    pub update_issue: bool,
    /// 唯一字段所在的外部列名
    pub unique_field: Option<String>,
    /// 变更说明所在的外部列名
    pub journal_field: Option<String>,
    /// 允许更新其他项目的问题
    pub update_other_project: bool,
    /// 未匹配的行跳过而不是新建
    pub ignore_non_exist: bool,
    /// 未指定跟踪时使用的跟踪 id
    pub default_tracker: Option<i64>,
}

// ==========================================
// 行级失败构造
// ==========================================

pub(crate) fn failure(kind: RowErrorKind, key: &str, args: &[(&str, &str)]) -> RowOutcome {
    RowOutcome::Failed(RowError::new(kind, i18n::t_with_args(key, args)))
}

pub(crate) fn mandatory_missing(attr: Attribute) -> RowOutcome {
    failure(
        RowErrorKind::MandatoryFieldMissing,
        "row.mandatory_missing",
        &[("field", &i18n::field_label(attr.key()))],
    )
}

pub(crate) fn invalid_value(attr: Attribute, value: &str) -> RowOutcome {
    failure(
        RowErrorKind::InvalidValue,
        "row.invalid_value",
        &[("field", &i18n::field_label(attr.key())), ("value", value)],
    )
}

pub(crate) fn not_found(attr: Attribute, value: &str) -> RowOutcome {
    failure(
        RowErrorKind::NotFound,
        "row.record_not_found",
        &[("field", &i18n::field_label(attr.key())), ("value", value)],
    )
}

/// 落库被拒绝（诊断信息截断到 50 字符）
pub(crate) fn rejected(err: &RepositoryError) -> RowOutcome {
    let diagnostic = truncate_diagnostic(&err.to_string(), DIAGNOSTIC_MAX_CHARS);
    failure(
        RowErrorKind::Validation,
        "row.validation",
        &[("message", &diagnostic)],
    )
}
