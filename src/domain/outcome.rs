// ==========================================
// CSV 数据导入系统 - 导入结果
// ==========================================
// 用途: 一次导入运行的计数、失败行明细、项目影响统计
// 生命周期: 运行中增量构建，渲染后丢弃
// 不变量: handled == created + updated + skipped + failed
// ==========================================

use crate::domain::row::Row;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ==========================================
// RowErrorKind - 行级错误分类
// ==========================================
// 行级错误以值的形式返回，不中断事务
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowErrorKind {
    MandatoryFieldMissing, // 必填字段为空
    NotFound,              // 引用的记录不存在
    AmbiguousMatch,        // 唯一字段匹配到多条记录
    InvalidValue,          // 单元格值无法解析
    Validation,            // 落库校验失败
}

impl fmt::Display for RowErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowErrorKind::MandatoryFieldMissing => write!(f, "MANDATORY_FIELD_MISSING"),
            RowErrorKind::NotFound => write!(f, "NOT_FOUND"),
            RowErrorKind::AmbiguousMatch => write!(f, "AMBIGUOUS_MATCH"),
            RowErrorKind::InvalidValue => write!(f, "INVALID_VALUE"),
            RowErrorKind::Validation => write!(f, "VALIDATION"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    pub kind: RowErrorKind,
    pub message: String,
}

impl RowError {
    pub fn new(kind: RowErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

// ==========================================
// SkipReason - 跳过原因（计数但不算失败）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    OtherProject, // 匹配到其他项目的记录且不允许跨项目更新
    ClosedIssue,  // 匹配到已关闭记录且未重新打开
    Unmatched,    // 未匹配且设置了忽略
}

// ==========================================
// RowOutcome - 单行处理结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Created { project: String },
    Updated { project: String },
    Skipped(SkipReason),
    Failed(RowError),
    /// 记为失败并终止剩余行（唯一字段歧义匹配）
    Abort { error: RowError, warning: String },
}

/// 批处理循环控制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFlow {
    Continue,
    Stop,
}

// ==========================================
// RowFailure - 失败行
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct RowFailure {
    pub row: Row,
    pub error: RowError,
}

// ==========================================
// ImportOutcome - 导入结果汇总
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    pub handled: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    failures: BTreeMap<usize, RowFailure>,       // 行序号 → 失败行
    affected_projects: BTreeMap<String, usize>,  // 项目名 → 影响行数
    warnings: Vec<String>,
}

impl ImportOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一行的处理结果并返回是否继续
    pub fn record(&mut self, row: &Row, outcome: RowOutcome) -> RowFlow {
        self.handled += 1;
        match outcome {
            RowOutcome::Created { project } => {
                self.created += 1;
                *self.affected_projects.entry(project).or_insert(0) += 1;
            }
            RowOutcome::Updated { project } => {
                self.updated += 1;
                *self.affected_projects.entry(project).or_insert(0) += 1;
            }
            RowOutcome::Skipped(_) => {
                self.skipped += 1;
            }
            RowOutcome::Failed(error) => {
                self.record_failure(row, error);
            }
            RowOutcome::Abort { error, warning } => {
                self.record_failure(row, error);
                self.warnings.push(warning);
                return RowFlow::Stop;
            }
        }
        RowFlow::Continue
    }

    fn record_failure(&mut self, row: &Row, error: RowError) {
        self.failed += 1;
        self.failures.insert(
            row.position(),
            RowFailure {
                row: row.clone(),
                error,
            },
        );
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// 失败行（按行序号升序）
    pub fn failures(&self) -> impl Iterator<Item = &RowFailure> {
        self.failures.values()
    }

    pub fn failure_at(&self, position: usize) -> Option<&RowFailure> {
        self.failures.get(&position)
    }

    /// 由首个失败行重建的表头
    pub fn failed_headers(&self) -> Option<&[String]> {
        self.failures.values().next().map(|f| f.row.headers())
    }

    pub fn affected_projects(&self) -> &BTreeMap<String, usize> {
        &self.affected_projects
    }

    /// 计数不变量
    pub fn is_consistent(&self) -> bool {
        self.handled == self.created + self.updated + self.skipped + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn row(position: usize) -> Row {
        let headers: Arc<[String]> = vec!["subject".to_string()].into();
        Row::new(position, headers, vec![format!("row {}", position)])
    }

    #[test]
    fn test_counters_stay_consistent() {
        let mut outcome = ImportOutcome::new();
        outcome.record(&row(1), RowOutcome::Created { project: "Alpha".to_string() });
        outcome.record(&row(2), RowOutcome::Updated { project: "Alpha".to_string() });
        outcome.record(&row(3), RowOutcome::Skipped(SkipReason::Unmatched));
        outcome.record(
            &row(4),
            RowOutcome::Failed(RowError::new(RowErrorKind::Validation, "bad")),
        );

        assert_eq!(outcome.handled, 4);
        assert!(outcome.is_consistent());
        assert_eq!(outcome.affected_projects().get("Alpha"), Some(&2));
    }

    #[test]
    fn test_abort_stops_and_records_warning() {
        let mut outcome = ImportOutcome::new();
        let flow = outcome.record(
            &row(2),
            RowOutcome::Abort {
                error: RowError::new(RowErrorKind::AmbiguousMatch, "dup"),
                warning: "dup warning".to_string(),
            },
        );

        assert_eq!(flow, RowFlow::Stop);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.warnings(), &["dup warning".to_string()]);
        assert_eq!(
            outcome.failure_at(2).map(|f| f.error.kind),
            Some(RowErrorKind::AmbiguousMatch)
        );
    }

    #[test]
    fn test_failures_sorted_by_position() {
        let mut outcome = ImportOutcome::new();
        for pos in [5, 2, 9] {
            outcome.record(
                &row(pos),
                RowOutcome::Failed(RowError::new(RowErrorKind::InvalidValue, "x")),
            );
        }

        let positions: Vec<usize> = outcome.failures().map(|f| f.row.position()).collect();
        assert_eq!(positions, vec![2, 5, 9]);
        assert_eq!(outcome.failed_headers(), Some(&["subject".to_string()][..]));
    }
}
