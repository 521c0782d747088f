// ==========================================
// CSV 数据导入系统 - 领域模型层
// ==========================================
// 职责: 定义导入作业、数据行、目标实体、导入结果
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod job;
pub mod outcome;
pub mod row;
pub mod tracker;
pub mod types;

// 重导出核心类型
pub use job::{ImportJob, DEFAULT_RETENTION_DAYS, IMPORT_TIMESTAMP_FORMAT};
pub use outcome::{
    ImportOutcome, RowError, RowErrorKind, RowFailure, RowFlow, RowOutcome, SkipReason,
};
pub use row::Row;
pub use tracker::{
    CustomField, Issue, IssueCategory, IssueStatus, Journal, JournalDetail, Priority, Project,
    TimeEntry, TimeEntryActivity, Tracker, User, Version,
};
pub use types::{Attribute, CustomFieldFormat, DeclaredEncoding, ImportType, RelationType};
