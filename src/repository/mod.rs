// ==========================================
// CSV 数据导入系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含导入业务规则
// ==========================================
// 职责: 暂存作业存储 + 目标实体存储，屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod import_job_repo;
pub mod import_job_repo_impl;
pub mod tracker_store;
pub mod tracker_store_impl;

pub use error::{RepositoryError, RepositoryResult};
pub use import_job_repo::{ImportJobRepository, JobPredicate};
pub use import_job_repo_impl::ImportJobRepositoryImpl;
pub use tracker_store::{IssueFilterField, TrackerStore};
pub use tracker_store_impl::TrackerStoreImpl;
