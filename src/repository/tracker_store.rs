// ==========================================
// CSV 数据导入系统 - 目标实体存储 Trait
// ==========================================
// 职责: 定义导入流程所需的目标实体查找/过滤/落库接口
// 约定:
// - 查找类方法未命中返回 Ok(None)，不报错
// - 落库方法遇到业务校验失败返回 RepositoryError::ValidationError（行级可恢复）
// - 其他错误视为不可恢复，由批处理协调器整体回滚
// ==========================================

use crate::domain::tracker::{
    CustomField, Issue, IssueCategory, IssueStatus, Journal, Priority, Project, TimeEntry,
    TimeEntryActivity, Tracker, User, Version,
};
use crate::domain::types::Attribute;
use crate::repository::error::RepositoryResult;

/// 唯一字段过滤条件的目标列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueFilterField {
    Attribute(Attribute),
    CustomField(i64),
}

// ==========================================
// TrackerStore Trait
// ==========================================
// 实现者: TrackerStoreImpl（使用 rusqlite）
pub trait TrackerStore {
    // ===== 事务 =====

    /// 开启批次事务
    fn begin(&self) -> RepositoryResult<()>;

    /// 提交批次事务
    fn commit(&self) -> RepositoryResult<()>;

    /// 回滚批次事务
    fn rollback(&self) -> RepositoryResult<()>;

    // ===== 名称 / id 查找 =====

    fn project_by_id(&self, id: i64) -> RepositoryResult<Option<Project>>;
    fn project_by_name(&self, name: &str) -> RepositoryResult<Option<Project>>;
    fn tracker_by_id(&self, id: i64) -> RepositoryResult<Option<Tracker>>;
    fn tracker_by_name(&self, name: &str) -> RepositoryResult<Option<Tracker>>;
    fn status_by_id(&self, id: i64) -> RepositoryResult<Option<IssueStatus>>;
    fn status_by_name(&self, name: &str) -> RepositoryResult<Option<IssueStatus>>;
    fn default_status(&self) -> RepositoryResult<Option<IssueStatus>>;
    fn user_by_id(&self, id: i64) -> RepositoryResult<Option<User>>;
    fn user_by_login(&self, login: &str) -> RepositoryResult<Option<User>>;
    fn priority_by_name(&self, name: &str) -> RepositoryResult<Option<Priority>>;
    fn default_priority(&self) -> RepositoryResult<Option<Priority>>;
    fn category_by_name(&self, project_id: i64, name: &str) -> RepositoryResult<Option<IssueCategory>>;

    /// 版本按名称查找（优先匹配给定项目）
    fn version_by_name(&self, project_id: i64, name: &str) -> RepositoryResult<Option<Version>>;
    fn activity_by_name(&self, name: &str) -> RepositoryResult<Option<TimeEntryActivity>>;

    // ===== 自定义字段 =====

    /// 项目可用的问题自定义字段
    fn issue_custom_fields(&self, project_id: i64) -> RepositoryResult<Vec<CustomField>>;
    fn custom_field_by_id(&self, id: i64) -> RepositoryResult<Option<CustomField>>;

    /// 自定义字段值等于 value 的问题 id（最多 limit 条）
    fn issue_ids_by_custom_value(
        &self,
        custom_field_id: i64,
        value: &str,
        limit: usize,
    ) -> RepositoryResult<Vec<i64>>;

    // ===== 问题 =====

    fn issue_by_id(&self, id: i64) -> RepositoryResult<Option<Issue>>;

    /// 在项目内未关闭的问题中按字段等值过滤（最多 limit 条）
    fn find_open_issues(
        &self,
        project_id: i64,
        field: IssueFilterField,
        value: &str,
        limit: usize,
    ) -> RepositoryResult<Vec<Issue>>;

    /// 新建或更新问题（含自定义字段、关注者、关联、变更日志）
    ///
    /// # 返回
    /// - Ok(i64): 问题 id
    /// - Err(ValidationError): 业务校验失败，未写入任何数据
    fn save_issue(&self, issue: &Issue, journal: Option<&Journal>) -> RepositoryResult<i64>;

    /// 新建工时
    fn save_time_entry(&self, entry: &TimeEntry) -> RepositoryResult<i64>;
}
