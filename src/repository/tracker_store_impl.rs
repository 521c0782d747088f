// ==========================================
// CSV 数据导入系统 - 目标实体存储实现
// ==========================================
// 职责: 实现 TrackerStore（使用 rusqlite）
// 说明:
// - 批次事务由 begin/commit/rollback 显式控制
// - 每次落库使用 SAVEPOINT，校验或约束失败只撤销当前行
// ==========================================

mod issue;
mod lookup;
mod time_entry;
mod validation;

use crate::domain::tracker::{
    CustomField, Issue, IssueCategory, IssueStatus, Journal, Priority, Project, TimeEntry,
    TimeEntryActivity, Tracker, User, Version,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::tracker_store::{IssueFilterField, TrackerStore};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// TrackerStoreImpl
// ==========================================
pub struct TrackerStoreImpl {
    conn: Arc<Mutex<Connection>>,
}

impl TrackerStoreImpl {
    /// 从已有连接创建存储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

/// 在 SAVEPOINT 内执行写操作
///
/// 失败时回到保存点；约束冲突按业务校验失败处理
fn within_savepoint<T>(
    conn: &Connection,
    name: &str,
    write: impl FnOnce(&Connection) -> RepositoryResult<T>,
) -> RepositoryResult<T> {
    conn.execute_batch(&format!("SAVEPOINT {}", name))?;
    match write(conn) {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {}", name))?;
            Ok(value)
        }
        Err(err) => {
            conn.execute_batch(&format!("ROLLBACK TO {0}; RELEASE {0}", name))?;
            Err(match err {
                RepositoryError::UniqueConstraintViolation(msg)
                | RepositoryError::ForeignKeyViolation(msg) => RepositoryError::ValidationError(msg),
                other => other,
            })
        }
    }
}

impl TrackerStore for TrackerStoreImpl {
    // ===== 事务 =====

    fn begin(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))
    }

    fn commit(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch("COMMIT")
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))
    }

    fn rollback(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        if conn.is_autocommit() {
            return Ok(());
        }
        conn.execute_batch("ROLLBACK")
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))
    }

    // ===== 名称 / id 查找 =====

    fn project_by_id(&self, id: i64) -> RepositoryResult<Option<Project>> {
        lookup::project_by_id(&*self.get_conn()?, id)
    }

    fn project_by_name(&self, name: &str) -> RepositoryResult<Option<Project>> {
        lookup::project_by_name(&*self.get_conn()?, name)
    }

    fn tracker_by_id(&self, id: i64) -> RepositoryResult<Option<Tracker>> {
        lookup::tracker_by_id(&*self.get_conn()?, id)
    }

    fn tracker_by_name(&self, name: &str) -> RepositoryResult<Option<Tracker>> {
        lookup::tracker_by_name(&*self.get_conn()?, name)
    }

    fn status_by_id(&self, id: i64) -> RepositoryResult<Option<IssueStatus>> {
        lookup::status_by_id(&*self.get_conn()?, id)
    }

    fn status_by_name(&self, name: &str) -> RepositoryResult<Option<IssueStatus>> {
        lookup::status_by_name(&*self.get_conn()?, name)
    }

    fn default_status(&self) -> RepositoryResult<Option<IssueStatus>> {
        lookup::default_status(&*self.get_conn()?)
    }

    fn user_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        lookup::user_by_id(&*self.get_conn()?, id)
    }

    fn user_by_login(&self, login: &str) -> RepositoryResult<Option<User>> {
        lookup::user_by_login(&*self.get_conn()?, login)
    }

    fn priority_by_name(&self, name: &str) -> RepositoryResult<Option<Priority>> {
        lookup::priority_by_name(&*self.get_conn()?, name)
    }

    fn default_priority(&self) -> RepositoryResult<Option<Priority>> {
        lookup::default_priority(&*self.get_conn()?)
    }

    fn category_by_name(&self, project_id: i64, name: &str) -> RepositoryResult<Option<IssueCategory>> {
        lookup::category_by_name(&*self.get_conn()?, project_id, name)
    }

    fn version_by_name(&self, project_id: i64, name: &str) -> RepositoryResult<Option<Version>> {
        lookup::version_by_name(&*self.get_conn()?, project_id, name)
    }

    fn activity_by_name(&self, name: &str) -> RepositoryResult<Option<TimeEntryActivity>> {
        lookup::activity_by_name(&*self.get_conn()?, name)
    }

    // ===== 自定义字段 =====

    fn issue_custom_fields(&self, project_id: i64) -> RepositoryResult<Vec<CustomField>> {
        lookup::issue_custom_fields(&*self.get_conn()?, project_id)
    }

    fn custom_field_by_id(&self, id: i64) -> RepositoryResult<Option<CustomField>> {
        lookup::custom_field_by_id(&*self.get_conn()?, id)
    }

    fn issue_ids_by_custom_value(
        &self,
        custom_field_id: i64,
        value: &str,
        limit: usize,
    ) -> RepositoryResult<Vec<i64>> {
        lookup::issue_ids_by_custom_value(&*self.get_conn()?, custom_field_id, value, limit)
    }

    // ===== 问题 =====

    fn issue_by_id(&self, id: i64) -> RepositoryResult<Option<Issue>> {
        issue::issue_by_id(&*self.get_conn()?, id)
    }

    fn find_open_issues(
        &self,
        project_id: i64,
        field: IssueFilterField,
        value: &str,
        limit: usize,
    ) -> RepositoryResult<Vec<Issue>> {
        issue::find_open_issues(&*self.get_conn()?, project_id, field, value, limit)
    }

    fn save_issue(&self, issue: &Issue, journal: Option<&Journal>) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        validation::validate_issue(&conn, issue)?;
        within_savepoint(&conn, "save_issue", |c| issue::write_issue(c, issue, journal))
    }

    fn save_time_entry(&self, entry: &TimeEntry) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        validation::validate_time_entry(&conn, entry)?;
        within_savepoint(&conn, "save_time_entry", |c| time_entry::insert_time_entry(c, entry))
    }
}

#[cfg(test)]
pub(crate) mod fixtures;
#[cfg(test)]
mod tests;
