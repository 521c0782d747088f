// ==========================================
// 工时写入
// ==========================================

use crate::domain::tracker::TimeEntry;
use crate::repository::error::RepositoryResult;
use chrono::Local;
use rusqlite::{params, Connection};

pub(super) fn insert_time_entry(conn: &Connection, entry: &TimeEntry) -> RepositoryResult<i64> {
    conn.execute(
        r#"
        INSERT INTO time_entries (
            project_id, issue_id, user_id, activity_id, spent_on, hours, comments, created_on
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            entry.project_id,
            entry.issue_id,
            entry.user_id,
            entry.activity_id,
            entry.spent_on,
            entry.hours,
            entry.comments,
            Local::now().naive_local(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}
