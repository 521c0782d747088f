// ==========================================
// 名称 / id 查找
// ==========================================

use crate::domain::tracker::{
    CustomField, IssueCategory, IssueStatus, Priority, Project, TimeEntryActivity, Tracker, User,
    Version,
};
use crate::domain::types::CustomFieldFormat;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const CUSTOM_FIELD_COLUMNS: &str =
    "cf.id, cf.name, cf.field_format, cf.is_required, cf.possible_values";

pub(super) fn project_by_id(conn: &Connection, id: i64) -> RepositoryResult<Option<Project>> {
    Ok(conn
        .query_row("SELECT id, name FROM projects WHERE id = ?1", params![id], map_project)
        .optional()?)
}

pub(super) fn project_by_name(conn: &Connection, name: &str) -> RepositoryResult<Option<Project>> {
    Ok(conn
        .query_row("SELECT id, name FROM projects WHERE name = ?1", params![name], map_project)
        .optional()?)
}

fn map_project(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

pub(super) fn tracker_by_id(conn: &Connection, id: i64) -> RepositoryResult<Option<Tracker>> {
    Ok(conn
        .query_row("SELECT id, name FROM trackers WHERE id = ?1", params![id], map_tracker)
        .optional()?)
}

pub(super) fn tracker_by_name(conn: &Connection, name: &str) -> RepositoryResult<Option<Tracker>> {
    Ok(conn
        .query_row("SELECT id, name FROM trackers WHERE name = ?1", params![name], map_tracker)
        .optional()?)
}

fn map_tracker(row: &Row<'_>) -> rusqlite::Result<Tracker> {
    Ok(Tracker {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

pub(super) fn status_by_id(conn: &Connection, id: i64) -> RepositoryResult<Option<IssueStatus>> {
    Ok(conn
        .query_row(
            "SELECT id, name, is_closed FROM issue_statuses WHERE id = ?1",
            params![id],
            map_status,
        )
        .optional()?)
}

pub(super) fn status_by_name(conn: &Connection, name: &str) -> RepositoryResult<Option<IssueStatus>> {
    Ok(conn
        .query_row(
            "SELECT id, name, is_closed FROM issue_statuses WHERE name = ?1",
            params![name],
            map_status,
        )
        .optional()?)
}

/// 默认状态；未标记时取排序最靠前的状态
pub(super) fn default_status(conn: &Connection) -> RepositoryResult<Option<IssueStatus>> {
    Ok(conn
        .query_row(
            r#"
            SELECT id, name, is_closed FROM issue_statuses
            ORDER BY is_default DESC, position ASC, id ASC
            LIMIT 1
            "#,
            [],
            map_status,
        )
        .optional()?)
}

fn map_status(row: &Row<'_>) -> rusqlite::Result<IssueStatus> {
    Ok(IssueStatus {
        id: row.get(0)?,
        name: row.get(1)?,
        is_closed: row.get(2)?,
    })
}

pub(super) fn user_by_id(conn: &Connection, id: i64) -> RepositoryResult<Option<User>> {
    Ok(conn
        .query_row("SELECT id, login FROM users WHERE id = ?1", params![id], map_user)
        .optional()?)
}

pub(super) fn user_by_login(conn: &Connection, login: &str) -> RepositoryResult<Option<User>> {
    Ok(conn
        .query_row("SELECT id, login FROM users WHERE login = ?1", params![login], map_user)
        .optional()?)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        login: row.get(1)?,
    })
}

pub(super) fn priority_by_name(conn: &Connection, name: &str) -> RepositoryResult<Option<Priority>> {
    Ok(conn
        .query_row(
            r#"
            SELECT id, name, is_default FROM enumerations
            WHERE type = 'IssuePriority' AND name = ?1
            "#,
            params![name],
            map_priority,
        )
        .optional()?)
}

pub(super) fn default_priority(conn: &Connection) -> RepositoryResult<Option<Priority>> {
    Ok(conn
        .query_row(
            r#"
            SELECT id, name, is_default FROM enumerations
            WHERE type = 'IssuePriority' AND is_default = 1
            ORDER BY position ASC, id ASC
            LIMIT 1
            "#,
            [],
            map_priority,
        )
        .optional()?)
}

fn map_priority(row: &Row<'_>) -> rusqlite::Result<Priority> {
    Ok(Priority {
        id: row.get(0)?,
        name: row.get(1)?,
        is_default: row.get(2)?,
    })
}

pub(super) fn category_by_name(
    conn: &Connection,
    project_id: i64,
    name: &str,
) -> RepositoryResult<Option<IssueCategory>> {
    Ok(conn
        .query_row(
            "SELECT id, project_id, name FROM issue_categories WHERE project_id = ?1 AND name = ?2",
            params![project_id, name],
            |row| {
                Ok(IssueCategory {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    name: row.get(2)?,
                })
            },
        )
        .optional()?)
}

pub(super) fn version_by_name(
    conn: &Connection,
    project_id: i64,
    name: &str,
) -> RepositoryResult<Option<Version>> {
    Ok(conn
        .query_row(
            r#"
            SELECT id, project_id, name FROM versions
            WHERE name = ?2
            ORDER BY CASE WHEN project_id = ?1 THEN 0 ELSE 1 END, id ASC
            LIMIT 1
            "#,
            params![project_id, name],
            |row| {
                Ok(Version {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    name: row.get(2)?,
                })
            },
        )
        .optional()?)
}

pub(super) fn activity_by_name(
    conn: &Connection,
    name: &str,
) -> RepositoryResult<Option<TimeEntryActivity>> {
    Ok(conn
        .query_row(
            r#"
            SELECT id, name FROM enumerations
            WHERE type = 'TimeEntryActivity' AND name = ?1
            "#,
            params![name],
            |row| {
                Ok(TimeEntryActivity {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?)
}

pub(super) fn activity_exists(conn: &Connection, id: i64) -> RepositoryResult<bool> {
    exists(
        conn,
        "SELECT 1 FROM enumerations WHERE type = 'TimeEntryActivity' AND id = ?1",
        id,
    )
}

pub(super) fn priority_exists(conn: &Connection, id: i64) -> RepositoryResult<bool> {
    exists(
        conn,
        "SELECT 1 FROM enumerations WHERE type = 'IssuePriority' AND id = ?1",
        id,
    )
}

/// 按 id 判断存在性（sql 需以 ?1 接收 id）
pub(super) fn exists(conn: &Connection, sql: &str, id: i64) -> RepositoryResult<bool> {
    Ok(conn
        .query_row(sql, params![id], |_row| Ok(()))
        .optional()?
        .is_some())
}

// ==========================================
// 自定义字段
// ==========================================

/// 项目可用的问题自定义字段（全局字段 + 项目启用的字段）
pub(super) fn issue_custom_fields(
    conn: &Connection,
    project_id: i64,
) -> RepositoryResult<Vec<CustomField>> {
    let sql = format!(
        r#"
        SELECT {cols} FROM custom_fields cf
        WHERE cf.type = 'IssueCustomField'
          AND (cf.is_for_all = 1 OR EXISTS (
              SELECT 1 FROM custom_fields_projects cfp
              WHERE cfp.custom_field_id = cf.id AND cfp.project_id = ?1
          ))
        ORDER BY cf.id ASC
        "#,
        cols = CUSTOM_FIELD_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let raws = stmt
        .query_map(params![project_id], raw_custom_field)?
        .collect::<Result<Vec<_>, _>>()?;
    raws.into_iter().map(RawCustomField::into_domain).collect()
}

pub(super) fn custom_field_by_id(conn: &Connection, id: i64) -> RepositoryResult<Option<CustomField>> {
    let sql = format!(
        "SELECT {cols} FROM custom_fields cf WHERE cf.type = 'IssueCustomField' AND cf.id = ?1",
        cols = CUSTOM_FIELD_COLUMNS
    );
    conn.query_row(&sql, params![id], raw_custom_field)
        .optional()?
        .map(RawCustomField::into_domain)
        .transpose()
}

pub(super) fn issue_ids_by_custom_value(
    conn: &Connection,
    custom_field_id: i64,
    value: &str,
    limit: usize,
) -> RepositoryResult<Vec<i64>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT customized_id FROM custom_values
        WHERE customized_type = 'Issue' AND custom_field_id = ?1 AND value = ?2
        ORDER BY customized_id ASC
        LIMIT ?3
        "#,
    )?;
    let ids = stmt
        .query_map(params![custom_field_id, value, limit as i64], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

struct RawCustomField {
    id: i64,
    name: String,
    field_format: String,
    is_required: bool,
    possible_values: String,
}

fn raw_custom_field(row: &Row<'_>) -> rusqlite::Result<RawCustomField> {
    Ok(RawCustomField {
        id: row.get(0)?,
        name: row.get(1)?,
        field_format: row.get(2)?,
        is_required: row.get(3)?,
        possible_values: row.get(4)?,
    })
}

impl RawCustomField {
    fn into_domain(self) -> RepositoryResult<CustomField> {
        let field_format = CustomFieldFormat::from_str(&self.field_format);
        let possible_values: Vec<String> = serde_json::from_str(&self.possible_values)
            .map_err(|e| RepositoryError::StoredValueError {
                field: "possible_values".to_string(),
                message: e.to_string(),
            })?;

        Ok(CustomField {
            id: self.id,
            name: self.name,
            field_format,
            is_required: self.is_required,
            possible_values,
        })
    }
}
