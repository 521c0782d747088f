// ==========================================
// 问题读写
// ==========================================

use crate::domain::tracker::{Issue, Journal};
use crate::repository::error::RepositoryResult;
use crate::repository::tracker_store::IssueFilterField;
use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;

const ISSUE_COLUMNS: &str = r#"
    i.id, i.project_id, i.tracker_id, i.status_id, i.priority_id, i.category_id,
    i.fixed_version_id, i.parent_id, i.author_id, i.assigned_to_id, i.subject,
    i.description, i.start_date, i.due_date, i.done_ratio, i.estimated_hours, i.created_on
"#;

fn map_issue(row: &Row<'_>) -> rusqlite::Result<Issue> {
    Ok(Issue {
        id: Some(row.get(0)?),
        persisted: true,
        project_id: row.get(1)?,
        tracker_id: row.get(2)?,
        status_id: row.get(3)?,
        priority_id: row.get(4)?,
        category_id: row.get(5)?,
        fixed_version_id: row.get(6)?,
        parent_id: row.get(7)?,
        author_id: row.get(8)?,
        assigned_to_id: row.get(9)?,
        subject: row.get(10)?,
        description: row.get(11)?,
        start_date: row.get(12)?,
        due_date: row.get(13)?,
        done_ratio: row.get(14)?,
        estimated_hours: row.get(15)?,
        created_on: row.get(16)?,
        custom_values: BTreeMap::new(),
        watcher_ids: Vec::new(),
        relations: Vec::new(),
    })
}

fn load_custom_values(conn: &Connection, issue: &mut Issue) -> RepositoryResult<()> {
    let Some(id) = issue.id else {
        return Ok(());
    };
    let mut stmt = conn.prepare(
        r#"
        SELECT custom_field_id, value FROM custom_values
        WHERE customized_type = 'Issue' AND customized_id = ?1
        "#,
    )?;
    let values = stmt
        .query_map(params![id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    issue.custom_values = values
        .into_iter()
        .map(|(cf_id, value)| (cf_id, value.unwrap_or_default()))
        .collect();
    Ok(())
}

pub(super) fn issue_by_id(conn: &Connection, id: i64) -> RepositoryResult<Option<Issue>> {
    let sql = format!("SELECT {} FROM issues i WHERE i.id = ?1", ISSUE_COLUMNS);
    let issue = conn.query_row(&sql, params![id], map_issue).optional()?;
    match issue {
        Some(mut issue) => {
            load_custom_values(conn, &mut issue)?;
            Ok(Some(issue))
        }
        None => Ok(None),
    }
}

pub(super) fn issue_exists(conn: &Connection, id: i64) -> RepositoryResult<bool> {
    super::lookup::exists(conn, "SELECT 1 FROM issues WHERE id = ?1", id)
}

/// 项目内未关闭问题的等值过滤
///
/// 不可过滤的属性（如关注者）返回空集
pub(super) fn find_open_issues(
    conn: &Connection,
    project_id: i64,
    field: IssueFilterField,
    value: &str,
    limit: usize,
) -> RepositoryResult<Vec<Issue>> {
    let base = format!(
        r#"
        SELECT {cols} FROM issues i
        JOIN issue_statuses s ON s.id = i.status_id
        "#,
        cols = ISSUE_COLUMNS
    );

    let mut issues = match field {
        IssueFilterField::Attribute(attr) => {
            let Some(column) = attr.issue_column() else {
                return Ok(Vec::new());
            };
            let sql = format!(
                r#"
                {base}
                WHERE i.project_id = ?1 AND s.is_closed = 0
                  AND CAST(i.{column} AS TEXT) = ?2
                ORDER BY i.id ASC
                LIMIT ?3
                "#,
                base = base,
                column = column
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![project_id, value, limit as i64], map_issue)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        IssueFilterField::CustomField(cf_id) => {
            let sql = format!(
                r#"
                {base}
                JOIN custom_values cv
                  ON cv.customized_type = 'Issue'
                 AND cv.customized_id = i.id
                 AND cv.custom_field_id = ?2
                WHERE i.project_id = ?1 AND s.is_closed = 0 AND cv.value = ?3
                ORDER BY i.id ASC
                LIMIT ?4
                "#,
                base = base
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![project_id, cf_id, value, limit as i64], map_issue)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };

    for issue in issues.iter_mut() {
        load_custom_values(conn, issue)?;
    }
    Ok(issues)
}

// ==========================================
// 写入
// ==========================================

/// 写入问题及其附属数据（调用方负责 SAVEPOINT）
pub(super) fn write_issue(
    conn: &Connection,
    issue: &Issue,
    journal: Option<&Journal>,
) -> RepositoryResult<i64> {
    let now = Local::now().naive_local();

    let issue_id = if issue.persisted {
        update_issue_row(conn, issue, now)?
    } else {
        insert_issue_row(conn, issue, now)?
    };

    for (cf_id, value) in &issue.custom_values {
        conn.execute(
            r#"
            INSERT INTO custom_values (customized_type, customized_id, custom_field_id, value)
            VALUES ('Issue', ?1, ?2, ?3)
            ON CONFLICT (customized_type, customized_id, custom_field_id)
            DO UPDATE SET value = excluded.value
            "#,
            params![issue_id, cf_id, value],
        )?;
    }

    for user_id in &issue.watcher_ids {
        conn.execute(
            r#"
            INSERT OR IGNORE INTO watchers (watchable_type, watchable_id, user_id)
            VALUES ('Issue', ?1, ?2)
            "#,
            params![issue_id, user_id],
        )?;
    }

    for (relation_type, other_id) in &issue.relations {
        conn.execute(
            r#"
            INSERT OR IGNORE INTO issue_relations (issue_from_id, issue_to_id, relation_type)
            VALUES (?1, ?2, ?3)
            "#,
            params![issue_id, other_id, relation_type.to_db_str()],
        )?;
    }

    if let Some(journal) = journal.filter(|j| !j.is_empty()) {
        insert_journal(conn, issue_id, journal, now)?;
    }

    Ok(issue_id)
}

fn insert_issue_row(conn: &Connection, issue: &Issue, now: NaiveDateTime) -> RepositoryResult<i64> {
    conn.execute(
        r#"
        INSERT INTO issues (
            id, project_id, tracker_id, status_id, priority_id, author_id, assigned_to_id,
            category_id, fixed_version_id, parent_id, subject, description, start_date,
            due_date, done_ratio, estimated_hours, created_on, updated_on
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
        "#,
        params![
            issue.id,
            issue.project_id,
            issue.tracker_id,
            issue.status_id,
            issue.priority_id,
            issue.author_id,
            issue.assigned_to_id,
            issue.category_id,
            issue.fixed_version_id,
            issue.parent_id,
            issue.subject,
            issue.description,
            issue.start_date,
            issue.due_date,
            issue.done_ratio,
            issue.estimated_hours,
            issue.created_on.unwrap_or(now),
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn update_issue_row(conn: &Connection, issue: &Issue, now: NaiveDateTime) -> RepositoryResult<i64> {
    let id = issue.id.unwrap_or_default();
    conn.execute(
        r#"
        UPDATE issues SET
            project_id = ?2, tracker_id = ?3, status_id = ?4, priority_id = ?5,
            assigned_to_id = ?6, category_id = ?7, fixed_version_id = ?8, parent_id = ?9,
            subject = ?10, description = ?11, start_date = ?12, due_date = ?13,
            done_ratio = ?14, estimated_hours = ?15, updated_on = ?16
        WHERE id = ?1
        "#,
        params![
            id,
            issue.project_id,
            issue.tracker_id,
            issue.status_id,
            issue.priority_id,
            issue.assigned_to_id,
            issue.category_id,
            issue.fixed_version_id,
            issue.parent_id,
            issue.subject,
            issue.description,
            issue.start_date,
            issue.due_date,
            issue.done_ratio,
            issue.estimated_hours,
            now,
        ],
    )?;
    Ok(id)
}

fn insert_journal(
    conn: &Connection,
    issue_id: i64,
    journal: &Journal,
    now: NaiveDateTime,
) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT INTO journals (journalized_id, user_id, notes, created_on)
        VALUES (?1, ?2, ?3, ?4)
        "#,
        params![issue_id, journal.user_id, journal.notes, now],
    )?;
    let journal_id = conn.last_insert_rowid();

    let mut stmt = conn.prepare(
        r#"
        INSERT INTO journal_details (journal_id, property, prop_key, old_value, value)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )?;
    for detail in &journal.details {
        stmt.execute(params![
            journal_id,
            detail.property,
            detail.prop_key,
            detail.old_value,
            detail.value,
        ])?;
    }
    Ok(())
}
