// ==========================================
// 落库前业务校验
// ==========================================
// 返回: 所有违规项以 ", " 拼接为一条 ValidationError
// ==========================================

use super::issue::issue_exists;
use super::lookup;
use crate::domain::tracker::{CustomField, Issue, TimeEntry};
use crate::domain::types::CustomFieldFormat;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::Connection;

pub const SUBJECT_MAX_CHARS: usize = 255;
pub const COMMENTS_MAX_CHARS: usize = 255;
pub const HOURS_UPPER_BOUND: f64 = 1000.0;

fn finish(errors: Vec<String>) -> RepositoryResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(RepositoryError::ValidationError(errors.join(", ")))
    }
}

/// 必填引用: None → 不能为空；不存在 → 无效
fn check_reference(
    errors: &mut Vec<String>,
    label: &str,
    id: Option<i64>,
    exists: impl FnOnce(i64) -> RepositoryResult<bool>,
) -> RepositoryResult<()> {
    match id {
        None => errors.push(format!("{} cannot be blank", label)),
        Some(id) => {
            if !exists(id)? {
                errors.push(format!("{} is invalid", label));
            }
        }
    }
    Ok(())
}

/// 可选引用: 仅在有值时校验存在性
fn check_optional_reference(
    errors: &mut Vec<String>,
    label: &str,
    id: Option<i64>,
    exists: impl FnOnce(i64) -> RepositoryResult<bool>,
) -> RepositoryResult<()> {
    if id.is_some() {
        check_reference(errors, label, id, exists)?;
    }
    Ok(())
}

pub(super) fn validate_issue(conn: &Connection, issue: &Issue) -> RepositoryResult<()> {
    let mut errors = Vec::new();

    if issue.subject.trim().is_empty() {
        errors.push("Subject cannot be blank".to_string());
    } else if issue.subject.chars().count() > SUBJECT_MAX_CHARS {
        errors.push(format!(
            "Subject is too long (maximum is {} characters)",
            SUBJECT_MAX_CHARS
        ));
    }

    if lookup::project_by_id(conn, issue.project_id)?.is_none() {
        errors.push("Project is invalid".to_string());
    }
    check_reference(&mut errors, "Tracker", issue.tracker_id, |id| {
        Ok(lookup::tracker_by_id(conn, id)?.is_some())
    })?;
    check_reference(&mut errors, "Status", issue.status_id, |id| {
        Ok(lookup::status_by_id(conn, id)?.is_some())
    })?;
    check_reference(&mut errors, "Priority", issue.priority_id, |id| {
        lookup::priority_exists(conn, id)
    })?;
    check_reference(&mut errors, "Author", issue.author_id, |id| {
        Ok(lookup::user_by_id(conn, id)?.is_some())
    })?;
    check_optional_reference(&mut errors, "Assignee", issue.assigned_to_id, |id| {
        Ok(lookup::user_by_id(conn, id)?.is_some())
    })?;
    check_optional_reference(&mut errors, "Category", issue.category_id, |id| {
        lookup::exists(conn, "SELECT 1 FROM issue_categories WHERE id = ?1", id)
    })?;
    check_optional_reference(&mut errors, "Target version", issue.fixed_version_id, |id| {
        lookup::exists(conn, "SELECT 1 FROM versions WHERE id = ?1", id)
    })?;

    if !(0..=100).contains(&issue.done_ratio) {
        errors.push("% Done is not included in the list".to_string());
    }
    if issue.estimated_hours.is_some_and(|h| h < 0.0 || !h.is_finite()) {
        errors.push("Estimated time is invalid".to_string());
    }
    if let (Some(start), Some(due)) = (issue.start_date, issue.due_date) {
        if due < start {
            errors.push("Due date must be greater than start date".to_string());
        }
    }

    if let Some(parent_id) = issue.parent_id {
        if issue.id == Some(parent_id) || !issue_exists(conn, parent_id)? {
            errors.push("Parent task is invalid".to_string());
        }
    }

    if !issue.persisted {
        if let Some(id) = issue.id {
            if issue_exists(conn, id)? {
                errors.push("Id has already been taken".to_string());
            }
        }
    }

    for (relation_type, other_id) in &issue.relations {
        if issue.id == Some(*other_id) || !issue_exists(conn, *other_id)? {
            errors.push(format!("Related issue ({}) is invalid", relation_type));
        }
    }

    for field in lookup::issue_custom_fields(conn, issue.project_id)? {
        if let Some(message) = check_custom_value(&field, issue.custom_values.get(&field.id)) {
            errors.push(message);
        }
    }

    finish(errors)
}

/// 单个自定义字段值的格式校验
pub(super) fn check_custom_value(field: &CustomField, value: Option<&String>) -> Option<String> {
    let value = value.map(|v| v.trim()).unwrap_or("");
    if value.is_empty() {
        return field
            .is_required
            .then(|| format!("{} cannot be blank", field.name));
    }

    let valid = match field.field_format {
        CustomFieldFormat::String | CustomFieldFormat::Text => true,
        CustomFieldFormat::Int => value.parse::<i64>().is_ok(),
        CustomFieldFormat::Float => value.parse::<f64>().is_ok_and(|f| f.is_finite()),
        CustomFieldFormat::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        CustomFieldFormat::Bool => value == "0" || value == "1",
        CustomFieldFormat::List => field.possible_values.iter().any(|v| v == value),
    };

    if valid {
        None
    } else if field.field_format == CustomFieldFormat::List {
        Some(format!("{} is not included in the list", field.name))
    } else {
        Some(format!("{} is invalid", field.name))
    }
}

pub(super) fn validate_time_entry(conn: &Connection, entry: &TimeEntry) -> RepositoryResult<()> {
    let mut errors = Vec::new();

    match super::issue::issue_by_id(conn, entry.issue_id)? {
        None => errors.push("Issue is invalid".to_string()),
        Some(issue) if issue.project_id != entry.project_id => {
            errors.push("Issue does not belong to the project".to_string())
        }
        Some(_) => {}
    }

    check_reference(&mut errors, "User", entry.user_id, |id| {
        Ok(lookup::user_by_id(conn, id)?.is_some())
    })?;
    check_reference(&mut errors, "Activity", entry.activity_id, |id| {
        lookup::activity_exists(conn, id)
    })?;

    if !(entry.hours >= 0.0 && entry.hours < HOURS_UPPER_BOUND) {
        errors.push("Hours is invalid".to_string());
    }
    if entry
        .comments
        .as_deref()
        .is_some_and(|c| c.chars().count() > COMMENTS_MAX_CHARS)
    {
        errors.push(format!(
            "Comment is too long (maximum is {} characters)",
            COMMENTS_MAX_CHARS
        ));
    }

    finish(errors)
}
