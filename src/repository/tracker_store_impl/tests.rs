use super::*;
use crate::domain::tracker::JournalDetail;
use crate::domain::types::{Attribute, RelationType};
use chrono::NaiveDate;
use super::fixtures::{new_issue, seeded_store};

#[test]
fn test_defaults_and_lookups() {
    let store = seeded_store();
    assert_eq!(store.default_status().unwrap().unwrap().name, "New");
    assert_eq!(store.default_priority().unwrap().unwrap().id, 4);
    assert!(store.priority_by_name("Design").unwrap().is_none());
    assert_eq!(store.activity_by_name("Design").unwrap().unwrap().id, 9);
    assert_eq!(store.version_by_name(1, "1.0").unwrap().unwrap().id, 2);
    assert_eq!(store.version_by_name(2, "1.0").unwrap().unwrap().id, 1);
}

#[test]
fn test_issue_custom_fields_per_project() {
    let store = seeded_store();
    let alpha: Vec<_> = store.issue_custom_fields(1).unwrap().into_iter().map(|f| f.id).collect();
    let beta: Vec<_> = store.issue_custom_fields(2).unwrap().into_iter().map(|f| f.id).collect();
    assert_eq!(alpha, vec![1]);
    assert_eq!(beta, vec![1, 2]);
    assert_eq!(
        store.custom_field_by_id(2).unwrap().unwrap().possible_values,
        vec!["Low".to_string(), "High".to_string()]
    );
}

#[test]
fn test_save_and_reload_issue() {
    let store = seeded_store();
    let mut issue = new_issue("Fix bug");
    issue.custom_values.insert(1, "EXT-1".to_string());
    issue.start_date = NaiveDate::from_ymd_opt(2026, 1, 5);

    let id = store.save_issue(&issue, None).unwrap();
    let loaded = store.issue_by_id(id).unwrap().unwrap();

    assert!(loaded.persisted);
    assert_eq!(loaded.subject, "Fix bug");
    assert_eq!(loaded.start_date, NaiveDate::from_ymd_opt(2026, 1, 5));
    assert_eq!(loaded.custom_values.get(&1).map(String::as_str), Some("EXT-1"));
    assert_eq!(store.issue_ids_by_custom_value(1, "EXT-1", 2).unwrap(), vec![id]);
}

#[test]
fn test_validation_failure_leaves_no_rows() {
    let store = seeded_store();
    let mut issue = new_issue("");
    issue.done_ratio = 150;

    let err = store.save_issue(&issue, None).unwrap_err();
    assert!(err.is_validation());
    let message = err.to_string();
    assert!(message.contains("Subject cannot be blank"));
    assert!(message.contains("% Done"));

    let conn = store.get_conn().unwrap();
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM issues", [], |r| r.get(0)).unwrap();
    assert_eq!(count, 0);
}

#[test]
fn test_constraint_failure_rolls_back_savepoint() {
    let store = seeded_store();
    let mut issue = new_issue("With watcher");
    // 不存在的用户触发外键失败
    issue.watcher_ids = vec![99];

    let err = store.save_issue(&issue, None).unwrap_err();
    assert!(err.is_validation());

    let conn = store.get_conn().unwrap();
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM issues", [], |r| r.get(0)).unwrap();
    assert_eq!(count, 0);
}

#[test]
fn test_explicit_id_and_duplicate() {
    let store = seeded_store();
    let mut issue = new_issue("Imported");
    issue.id = Some(500);
    assert_eq!(store.save_issue(&issue, None).unwrap(), 500);

    let err = store.save_issue(&issue, None).unwrap_err();
    assert!(err.to_string().contains("Id has already been taken"));
}

#[test]
fn test_update_with_journal_and_relations() {
    let store = seeded_store();
    let first = store.save_issue(&new_issue("First"), None).unwrap();
    let second = store.save_issue(&new_issue("Second"), None).unwrap();

    let before = store.issue_by_id(second).unwrap().unwrap();
    let mut after = before.clone();
    after.subject = "Second (renamed)".to_string();
    after.relations = vec![(RelationType::Blocks, first)];
    after.watcher_ids = vec![2];
    let journal = Journal {
        user_id: 1,
        notes: "imported".to_string(),
        details: after.changes_since(&before),
    };

    assert_eq!(store.save_issue(&after, Some(&journal)).unwrap(), second);

    let conn = store.get_conn().unwrap();
    let detail: (String, String) = conn
        .query_row(
            "SELECT prop_key, value FROM journal_details",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(detail, ("subject".to_string(), "Second (renamed)".to_string()));
    let relation: String = conn
        .query_row("SELECT relation_type FROM issue_relations", [], |r| r.get(0))
        .unwrap();
    assert_eq!(relation, "blocks");
}

#[test]
fn test_empty_journal_not_written() {
    let store = seeded_store();
    let id = store.save_issue(&new_issue("Same"), None).unwrap();
    let issue = store.issue_by_id(id).unwrap().unwrap();
    let journal = Journal {
        user_id: 1,
        notes: String::new(),
        details: Vec::<JournalDetail>::new(),
    };
    store.save_issue(&issue, Some(&journal)).unwrap();

    let conn = store.get_conn().unwrap();
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM journals", [], |r| r.get(0)).unwrap();
    assert_eq!(count, 0);
}

#[test]
fn test_find_open_issues_excludes_closed_and_caps() {
    let store = seeded_store();
    for _ in 0..3 {
        store.save_issue(&new_issue("Dup"), None).unwrap();
    }
    let mut closed = new_issue("Closed one");
    closed.status_id = Some(5);
    store.save_issue(&closed, None).unwrap();

    let dup = store
        .find_open_issues(1, IssueFilterField::Attribute(Attribute::Subject), "Dup", 2)
        .unwrap();
    assert_eq!(dup.len(), 2);

    let none = store
        .find_open_issues(1, IssueFilterField::Attribute(Attribute::Subject), "Closed one", 2)
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn test_find_open_issues_by_custom_field() {
    let store = seeded_store();
    let mut issue = new_issue("Tagged");
    issue.custom_values.insert(1, "K-7".to_string());
    let id = store.save_issue(&issue, None).unwrap();

    let found = store
        .find_open_issues(1, IssueFilterField::CustomField(1), "K-7", 2)
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, Some(id));
}

#[test]
fn test_time_entry_project_must_match_issue() {
    let store = seeded_store();
    let issue_id = store.save_issue(&new_issue("Work"), None).unwrap();
    let mut entry = TimeEntry {
        id: None,
        project_id: 2,
        issue_id,
        user_id: Some(2),
        activity_id: Some(9),
        spent_on: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        hours: 1.5,
        comments: None,
    };
    assert!(store.save_time_entry(&entry).unwrap_err().is_validation());

    entry.project_id = 1;
    assert!(store.save_time_entry(&entry).unwrap() > 0);
}

#[test]
fn test_transaction_rollback_discards_rows() {
    let store = seeded_store();
    store.begin().unwrap();
    store.save_issue(&new_issue("Temp"), None).unwrap();
    store.rollback().unwrap();

    let conn = store.get_conn().unwrap();
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM issues", [], |r| r.get(0)).unwrap();
    assert_eq!(count, 0);
}
