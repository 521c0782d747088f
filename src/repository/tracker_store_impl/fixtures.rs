// 单元测试共用的种子数据
use super::TrackerStoreImpl;
use crate::db::open_in_memory;
use crate::domain::tracker::Issue;
use std::sync::{Arc, Mutex};

pub(crate) const SEED_SQL: &str = r#"
INSERT INTO projects (id, name) VALUES (1, 'Alpha'), (2, 'Beta');
INSERT INTO trackers (id, name) VALUES (1, 'Bug'), (2, 'Feature');
INSERT INTO issue_statuses (id, name, is_closed, is_default, position)
    VALUES (1, 'New', 0, 1, 1), (2, 'In Progress', 0, 0, 2), (5, 'Closed', 1, 0, 5);
INSERT INTO users (id, login) VALUES (1, 'admin'), (2, 'jsmith');
INSERT INTO enumerations (id, type, name, is_default, position)
    VALUES (4, 'IssuePriority', 'Normal', 1, 2),
           (5, 'IssuePriority', 'High', 0, 3),
           (9, 'TimeEntryActivity', 'Design', 0, 1);
INSERT INTO issue_categories (id, project_id, name) VALUES (1, 1, 'Backend');
INSERT INTO versions (id, project_id, name) VALUES (1, 2, '1.0'), (2, 1, '1.0');
INSERT INTO custom_fields (id, name, field_format, is_required, is_for_all, possible_values)
    VALUES (1, 'External ref', 'string', 0, 1, '[]'),
           (2, 'Severity', 'list', 0, 0, '["Low","High"]');
INSERT INTO custom_fields_projects (custom_field_id, project_id) VALUES (2, 2);
"#;

pub(crate) fn seeded_store() -> TrackerStoreImpl {
    let conn = open_in_memory().unwrap();
    conn.execute_batch(SEED_SQL).unwrap();
    TrackerStoreImpl::from_connection(Arc::new(Mutex::new(conn)))
}

/// 满足校验的新问题（项目 Alpha / Bug / New / Normal / admin）
pub(crate) fn new_issue(subject: &str) -> Issue {
    let mut issue = Issue::new(1);
    issue.subject = subject.to_string();
    issue.tracker_id = Some(1);
    issue.status_id = Some(1);
    issue.priority_id = Some(4);
    issue.author_id = Some(1);
    issue
}

/// 单值查询（断言落库结果用）
pub(crate) fn scalar<T: rusqlite::types::FromSql>(store: &TrackerStoreImpl, sql: &str) -> T {
    let conn = store.get_conn().unwrap();
    conn.query_row(sql, [], |r| r.get(0)).unwrap()
}

/// 与存储共用的连接（作业仓储等）
pub(crate) fn shared_connection(store: &TrackerStoreImpl) -> Arc<Mutex<rusqlite::Connection>> {
    Arc::clone(&store.conn)
}
