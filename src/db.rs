// ==========================================
// CSV 数据导入系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供建库脚本（目标实体表 + 暂存作业表 + 配置表）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::path::PathBuf;
use std::time::Duration;

/// 显式指定数据库路径的环境变量
pub const DB_PATH_ENV: &str = "CSV_IMPORTER_DB_PATH";

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 建库脚本（幂等）
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS trackers (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS issue_statuses (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    is_closed INTEGER NOT NULL DEFAULT 0,
    is_default INTEGER NOT NULL DEFAULT 0,
    position INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    login TEXT NOT NULL UNIQUE
);

-- type: IssuePriority / TimeEntryActivity
CREATE TABLE IF NOT EXISTS enumerations (
    id INTEGER PRIMARY KEY,
    type TEXT NOT NULL,
    name TEXT NOT NULL,
    is_default INTEGER NOT NULL DEFAULT 0,
    position INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS issue_categories (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL REFERENCES projects(id),
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS versions (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL REFERENCES projects(id),
    name TEXT NOT NULL
);

-- type: IssueCustomField（其他类型不参与导入）
CREATE TABLE IF NOT EXISTS custom_fields (
    id INTEGER PRIMARY KEY,
    type TEXT NOT NULL DEFAULT 'IssueCustomField',
    name TEXT NOT NULL,
    field_format TEXT NOT NULL DEFAULT 'string',
    is_required INTEGER NOT NULL DEFAULT 0,
    is_for_all INTEGER NOT NULL DEFAULT 1,
    possible_values TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS custom_fields_projects (
    custom_field_id INTEGER NOT NULL REFERENCES custom_fields(id),
    project_id INTEGER NOT NULL REFERENCES projects(id),
    PRIMARY KEY (custom_field_id, project_id)
);

CREATE TABLE IF NOT EXISTS issues (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL REFERENCES projects(id),
    tracker_id INTEGER NOT NULL REFERENCES trackers(id),
    status_id INTEGER NOT NULL REFERENCES issue_statuses(id),
    priority_id INTEGER NOT NULL REFERENCES enumerations(id),
    author_id INTEGER NOT NULL REFERENCES users(id),
    assigned_to_id INTEGER REFERENCES users(id),
    category_id INTEGER REFERENCES issue_categories(id),
    fixed_version_id INTEGER REFERENCES versions(id),
    parent_id INTEGER REFERENCES issues(id),
    subject TEXT NOT NULL,
    description TEXT,
    start_date TEXT,
    due_date TEXT,
    done_ratio INTEGER NOT NULL DEFAULT 0,
    estimated_hours REAL,
    created_on TEXT NOT NULL,
    updated_on TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS custom_values (
    id INTEGER PRIMARY KEY,
    customized_type TEXT NOT NULL,
    customized_id INTEGER NOT NULL,
    custom_field_id INTEGER NOT NULL REFERENCES custom_fields(id),
    value TEXT,
    UNIQUE (customized_type, customized_id, custom_field_id)
);

CREATE TABLE IF NOT EXISTS watchers (
    id INTEGER PRIMARY KEY,
    watchable_type TEXT NOT NULL,
    watchable_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id),
    UNIQUE (watchable_type, watchable_id, user_id)
);

CREATE TABLE IF NOT EXISTS issue_relations (
    id INTEGER PRIMARY KEY,
    issue_from_id INTEGER NOT NULL REFERENCES issues(id),
    issue_to_id INTEGER NOT NULL REFERENCES issues(id),
    relation_type TEXT NOT NULL,
    UNIQUE (issue_from_id, issue_to_id)
);

CREATE TABLE IF NOT EXISTS journals (
    id INTEGER PRIMARY KEY,
    journalized_id INTEGER NOT NULL REFERENCES issues(id),
    user_id INTEGER NOT NULL REFERENCES users(id),
    notes TEXT,
    created_on TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS journal_details (
    id INTEGER PRIMARY KEY,
    journal_id INTEGER NOT NULL REFERENCES journals(id),
    property TEXT NOT NULL,
    prop_key TEXT NOT NULL,
    old_value TEXT,
    value TEXT
);

CREATE TABLE IF NOT EXISTS time_entries (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL REFERENCES projects(id),
    issue_id INTEGER NOT NULL REFERENCES issues(id),
    user_id INTEGER NOT NULL REFERENCES users(id),
    activity_id INTEGER NOT NULL REFERENCES enumerations(id),
    spent_on TEXT NOT NULL,
    hours REAL NOT NULL,
    comments TEXT,
    created_on TEXT NOT NULL
);

-- 每个用户至多一个暂存作业
CREATE TABLE IF NOT EXISTS import_in_progress (
    user_id INTEGER PRIMARY KEY,
    import_type TEXT NOT NULL,
    csv_data BLOB NOT NULL,
    encoding TEXT NOT NULL,
    quote_char TEXT NOT NULL,
    col_sep TEXT NOT NULL,
    created TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_issues_project ON issues(project_id);
CREATE INDEX IF NOT EXISTS idx_custom_values_lookup ON custom_values(custom_field_id, value);
CREATE INDEX IF NOT EXISTS idx_import_in_progress_created ON import_in_progress(created);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存库并建表（测试与演示用）
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// 建表并写入 schema_version（幂等）
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 默认数据库路径
///
/// 优先级: 环境变量 CSV_IMPORTER_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./importer.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("csv-record-importer");
        // 目录创建失败时仍返回该路径，由打开连接时报错
        let _ = std::fs::create_dir_all(&dir);
        path = dir.join("importer.db");
    }

    path.to_string_lossy().to_string()
}
