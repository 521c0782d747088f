// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库初始化、种子数据、上传 / 提交请求构造
// ==========================================
#![allow(dead_code)]

use csv_record_importer::db::{ensure_schema, open_sqlite_connection};
use csv_record_importer::logging;
use csv_record_importer::{
    CommitRequest, DeclaredEncoding, ImportApi, ImportType, IssueImportOptions, StageRequest,
    StageResponse,
};
use std::error::Error;
use tempfile::NamedTempFile;

/// 基础数据: 项目 / 跟踪 / 状态 / 用户 / 优先级 / 活动 / 自定义字段
pub const SEED_SQL: &str = r#"
INSERT INTO projects (id, name) VALUES (1, 'Alpha'), (2, 'Beta');
INSERT INTO trackers (id, name) VALUES (1, 'Bug'), (2, 'Feature');
INSERT INTO issue_statuses (id, name, is_closed, is_default, position)
    VALUES (1, 'New', 0, 1, 1), (2, 'In Progress', 0, 0, 2), (5, 'Closed', 1, 0, 5);
INSERT INTO users (id, login) VALUES (1, 'admin'), (2, 'jsmith');
INSERT INTO enumerations (id, type, name, is_default, position)
    VALUES (4, 'IssuePriority', 'Normal', 1, 2),
           (5, 'IssuePriority', 'High', 0, 3),
           (9, 'TimeEntryActivity', 'Design', 0, 1);
INSERT INTO custom_fields (id, name, field_format, is_required, is_for_all, possible_values)
    VALUES (1, 'External ref', 'string', 0, 1, '[]');
"#;

/// 创建带种子数据的临时数据库
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;
    conn.execute_batch(SEED_SQL)?;

    Ok((temp_file, db_path))
}

/// 打开临时数据库上的 ImportApi
pub fn open_api() -> (NamedTempFile, ImportApi) {
    logging::init_test();
    let (temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = ImportApi::open(&db_path).expect("打开 ImportApi 失败");
    (temp_file, api)
}

/// 逗号分隔、双引号、UTF-8 的上传请求
pub fn stage_request(user_id: i64, import_type: ImportType, data: &str) -> StageRequest {
    StageRequest {
        user_id,
        project_id: Some(1),
        import_type,
        data: data.as_bytes().to_vec(),
        encoding: DeclaredEncoding::Utf8,
        quote_char: '"',
        column_separator: ',',
    }
}

/// 提交请求（项目 Alpha）
pub fn commit_request(
    user_id: i64,
    staged: &StageResponse,
    pairs: &[(&str, &str)],
    options: IssueImportOptions,
) -> CommitRequest {
    CommitRequest {
        user_id,
        project_id: Some(1),
        timestamp: staged.timestamp.clone(),
        options,
        fields_map: pairs
            .iter()
            .map(|(external, internal)| (external.to_string(), internal.to_string()))
            .collect(),
    }
}

/// 仅新建，默认跟踪为 Bug
pub fn create_only() -> IssueImportOptions {
    IssueImportOptions {
        default_tracker: Some(1),
        ..Default::default()
    }
}

/// 单值查询
pub fn scalar<T: rusqlite::types::FromSql>(api: &ImportApi, sql: &str) -> T {
    let conn = api.connection();
    let conn = conn.lock().expect("数据库锁获取失败");
    conn.query_row(sql, [], |row| row.get(0)).expect("查询失败")
}
