// ==========================================
// 导入 API 端到端测试
// ==========================================
// 上传 / 预览 / 作业替换 / 冲突检测
// ==========================================

use csv_record_importer::{ApiError, DeclaredEncoding, ImportType};
use std::thread;
use std::time::Duration;

mod test_helpers;
use test_helpers::{commit_request, create_only, open_api, scalar, stage_request};

#[test]
fn test_stage_returns_preview_and_fields() {
    let (_db, api) = open_api();
    let mut data = String::from("subject;External ref\n");
    for i in 1..=8 {
        data.push_str(&format!("Issue {};EXT-{}\n", i, i));
    }
    let mut request = stage_request(1, ImportType::Issue, &data);
    request.column_separator = ';';

    let staged = api.stage(request).unwrap();

    assert_eq!(staged.headers, vec!["subject", "External ref"]);
    assert_eq!(staged.samples.len(), 5);
    assert_eq!(staged.samples[0], vec!["Issue 1", "EXT-1"]);
    assert!(staged.warnings.is_empty());
    assert!(staged.available_fields.iter().any(|f| f.key == "subject"));
    assert!(staged.available_fields.iter().any(|f| f.key == "External ref"));
    assert!(staged.available_fields.iter().any(|f| f.key == "blocks"));
}

#[test]
fn test_empty_upload_is_rejected() {
    let (_db, api) = open_api();
    let result = api.stage(stage_request(1, ImportType::Issue, ""));
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
}

#[test]
fn test_empty_upload_discards_previous_job() {
    let (_db, api) = open_api();
    api.stage(stage_request(1, ImportType::Issue, "subject\nDropped\n"))
        .unwrap();
    assert_eq!(scalar::<i64>(&api, "SELECT COUNT(*) FROM import_in_progress"), 1);

    let result = api.stage(stage_request(1, ImportType::Issue, ""));
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
    assert_eq!(scalar::<i64>(&api, "SELECT COUNT(*) FROM import_in_progress"), 0);
}

#[test]
fn test_restage_replaces_job_and_old_timestamp_collides() {
    let (_db, api) = open_api();
    let first = api
        .stage(stage_request(1, ImportType::Issue, "subject\nOld\n"))
        .unwrap();
    // 时间戳精确到秒
    thread::sleep(Duration::from_millis(1100));
    let second = api
        .stage(stage_request(1, ImportType::Issue, "subject\nNew\n"))
        .unwrap();
    assert_ne!(first.timestamp, second.timestamp);
    assert_eq!(scalar::<i64>(&api, "SELECT COUNT(*) FROM import_in_progress"), 1);

    let stale = api.commit(&commit_request(1, &first, &[("subject", "subject")], create_only()));
    assert!(matches!(stale, Err(ApiError::ImportCollision(_))));
    assert_eq!(scalar::<i64>(&api, "SELECT COUNT(*) FROM issues"), 0);

    let response = api
        .commit(&commit_request(1, &second, &[("subject", "subject")], create_only()))
        .unwrap();
    assert_eq!(response.created, 1);
    assert_eq!(scalar::<String>(&api, "SELECT subject FROM issues"), "New");
}

#[test]
fn test_jobs_are_kept_per_user() {
    let (_db, api) = open_api();
    api.stage(stage_request(1, ImportType::Issue, "subject\nA\n")).unwrap();
    api.stage(stage_request(2, ImportType::TimeEntry, "hours\n1\n")).unwrap();
    assert_eq!(scalar::<i64>(&api, "SELECT COUNT(*) FROM import_in_progress"), 2);
}

#[test]
fn test_malformed_upload_discards_previous_job() {
    let (_db, api) = open_api();
    let good = api
        .stage(stage_request(1, ImportType::Issue, "subject\nDropped\n"))
        .unwrap();

    let result = api.stage(stage_request(1, ImportType::Issue, "subject\n\"unterminated\n"));
    assert!(matches!(result, Err(ApiError::ImportError(_))));

    let result = api.commit(&commit_request(1, &good, &[("subject", "subject")], create_only()));
    assert!(matches!(result, Err(ApiError::NotFound(_))));
    assert_eq!(scalar::<i64>(&api, "SELECT COUNT(*) FROM issues"), 0);
}

#[test]
fn test_latin9_upload_is_transcoded() {
    let (_db, api) = open_api();
    let mut request = stage_request(1, ImportType::Issue, "");
    request.data = b"subject\nCaf\xe9 \xa4\n".to_vec();
    request.encoding = DeclaredEncoding::Latin9;

    let staged = api.stage(request).unwrap();
    assert_eq!(staged.samples[0], vec!["Caf\u{e9} \u{20ac}"]);

    api.commit(&commit_request(1, &staged, &[("subject", "subject")], create_only()))
        .unwrap();
    assert_eq!(
        scalar::<String>(&api, "SELECT subject FROM issues"),
        "Caf\u{e9} \u{20ac}"
    );
}
