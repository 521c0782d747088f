// ==========================================
// CSV 数据导入系统 - 导入作业
// ==========================================
// 用途: 上传后、提交前暂存的导入请求（每个用户至多一个）
// 生命周期: 上传时创建 → 提交时消费并删除 / 超过保留期被回收
// ==========================================

use crate::domain::types::{DeclaredEncoding, ImportType};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// 冲突检测时间戳格式（由调用方原样回传）
pub const IMPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 默认保留天数
pub const DEFAULT_RETENTION_DAYS: i64 = 3;

/// 保留天数上限（约十年）
pub const MAX_RETENTION_DAYS: i64 = 3650;

// ==========================================
// ImportJob - 暂存的导入作业
// ==========================================
// 对齐: import_in_progress 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    pub user_id: i64,                         // 所属用户（唯一）
    pub import_type: ImportType,              // 导入类型
    #[serde(skip)]
    pub raw_data: Vec<u8>,                    // 原始上传字节
    pub declared_encoding: DeclaredEncoding,  // 声明编码
    pub quote_char: char,                     // 引号字符
    pub column_separator: char,               // 列分隔符
    pub created_at: NaiveDateTime,            // 创建时间（秒级精度）
}

impl ImportJob {
    /// 回传给调用方的冲突检测时间戳
    pub fn timestamp(&self) -> String {
        self.created_at.format(IMPORT_TIMESTAMP_FORMAT).to_string()
    }

    /// 调用方回传的时间戳是否与当前作业一致
    pub fn matches_timestamp(&self, echoed: &str) -> bool {
        self.timestamp() == echoed.trim()
    }
}

/// 保留期截止时间（早于此时间创建的作业已过期）；天数超出日期范围时返回 None
pub fn expiry_cutoff(now: NaiveDateTime, retention_days: i64) -> Option<NaiveDateTime> {
    Duration::try_days(retention_days).and_then(|window| now.checked_sub_signed(window))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn job_at(created_at: NaiveDateTime) -> ImportJob {
        ImportJob {
            user_id: 1,
            import_type: ImportType::Issue,
            raw_data: b"subject\nA\n".to_vec(),
            declared_encoding: DeclaredEncoding::Utf8,
            quote_char: '"',
            column_separator: ',',
            created_at,
        }
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let created = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 5)
            .unwrap();
        let job = job_at(created);

        assert_eq!(job.timestamp(), "2026-03-01 09:30:05");
        assert!(job.matches_timestamp("2026-03-01 09:30:05"));
        assert!(!job.matches_timestamp("2026-03-01 09:30:06"));
    }

    #[test]
    fn test_expiry_window() {
        let created = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        let cutoff = expiry_cutoff(created + Duration::days(2), DEFAULT_RETENTION_DAYS).unwrap();
        assert!(created >= cutoff);
        let cutoff = expiry_cutoff(created + Duration::days(4), DEFAULT_RETENTION_DAYS).unwrap();
        assert!(created < cutoff);
    }

    #[test]
    fn test_expiry_cutoff_out_of_range() {
        let now = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        assert_eq!(expiry_cutoff(now, 1), Some(now - Duration::days(1)));
        assert_eq!(expiry_cutoff(now, 200_000_000), None);
        assert_eq!(expiry_cutoff(now, i64::MAX), None);
    }
}
