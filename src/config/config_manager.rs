// ==========================================
// CSV 数据导入系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::domain::job::{DEFAULT_RETENTION_DAYS, MAX_RETENTION_DAYS};
use crate::importer::file_parser::PREVIEW_ROW_COUNT;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取并解析配置值；格式错误时记录警告并使用默认值
    fn get_parsed_or<T: std::str::FromStr>(&self, key: &str, default: T) -> RepositoryResult<T> {
        let Some(raw) = self.get_config_value(key)? else {
            return Ok(default);
        };
        match raw.trim().parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => {
                warn!(config_key = key, raw_value = %raw, "配置格式错误，使用默认值");
                Ok(default)
            }
        }
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
impl ImportConfigReader for ConfigManager {
    fn get_issue_custom_field_id(&self) -> RepositoryResult<Option<i64>> {
        let Some(raw) = self.get_config_value(config_keys::ISSUE_CUSTOM_FIELD_ID)? else {
            return Ok(None);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        match raw.parse::<i64>() {
            Ok(id) => Ok(Some(id)),
            Err(_) => {
                warn!(config_key = config_keys::ISSUE_CUSTOM_FIELD_ID, raw_value = raw, "配置格式错误，忽略");
                Ok(None)
            }
        }
    }

    fn get_retention_days(&self) -> RepositoryResult<i64> {
        let days = self.get_parsed_or(config_keys::RETENTION_DAYS, DEFAULT_RETENTION_DAYS)?;
        if !(0..=MAX_RETENTION_DAYS).contains(&days) {
            warn!(
                config_key = config_keys::RETENTION_DAYS,
                days,
                max = MAX_RETENTION_DAYS,
                "保留天数超出范围，使用默认值"
            );
            return Ok(DEFAULT_RETENTION_DAYS);
        }
        Ok(days)
    }

    fn get_sample_count(&self) -> RepositoryResult<usize> {
        self.get_parsed_or(config_keys::SAMPLE_COUNT, PREVIEW_ROW_COUNT)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const ISSUE_CUSTOM_FIELD_ID: &str = "csv_import.issue_custom_field_id";
    pub const RETENTION_DAYS: &str = "csv_import.retention_days";
    pub const SAMPLE_COUNT: &str = "csv_import.sample_count";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportSettings;
    use crate::db::open_in_memory;

    fn manager() -> ConfigManager {
        let conn = open_in_memory().unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = ImportSettings::load(&manager()).unwrap();
        assert_eq!(settings, ImportSettings::default());
        assert_eq!(settings.retention_days, 3);
        assert_eq!(settings.sample_count, 5);
    }

    #[test]
    fn test_overrides_and_malformed_values() {
        let config = manager();
        config.set_global_config_value(config_keys::ISSUE_CUSTOM_FIELD_ID, "7").unwrap();
        config.set_global_config_value(config_keys::RETENTION_DAYS, "ten").unwrap();
        config.set_global_config_value(config_keys::SAMPLE_COUNT, "2").unwrap();

        let settings = ImportSettings::load(&config).unwrap();
        assert_eq!(settings.issue_custom_field_id, Some(7));
        assert_eq!(settings.retention_days, 3);
        assert_eq!(settings.sample_count, 2);
    }

    #[test]
    fn test_retention_days_out_of_range() {
        let config = manager();
        config.set_global_config_value(config_keys::RETENTION_DAYS, "200000000").unwrap();
        assert_eq!(config.get_retention_days().unwrap(), DEFAULT_RETENTION_DAYS);

        config.set_global_config_value(config_keys::RETENTION_DAYS, "-1").unwrap();
        assert_eq!(config.get_retention_days().unwrap(), DEFAULT_RETENTION_DAYS);

        config.set_global_config_value(config_keys::RETENTION_DAYS, "0").unwrap();
        assert_eq!(config.get_retention_days().unwrap(), 0);

        config.set_global_config_value(config_keys::RETENTION_DAYS, "3650").unwrap();
        assert_eq!(config.get_retention_days().unwrap(), MAX_RETENTION_DAYS);
    }
}
