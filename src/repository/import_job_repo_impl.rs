// ==========================================
// CSV 数据导入系统 - 暂存作业 Repository 实现
// ==========================================
// 职责: 实现 import_in_progress 表访问（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::job::ImportJob;
use crate::domain::types::{DeclaredEncoding, ImportType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::import_job_repo::{ImportJobRepository, JobPredicate};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ImportJobRepositoryImpl
// ==========================================
pub struct ImportJobRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ImportJobRepositoryImpl {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

/// 单字符列（引号/分隔符）读取
fn parse_single_char(field: &str, raw: &str) -> RepositoryResult<char> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(RepositoryError::StoredValueError {
            field: field.to_string(),
            message: format!("期望单个字符，实际 {:?}", raw),
        }),
    }
}

impl ImportJobRepository for ImportJobRepositoryImpl {
    fn get(&self, user_id: i64) -> RepositoryResult<Option<ImportJob>> {
        let conn = self.get_conn()?;
        let raw = conn
            .query_row(
                r#"
                SELECT user_id, import_type, csv_data, encoding, quote_char, col_sep, created
                FROM import_in_progress
                WHERE user_id = ?1
                "#,
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, NaiveDateTime>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((user_id, import_type, raw_data, encoding, quote, sep, created_at)) = raw else {
            return Ok(None);
        };

        let import_type = ImportType::from_str(&import_type).ok_or_else(|| {
            RepositoryError::StoredValueError {
                field: "import_type".to_string(),
                message: format!("未知导入类型: {}", import_type),
            }
        })?;
        let declared_encoding = DeclaredEncoding::from_str(&encoding).ok_or_else(|| {
            RepositoryError::StoredValueError {
                field: "encoding".to_string(),
                message: format!("未知编码: {}", encoding),
            }
        })?;

        Ok(Some(ImportJob {
            user_id,
            import_type,
            raw_data,
            declared_encoding,
            quote_char: parse_single_char("quote_char", &quote)?,
            column_separator: parse_single_char("col_sep", &sep)?,
            created_at,
        }))
    }

    fn replace(&self, job: &ImportJob) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM import_in_progress WHERE user_id = ?1",
            params![job.user_id],
        )?;
        tx.execute(
            r#"
            INSERT INTO import_in_progress (
                user_id, import_type, csv_data, encoding, quote_char, col_sep, created
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                job.user_id,
                job.import_type.to_db_str(),
                job.raw_data,
                job.declared_encoding.to_db_str(),
                job.quote_char.to_string(),
                job.column_separator.to_string(),
                job.created_at,
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn delete_where(&self, predicate: JobPredicate) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = match predicate {
            JobPredicate::User(user_id) => conn.execute(
                "DELETE FROM import_in_progress WHERE user_id = ?1",
                params![user_id],
            )?,
            JobPredicate::CreatedBefore(cutoff) => conn.execute(
                "DELETE FROM import_in_progress WHERE created < ?1",
                params![cutoff],
            )?,
        };
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use chrono::{Duration, NaiveDate};

    fn repo() -> ImportJobRepositoryImpl {
        let conn = open_in_memory().unwrap();
        ImportJobRepositoryImpl::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn job(user_id: i64, data: &[u8], created_at: NaiveDateTime) -> ImportJob {
        ImportJob {
            user_id,
            import_type: ImportType::Issue,
            raw_data: data.to_vec(),
            declared_encoding: DeclaredEncoding::Latin1,
            quote_char: '"',
            column_separator: ';',
            created_at,
        }
    }

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, day)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_second_replace_wins() {
        let repo = repo();
        repo.replace(&job(7, b"first", at(1))).unwrap();
        repo.replace(&job(7, b"second", at(2))).unwrap();

        let stored = repo.get(7).unwrap().unwrap();
        assert_eq!(stored.raw_data, b"second");
        assert_eq!(stored.created_at, at(2));
        assert_eq!(stored.column_separator, ';');
        assert_eq!(stored.declared_encoding, DeclaredEncoding::Latin1);
    }

    #[test]
    fn test_jobs_are_per_user() {
        let repo = repo();
        repo.replace(&job(1, b"a", at(1))).unwrap();
        repo.replace(&job(2, b"b", at(1))).unwrap();

        assert_eq!(repo.delete_where(JobPredicate::User(1)).unwrap(), 1);
        assert!(repo.get(1).unwrap().is_none());
        assert!(repo.get(2).unwrap().is_some());
    }

    #[test]
    fn test_reap_old_jobs() {
        let repo = repo();
        repo.replace(&job(1, b"old", at(1))).unwrap();
        repo.replace(&job(2, b"fresh", at(10))).unwrap();

        let cutoff = at(10) - Duration::days(3);
        assert_eq!(repo.delete_where(JobPredicate::CreatedBefore(cutoff)).unwrap(), 1);
        assert!(repo.get(1).unwrap().is_none());
        assert!(repo.get(2).unwrap().is_some());
    }
}
