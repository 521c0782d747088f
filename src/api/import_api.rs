// ==========================================
// CSV 数据导入API
// ==========================================
// 职责: 上传暂存（含预览）与提交两个入口
// 约定:
// - 上传: 先删除用户已有作业，再校验并暂存；返回冲突检测时间戳 + 样本行 + 可选目标字段
// - 提交: errors 为空表示已提交；非空表示映射校验未通过、未处理任何行
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportSettings};
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::domain::job::ImportJob;
use crate::domain::outcome::{ImportOutcome, RowErrorKind};
use crate::domain::types::{DeclaredEncoding, ImportType};
use crate::importer::{
    available_fields, normalize, summarize, BatchCoordinator, CommitRequest, DelimitedParser,
    FieldOption, ImportError,
};
use crate::repository::{
    ImportJobRepository, ImportJobRepositoryImpl, JobPredicate, TrackerStore, TrackerStoreImpl,
};
use chrono::{Local, NaiveDateTime, Timelike};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

/// 上传请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRequest {
    pub user_id: i64,
    /// 问题导入的目标项目（用于列出可选自定义字段）
    pub project_id: Option<i64>,
    pub import_type: ImportType,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub encoding: DeclaredEncoding,
    pub quote_char: char,
    pub column_separator: char,
}

/// 上传响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResponse {
    /// 提交时需原样回传的时间戳
    pub timestamp: String,
    pub headers: Vec<String>,
    /// 表头警告（空列名等）
    pub warnings: Vec<String>,
    pub samples: Vec<Vec<String>>,
    pub available_fields: Vec<FieldOption>,
}

/// 失败行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedRowDto {
    pub position: usize,
    pub cells: Vec<String>,
    pub kind: RowErrorKind,
    pub message: String,
}

/// 提交响应
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitResponse {
    /// 映射校验错误（非空表示未处理任何行）
    pub errors: Vec<String>,
    pub handled: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// 项目名 → 影响行数
    pub affected_projects: BTreeMap<String, usize>,
    pub warnings: Vec<String>,
    /// 由首个失败行重建的表头
    pub failed_headers: Vec<String>,
    /// 按行序号升序
    pub failed_rows: Vec<FailedRowDto>,
    pub summary: Vec<String>,
}

impl CommitResponse {
    pub fn is_committed(&self) -> bool {
        self.errors.is_empty()
    }

    fn rejected(errors: Vec<String>) -> Self {
        Self {
            errors,
            ..Default::default()
        }
    }
}

impl From<&ImportOutcome> for CommitResponse {
    fn from(outcome: &ImportOutcome) -> Self {
        Self {
            errors: Vec::new(),
            handled: outcome.handled,
            created: outcome.created,
            updated: outcome.updated,
            skipped: outcome.skipped,
            failed: outcome.failed,
            affected_projects: outcome.affected_projects().clone(),
            warnings: outcome.warnings().to_vec(),
            failed_headers: outcome.failed_headers().map(<[String]>::to_vec).unwrap_or_default(),
            failed_rows: outcome
                .failures()
                .map(|f| FailedRowDto {
                    position: f.row.position(),
                    cells: f.row.cells().to_vec(),
                    kind: f.error.kind,
                    message: f.error.message.clone(),
                })
                .collect(),
            summary: summarize(outcome),
        }
    }
}

// ==========================================
// ImportApi
// ==========================================
pub struct ImportApi {
    conn: Arc<Mutex<Connection>>,
    jobs: ImportJobRepositoryImpl,
    store: TrackerStoreImpl,
    config: ConfigManager,
}

impl ImportApi {
    /// 打开数据库文件（按需建表）
    pub fn open(db_path: &str) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        ensure_schema(&conn).map_err(|e| ApiError::DatabaseError(e.to_string()))?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建（各仓储共用同一连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        Ok(Self {
            jobs: ImportJobRepositoryImpl::from_connection(Arc::clone(&conn)),
            store: TrackerStoreImpl::from_connection(Arc::clone(&conn)),
            config: ConfigManager::from_connection(Arc::clone(&conn))?,
            conn,
        })
    }

    /// 共享连接（初始化数据等）
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    pub fn settings(&self) -> ApiResult<ImportSettings> {
        Ok(ImportSettings::load(&self.config)?)
    }

    /// 上传并暂存导入作业
    ///
    /// 用户原有作业在任何校验之前即被删除
    ///
    /// # 返回
    /// - Ok(StageResponse): 新作业已暂存
    /// - Err: 文件为空 / 编码或解析失败（用户不再有暂存作业）
    #[instrument(skip(self, request), fields(user_id = request.user_id, import_type = %request.import_type))]
    pub fn stage(&self, request: StageRequest) -> ApiResult<StageResponse> {
        let discarded = self.jobs.delete_where(JobPredicate::User(request.user_id))?;
        if discarded > 0 {
            debug!(discarded, "已删除用户原有导入作业");
        }

        if request.data.is_empty() {
            return Err(ImportError::FileNotSpecified.into());
        }
        let settings = self.settings()?;

        let text = normalize(request.encoding, &request.data)?;
        let parser = DelimitedParser::new(request.column_separator, request.quote_char)?;
        let preview = parser.preview(&text.data, settings.sample_count)?;

        let custom_fields = match (request.import_type, request.project_id) {
            (ImportType::Issue, Some(project_id)) => self.store.issue_custom_fields(project_id)?,
            _ => Vec::new(),
        };

        let job = ImportJob {
            user_id: request.user_id,
            import_type: request.import_type,
            raw_data: request.data,
            declared_encoding: request.encoding,
            quote_char: request.quote_char,
            column_separator: request.column_separator,
            created_at: now_in_seconds(),
        };
        self.jobs.replace(&job)?;
        info!(bytes = job.raw_data.len(), columns = preview.headers.len(), "导入作业已暂存");

        Ok(StageResponse {
            timestamp: job.timestamp(),
            headers: preview.headers,
            warnings: preview.warnings,
            samples: preview.rows,
            available_fields: available_fields(request.import_type, &custom_fields),
        })
    }

    /// 提交暂存作业
    pub fn commit(&self, request: &CommitRequest) -> ApiResult<CommitResponse> {
        let settings = self.settings()?;
        let coordinator = BatchCoordinator::new(&self.jobs, &self.store, settings);
        match coordinator.commit(request) {
            Ok(outcome) => Ok(CommitResponse::from(&outcome)),
            Err(ImportError::Configuration(errors)) => Ok(CommitResponse::rejected(errors)),
            Err(err) => Err(err.into()),
        }
    }
}

/// 作业创建时间（秒级，保证回传的时间戳可比较）
fn now_in_seconds() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}
