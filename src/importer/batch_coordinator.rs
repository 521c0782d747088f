// ==========================================
// CSV 数据导入系统 - 批处理协调器
// ==========================================
// 职责: 消费暂存作业，将全部行放在一个存储事务内导入
// 流程: 冲突检测 → 编码转换 → 解析表头 → 映射校验 → BEGIN → 逐行导入 → COMMIT
// 规则:
// - 冲突检测在事务开启前完成；冲突时保留作业
// - 行级失败计数后继续；歧义匹配终止剩余行但仍提交
// - 解析错误或不可恢复错误回滚整批
// - 冲突检测通过后，无论成功与否作业都被删除，并回收超期作业
// ==========================================

use crate::config::ImportSettings;
use crate::domain::job::{expiry_cutoff, ImportJob};
use crate::domain::outcome::{ImportOutcome, RowFlow, RowOutcome};
use crate::domain::types::ImportType;
use crate::i18n;
use crate::importer::encoding::normalize;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::ColumnMapping;
use crate::importer::file_parser::{DelimitedParser, Rows};
use crate::importer::issue_importer::IssueImporter;
use crate::importer::row_importer_trait::{IssueImportOptions, RowImporter};
use crate::importer::time_entry_importer::TimeEntryImporter;
use crate::repository::error::RepositoryResult;
use crate::repository::import_job_repo::{ImportJobRepository, JobPredicate};
use crate::repository::tracker_store::TrackerStore;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn, Span};
use uuid::Uuid;

// ==========================================
// CommitRequest - 提交请求
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitRequest {
    pub user_id: i64,
    /// 问题导入的目标项目（工时导入不使用）
    pub project_id: Option<i64>,
    /// 上传时返回的冲突检测时间戳
    pub timestamp: String,
    #[serde(default)]
    pub options: IssueImportOptions,
    /// (外部列名, 内部字段键)
    pub fields_map: Vec<(String, String)>,
}

// ==========================================
// BatchCoordinator
// ==========================================
pub struct BatchCoordinator<'a, J, S>
where
    J: ImportJobRepository + ?Sized,
    S: TrackerStore + ?Sized,
{
    jobs: &'a J,
    store: &'a S,
    settings: ImportSettings,
}

impl<'a, J, S> BatchCoordinator<'a, J, S>
where
    J: ImportJobRepository + ?Sized,
    S: TrackerStore + ?Sized,
{
    pub fn new(jobs: &'a J, store: &'a S, settings: ImportSettings) -> Self {
        Self {
            jobs,
            store,
            settings,
        }
    }

    /// 提交当前用户的暂存作业
    ///
    /// # 返回
    /// - Ok(ImportOutcome): 已提交（可能含失败行）
    /// - Err(NoJobInProgress / Collision): 未处理任何行，作业保留
    /// - Err(其他): 整批被拒绝或回滚，作业已删除
    #[instrument(skip(self, request), fields(user_id = request.user_id, run_id))]
    pub fn commit(&self, request: &CommitRequest) -> ImportResult<ImportOutcome> {
        let run_id = Uuid::new_v4().to_string();
        Span::current().record("run_id", run_id.as_str());

        let job = self
            .jobs
            .get(request.user_id)?
            .ok_or(ImportError::NoJobInProgress)?;
        if !job.matches_timestamp(&request.timestamp) {
            warn!(
                expected = %job.timestamp(),
                echoed = %request.timestamp,
                "导入作业已被替换，取消本次导入"
            );
            return Err(ImportError::Collision);
        }

        info!(
            import_type = %job.import_type,
            bytes = job.raw_data.len(),
            encoding = %job.declared_encoding,
            "开始导入"
        );
        let result = self.run(&job, request);

        // 作业只被消费一次
        if let Err(err) = self.consume_job(request.user_id) {
            error!(error = %err, "删除导入作业失败");
            if result.is_ok() {
                return Err(err.into());
            }
        }

        match &result {
            Ok(outcome) => info!(
                handled = outcome.handled,
                created = outcome.created,
                updated = outcome.updated,
                skipped = outcome.skipped,
                failed = outcome.failed,
                "导入完成"
            ),
            Err(err) => warn!(error = %err, "导入被拒绝"),
        }
        result
    }

    fn run(&self, job: &ImportJob, request: &CommitRequest) -> ImportResult<ImportOutcome> {
        let text = normalize(job.declared_encoding, &job.raw_data)?;
        debug!(transcoded = text.transcoded, "编码转换完成");

        let parser = DelimitedParser::new(job.column_separator, job.quote_char)?;
        let rows = parser.parse(&text.data)?;
        let mapping = ColumnMapping::from_pairs(
            request
                .fields_map
                .iter()
                .map(|(external, internal)| (external.as_str(), internal.as_str())),
        );

        match job.import_type {
            ImportType::Issue => {
                let importer = self.issue_importer(request, &mapping)?;
                self.execute(importer, rows)
            }
            ImportType::TimeEntry => {
                let importer = TimeEntryImporter::prepare(
                    self.store,
                    self.settings.issue_custom_field_id,
                    &mapping,
                )?;
                self.execute(importer, rows)
            }
        }
    }

    fn issue_importer(
        &self,
        request: &CommitRequest,
        mapping: &ColumnMapping,
    ) -> ImportResult<IssueImporter<'a, S>> {
        let mut problems = Vec::new();
        let project = match request.project_id {
            Some(id) => self.store.project_by_id(id)?,
            None => None,
        };
        if project.is_none() {
            let id = request.project_id.map(|id| id.to_string()).unwrap_or_default();
            problems.push(i18n::t_with_args("config.project_missing", &[("id", &id)]));
        }
        let user = self.store.user_by_id(request.user_id)?;
        if user.is_none() {
            problems.push(i18n::t_with_args(
                "config.user_missing",
                &[("id", &request.user_id.to_string())],
            ));
        }
        match (project, user) {
            (Some(project), Some(user)) => {
                IssueImporter::prepare(self.store, project, user, request.options.clone(), mapping)
            }
            _ => Err(ImportError::Configuration(problems)),
        }
    }

    /// 在一个事务内逐行导入
    fn execute<I: RowImporter>(&self, mut importer: I, rows: Rows<'_>) -> ImportResult<ImportOutcome> {
        let mut outcome = ImportOutcome::new();
        for warning in rows.warnings().iter().cloned().chain(importer.warnings()) {
            outcome.push_warning(warning);
        }

        self.store.begin()?;
        let result = drive(&mut importer, rows, &mut outcome)
            .and_then(|()| self.store.commit().map_err(ImportError::from));
        match result {
            Ok(()) => Ok(outcome),
            Err(err) => {
                error!(error = %err, handled = outcome.handled, "导入中断，回滚整批");
                if let Err(rollback_err) = self.store.rollback() {
                    error!(error = %rollback_err, "回滚失败");
                }
                Err(err)
            }
        }
    }

    /// 删除本用户的作业并回收超期作业
    fn consume_job(&self, user_id: i64) -> RepositoryResult<()> {
        self.jobs.delete_where(JobPredicate::User(user_id))?;
        let retention_days = self.settings.retention_days;
        let Some(cutoff) = expiry_cutoff(Local::now().naive_local(), retention_days) else {
            warn!(retention_days, "保留天数超出日期范围，跳过回收");
            return Ok(());
        };
        let reaped = self.jobs.delete_where(JobPredicate::CreatedBefore(cutoff))?;
        if reaped > 0 {
            debug!(reaped, "已回收超期导入作业");
        }
        Ok(())
    }
}

fn drive<I: RowImporter>(
    importer: &mut I,
    rows: Rows<'_>,
    outcome: &mut ImportOutcome,
) -> ImportResult<()> {
    for row in rows {
        let row = row?;
        let result = importer.import_row(&row)?;
        match &result {
            RowOutcome::Failed(err) => warn!(
                row = row.position(),
                kind = %err.kind,
                message = %err.message,
                cells = ?row.pairs().collect::<Vec<_>>(),
                "行导入失败"
            ),
            other => debug!(row = row.position(), outcome = ?other, "行已处理"),
        }
        if outcome.record(&row, result) == RowFlow::Stop {
            warn!(row = row.position(), "歧义匹配，终止剩余行");
            break;
        }
    }
    Ok(())
}

// ==========================================
// 结果摘要
// ==========================================

/// 渲染导入摘要（计数 + 各项目影响行数 + 失败行）
pub fn summarize(outcome: &ImportOutcome) -> Vec<String> {
    let mut lines = vec![i18n::t_with_args(
        "summary.header",
        &[
            ("handled", &outcome.handled.to_string()),
            ("created", &outcome.created.to_string()),
            ("updated", &outcome.updated.to_string()),
            ("skipped", &outcome.skipped.to_string()),
            ("failed", &outcome.failed.to_string()),
        ],
    )];
    for (project, count) in outcome.affected_projects() {
        lines.push(i18n::t_with_args(
            "summary.project_line",
            &[("project", project), ("count", &count.to_string())],
        ));
    }
    for failure in outcome.failures() {
        lines.push(i18n::t_with_args(
            "summary.failed_line",
            &[
                ("row", &failure.row.position().to_string()),
                ("message", &failure.error.message),
            ],
        ));
    }
    lines
}
