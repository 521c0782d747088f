// ==========================================
// CSV 数据导入系统 - 工时（从属记录）行导入器
// ==========================================
// 职责: 每个有效行新建一条工时（无匹配 / 更新路径）
// 规则:
// - 问题引用、记录人、日期、活动、工时为必填
// - 问题引用列为空时，按配置的自定义字段反查所属问题（必须恰好一条）
// - 项目取映射列，否则继承所属问题的项目
// - 注释去空白后截断到 255 字符
// ==========================================

use crate::domain::outcome::{RowErrorKind, RowOutcome};
use crate::domain::row::Row;
use crate::domain::tracker::{CustomField, Issue, TimeEntry};
use crate::domain::types::{Attribute, ImportType};
use crate::i18n;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{ColumnMapping, ResolvedMapping};
use crate::importer::row_importer_trait::{
    failure, invalid_value, mandatory_missing, not_found, rejected, RowImporter, RowStep,
};
use crate::repository::tracker_store::TrackerStore;
use std::collections::HashMap;
use tracing::{debug, warn};

/// 反查时只需知道是否存在第二条
const BACK_REFERENCE_PROBE_LIMIT: usize = 2;

/// 除问题引用外必须映射的字段
const REQUIRED_ATTRIBUTES: &[Attribute] = &[
    Attribute::UserId,
    Attribute::SpentOn,
    Attribute::ActivityId,
    Attribute::Hours,
];

// ==========================================
// BackReference - 经自定义字段反查问题
// ==========================================
#[derive(Debug, Clone)]
struct BackReference {
    field: CustomField,
    column: Option<String>, // 映射到该自定义字段的外部列
}

impl BackReference {
    fn value<'r>(&self, row: &'r Row) -> Option<&'r str> {
        self.column
            .as_deref()
            .and_then(|column| row.value(column))
            .map(str::trim)
    }
}

// ==========================================
// TimeEntryImporter
// ==========================================
pub struct TimeEntryImporter<'s, S: TrackerStore + ?Sized> {
    store: &'s S,
    mapping: ResolvedMapping,
    back_reference: Option<BackReference>,
    cleaner: DataCleaner,
    project_names: HashMap<i64, String>,
    warnings: Vec<String>,
}

impl<'s, S: TrackerStore + ?Sized> TimeEntryImporter<'s, S> {
    /// 校验映射并构造导入器
    ///
    /// # 参数
    /// - back_reference_field: 反查问题用的自定义字段 id（外部配置）
    pub fn prepare(
        store: &'s S,
        back_reference_field: Option<i64>,
        mapping: &ColumnMapping,
    ) -> ImportResult<Self> {
        let resolved = ResolvedMapping::resolve(mapping, ImportType::TimeEntry, &[]);
        let mut problems = Vec::new();

        let mut back_reference = None;
        if let Some(cf_id) = back_reference_field {
            match store.custom_field_by_id(cf_id)? {
                Some(field) => {
                    let column = mapping
                        .column_for(&field.name)
                        .or_else(|| mapping.column_for(&field.alias()))
                        .map(str::to_string);
                    back_reference = Some(BackReference { field, column });
                }
                None => problems.push(i18n::t_with_args(
                    "config.custom_field_missing",
                    &[("id", &cf_id.to_string())],
                )),
            }
        }

        let issue_required = back_reference_field.is_none();
        let unmapped = REQUIRED_ATTRIBUTES
            .iter()
            .copied()
            .chain(issue_required.then_some(Attribute::IssueId))
            .filter(|attr| !resolved.is_mapped(*attr));
        for attr in unmapped {
            problems.push(i18n::t_with_args(
                "config.field_unmapped",
                &[("field", &i18n::field_label(attr.key()))],
            ));
        }

        if !problems.is_empty() {
            return Err(ImportError::Configuration(problems));
        }

        let mut warnings = mapping.warnings().to_vec();
        warnings.extend(
            resolved
                .unknown()
                .iter()
                .filter(|key| {
                    !back_reference
                        .as_ref()
                        .is_some_and(|b| **key == b.field.name || **key == b.field.alias())
                })
                .map(|key| format!("Unknown field {} is ignored", key)),
        );

        debug!(
            back_reference = ?back_reference.as_ref().map(|b| b.field.id),
            "工时导入器已就绪"
        );

        Ok(Self {
            store,
            mapping: resolved,
            back_reference,
            cleaner: DataCleaner,
            project_names: HashMap::new(),
            warnings,
        })
    }

    /// 所属问题：问题引用列优先，其次自定义字段反查
    fn resolve_issue(&self, row: &Row) -> ImportResult<RowStep<Issue>> {
        if let Some(value) = self.mapping.value(row, Attribute::IssueId) {
            let Some(id) = self.cleaner.parse_issue_reference(value) else {
                return Ok(Err(invalid_value(Attribute::IssueId, value)));
            };
            return Ok(self
                .store
                .issue_by_id(id)?
                .ok_or_else(|| not_found(Attribute::IssueId, value)));
        }

        let Some(back_reference) = &self.back_reference else {
            return Ok(Err(mandatory_missing(Attribute::IssueId)));
        };
        let Some(value) = back_reference.value(row) else {
            return Ok(Err(mandatory_missing(Attribute::IssueId)));
        };

        let missing = || {
            failure(
                RowErrorKind::NotFound,
                "row.back_reference_missing",
                &[("field", &back_reference.field.name), ("value", value)],
            )
        };
        let ids = self.store.issue_ids_by_custom_value(
            back_reference.field.id,
            value,
            BACK_REFERENCE_PROBE_LIMIT,
        )?;
        if ids.len() != 1 {
            debug!(row = row.position(), value, matches = ids.len(), "自定义字段反查未得到唯一问题");
            return Ok(Err(missing()));
        }
        Ok(self.store.issue_by_id(ids[0])?.ok_or_else(missing))
    }

    fn check_mandatory(&self, row: &Row) -> RowStep<()> {
        match REQUIRED_ATTRIBUTES
            .iter()
            .find(|attr| self.mapping.value(row, **attr).is_none())
        {
            Some(attr) => Err(mandatory_missing(*attr)),
            None => Ok(()),
        }
    }

    fn build_entry(&self, row: &Row, issue: &Issue) -> ImportResult<RowStep<TimeEntry>> {
        let m = &self.mapping;
        let login = m.value(row, Attribute::UserId).unwrap_or_default();
        let activity = m.value(row, Attribute::ActivityId).unwrap_or_default();
        let spent_on = m.value(row, Attribute::SpentOn).unwrap_or_default();
        let hours = m.value(row, Attribute::Hours).unwrap_or_default();

        let Some(spent_on_date) = self.cleaner.parse_date(spent_on) else {
            return Ok(Err(invalid_value(Attribute::SpentOn, spent_on)));
        };
        let Some(hours_value) = self.cleaner.parse_hours(hours) else {
            return Ok(Err(invalid_value(Attribute::Hours, hours)));
        };

        let project_id = match m.value(row, Attribute::Project) {
            Some(name) => match self.store.project_by_name(name)? {
                Some(project) => project.id,
                None => {
                    warn!(row = row.position(), project = name, "项目不存在，使用问题所属项目");
                    issue.project_id
                }
            },
            None => issue.project_id,
        };

        let user_id = self.store.user_by_login(login)?.map(|u| u.id);
        if user_id.is_none() {
            warn!(row = row.position(), user = login, "记录人不存在");
        }
        let activity_id = self.store.activity_by_name(activity)?.map(|a| a.id);
        if activity_id.is_none() {
            warn!(row = row.position(), activity, "活动不存在");
        }

        let comments = m
            .raw(row, Attribute::Comments)
            .map(|c| self.cleaner.truncate_comment(c))
            .filter(|c| !c.is_empty());

        Ok(Ok(TimeEntry {
            id: None,
            project_id,
            issue_id: issue.id.unwrap_or_default(),
            user_id,
            activity_id,
            spent_on: spent_on_date,
            hours: hours_value,
            comments,
        }))
    }

    fn project_name(&mut self, project_id: i64) -> ImportResult<String> {
        if let Some(name) = self.project_names.get(&project_id) {
            return Ok(name.clone());
        }
        let name = self
            .store
            .project_by_id(project_id)?
            .map_or_else(|| project_id.to_string(), |p| p.name);
        self.project_names.insert(project_id, name.clone());
        Ok(name)
    }
}

impl<'s, S: TrackerStore + ?Sized> RowImporter for TimeEntryImporter<'s, S> {
    fn warnings(&self) -> Vec<String> {
        self.warnings.clone()
    }

    fn import_row(&mut self, row: &Row) -> ImportResult<RowOutcome> {
        if let Err(outcome) = self.check_mandatory(row) {
            return Ok(outcome);
        }
        let issue = match self.resolve_issue(row)? {
            Ok(issue) => issue,
            Err(outcome) => return Ok(outcome),
        };
        let entry = match self.build_entry(row, &issue)? {
            Ok(entry) => entry,
            Err(outcome) => return Ok(outcome),
        };

        match self.store.save_time_entry(&entry) {
            Ok(id) => {
                debug!(row = row.position(), time_entry = id, issue = entry.issue_id, "工时已保存");
                let project = self.project_name(entry.project_id)?;
                Ok(RowOutcome::Created { project })
            }
            Err(err) if err.is_validation() => {
                warn!(row = row.position(), error = %err, "工时保存被拒绝");
                Ok(rejected(&err))
            }
            Err(err) => Err(err.into()),
        }
    }
}
