// ==========================================
// CSV 数据导入系统 - 问题（主记录）行导入器
// ==========================================
// 职责: 将一行映射为新建或更新的问题并落库
// 流程: 定位目标 → 名称查找 → 字段赋值 → 必填校验 → 落库
// 规则:
// - 更新模式下唯一字段歧义匹配 → 记为失败并终止剩余行
// - 匹配到其他项目（未允许跨项目）或已关闭且未重新打开 → 跳过
// - 名称查找不到时保留原值（新建时为默认值），只记日志
// ==========================================

use crate::domain::outcome::{RowError, RowErrorKind, RowOutcome, SkipReason};
use crate::domain::row::Row;
use crate::domain::tracker::{CustomField, Issue, Journal, Project, Tracker, User};
use crate::domain::types::{Attribute, ImportType};
use crate::i18n;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::entity_locator::{EntityLocator, MatchResult};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{ColumnMapping, FieldKey, ResolvedMapping};
use crate::importer::row_importer_trait::{
    failure, invalid_value, mandatory_missing, not_found, rejected, IssueImportOptions,
    RowImporter, RowStep,
};
use crate::repository::tracker_store::{IssueFilterField, TrackerStore};
use tracing::{debug, warn};

// ==========================================
// UniqueField - 更新模式的匹配字段
// ==========================================
#[derive(Debug, Clone)]
struct UniqueField {
    filter: IssueFilterField,
    column: String,        // 外部列名
    key: String,           // 用户选择的内部字段键
    alias: Option<String>, // 通过自定义字段匹配时的别名（cf_<id>）
}

/// 单元格为名称、落库为 id 的属性，不能直接用作匹配条件
const NAME_LOOKUP_ATTRIBUTES: &[Attribute] = &[
    Attribute::Project,
    Attribute::Tracker,
    Attribute::Status,
    Attribute::Priority,
    Attribute::Author,
    Attribute::AssignedTo,
    Attribute::Category,
    Attribute::FixedVersion,
];

impl UniqueField {
    /// 由外部列名解析
    ///
    /// # 返回
    /// - Err(String): 列未映射 / 映射到无法过滤或按名称查找的字段（本地化消息）
    fn resolve(column: &str, mapping: &ColumnMapping, custom_fields: &[CustomField]) -> Result<Self, String> {
        let unmapped = || i18n::t_with_args("config.unique_field_unmapped", &[("column", column)]);
        let key = mapping.internal_for(column).ok_or_else(unmapped)?;
        let (filter, alias) = match FieldKey::resolve(key, ImportType::Issue, custom_fields) {
            Some(FieldKey::Attribute(attr)) if NAME_LOOKUP_ATTRIBUTES.contains(&attr) => {
                return Err(i18n::t_with_args(
                    "config.unique_field_by_name",
                    &[("column", column), ("field", &i18n::field_label(attr.key()))],
                ));
            }
            Some(FieldKey::Attribute(attr)) if attr.issue_column().is_some() => {
                (IssueFilterField::Attribute(attr), None)
            }
            Some(FieldKey::CustomField(id)) => {
                let cf = custom_fields.iter().find(|cf| cf.id == id).ok_or_else(unmapped)?;
                let alias = (cf.name != cf.alias()).then(|| cf.alias());
                (IssueFilterField::CustomField(id), alias)
            }
            _ => return Err(unmapped()),
        };
        Ok(Self {
            filter,
            column: column.to_string(),
            key: key.to_string(),
            alias,
        })
    }
}

// ==========================================
// IssueImporter
// ==========================================
pub struct IssueImporter<'s, S: TrackerStore + ?Sized> {
    store: &'s S,
    project: Project, // 作业所属项目
    user: User,       // 发起导入的用户
    options: IssueImportOptions,
    mapping: ResolvedMapping,
    unique: Option<UniqueField>,
    default_tracker: Option<Tracker>,
    locator: EntityLocator<'s, S>,
    cleaner: DataCleaner,
    warnings: Vec<String>,
}

impl<'s, S: TrackerStore + ?Sized> IssueImporter<'s, S> {
    /// 校验映射并构造导入器
    ///
    /// # 返回
    /// - Err(ImportError::Configuration): 标题未映射 / 更新模式缺少唯一字段 / 默认跟踪无效
    pub fn prepare(
        store: &'s S,
        project: Project,
        user: User,
        options: IssueImportOptions,
        mapping: &ColumnMapping,
    ) -> ImportResult<Self> {
        let custom_fields = store.issue_custom_fields(project.id)?;
        let resolved = ResolvedMapping::resolve(mapping, ImportType::Issue, &custom_fields);
        let mut problems = Vec::new();

        if !resolved.is_mapped(Attribute::Subject) {
            problems.push(i18n::t_with_args(
                "config.field_unmapped",
                &[("field", &i18n::field_label(Attribute::Subject.key()))],
            ));
        }

        let mut unique = None;
        if options.update_issue {
            match options.unique_field.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
                None => problems.push(i18n::t("config.unique_field_missing")),
                Some(column) => match UniqueField::resolve(column, mapping, &custom_fields) {
                    Ok(field) => unique = Some(field),
                    Err(problem) => problems.push(problem),
                },
            }
        }

        let mut default_tracker = None;
        if let Some(tracker_id) = options.default_tracker {
            match store.tracker_by_id(tracker_id)? {
                Some(tracker) => default_tracker = Some(tracker),
                None => problems.push(i18n::t_with_args(
                    "config.default_tracker_invalid",
                    &[("tracker", &tracker_id.to_string())],
                )),
            }
        }

        if !problems.is_empty() {
            return Err(ImportError::Configuration(problems));
        }

        let mut warnings = mapping.warnings().to_vec();
        warnings.extend(
            resolved
                .unknown()
                .iter()
                .map(|key| format!("Unknown field {} is ignored", key)),
        );

        debug!(
            project = %project.name,
            update = options.update_issue,
            unique = ?unique.as_ref().map(|u| &u.key),
            "问题导入器已就绪"
        );

        Ok(Self {
            store,
            locator: EntityLocator::new(store, project.id),
            project,
            user,
            options,
            mapping: resolved,
            unique,
            default_tracker,
            cleaner: DataCleaner,
            warnings,
        })
    }

    // ==========================================
    // 定位目标问题
    // ==========================================

    /// 返回 (待写入的问题, 更新前快照)；新建时快照为 None
    fn target_issue(&mut self, row: &Row) -> ImportResult<RowStep<(Issue, Option<Issue>)>> {
        let Some(unique) = self.unique.clone() else {
            return Ok(Ok((Issue::new(self.project.id), None)));
        };
        let raw = row.raw(&unique.column).unwrap_or_default();

        match self.locator.locate(unique.filter, raw)? {
            MatchResult::Ambiguous => {
                let value = EntityLocator::<S>::lookup_value(raw);
                let position = row.position().to_string();
                let error = RowError::new(
                    RowErrorKind::AmbiguousMatch,
                    i18n::t_with_args("row.ambiguous", &[("field", &unique.key), ("value", value)]),
                );
                let warning = match &unique.alias {
                    Some(alias) => i18n::t_with_args(
                        "row.ambiguous_alias",
                        &[("field", &unique.key), ("alias", alias), ("row", &position)],
                    ),
                    None => i18n::t_with_args(
                        "row.ambiguous_stop",
                        &[("row", &position), ("field", &unique.key)],
                    ),
                };
                warn!(row = row.position(), field = %unique.key, value, "唯一字段匹配到多条记录，终止导入");
                Ok(Err(RowOutcome::Abort { error, warning }))
            }
            MatchResult::Found(issue) => {
                if issue.project_id != self.project.id && !self.options.update_other_project {
                    debug!(row = row.position(), issue = ?issue.id, "匹配到其他项目的问题，跳过");
                    return Ok(Err(RowOutcome::Skipped(SkipReason::OtherProject)));
                }
                if self.stays_closed(row, &issue)? {
                    debug!(row = row.position(), issue = ?issue.id, "匹配到已关闭的问题，跳过");
                    return Ok(Err(RowOutcome::Skipped(SkipReason::ClosedIssue)));
                }
                let before = issue.clone();
                Ok(Ok((issue, Some(before))))
            }
            MatchResult::NotFound if self.options.ignore_non_exist => {
                debug!(row = row.position(), "未匹配到问题，按设置跳过");
                Ok(Err(RowOutcome::Skipped(SkipReason::Unmatched)))
            }
            MatchResult::NotFound => Ok(Ok((Issue::new(self.project.id), None))),
        }
    }

    /// 已关闭的问题且行内未给出未关闭的状态
    fn stays_closed(&self, row: &Row, issue: &Issue) -> ImportResult<bool> {
        let current = match issue.status_id {
            Some(id) => self.store.status_by_id(id)?,
            None => None,
        };
        if !current.is_some_and(|s| s.is_closed) {
            return Ok(false);
        }
        let requested = match self.mapping.value(row, Attribute::Status) {
            Some(name) => self.store.status_by_name(name)?,
            None => None,
        };
        Ok(!requested.is_some_and(|s| !s.is_closed))
    }

    // ==========================================
    // 名称查找（查不到时保留原值）
    // ==========================================

    /// 按名称查找关联记录并赋值
    ///
    /// 项目列只决定新建问题的归属；更新时问题留在原项目，
    /// 返回的项目名仅用于统计受影响项目
    fn apply_lookups(&self, row: &Row, issue: &mut Issue) -> ImportResult<Option<String>> {
        let m = &self.mapping;

        let mut named_project = None;
        if let Some(name) = m.value(row, Attribute::Project) {
            match self.store.project_by_name(name)? {
                Some(project) => {
                    if issue.is_new() {
                        issue.project_id = project.id;
                    }
                    named_project = Some(project.name);
                }
                None => warn!(row = row.position(), project = name, "项目不存在，保留原值"),
            }
        }

        let tracker = match m.value(row, Attribute::Tracker) {
            Some(name) => {
                let found = self.store.tracker_by_name(name)?;
                if found.is_none() {
                    warn!(row = row.position(), tracker = name, "跟踪不存在，使用默认跟踪");
                }
                found
            }
            None => None,
        };
        match (tracker, &self.default_tracker) {
            (Some(tracker), _) => issue.tracker_id = Some(tracker.id),
            (None, Some(default)) if issue.is_new() || issue.tracker_id.is_none() => {
                issue.tracker_id = Some(default.id)
            }
            _ => {}
        }

        if let Some(name) = m.value(row, Attribute::Status) {
            match self.store.status_by_name(name)? {
                Some(status) => issue.status_id = Some(status.id),
                None => warn!(row = row.position(), status = name, "状态不存在，保留原值"),
            }
        }
        if issue.status_id.is_none() {
            issue.status_id = self.store.default_status()?.map(|s| s.id);
        }

        if let Some(name) = m.value(row, Attribute::Priority) {
            match self.store.priority_by_name(name)? {
                Some(priority) => issue.priority_id = Some(priority.id),
                None => warn!(row = row.position(), priority = name, "优先级不存在，保留原值"),
            }
        }
        if issue.priority_id.is_none() {
            issue.priority_id = self.store.default_priority()?.map(|p| p.id);
        }

        let author = match m.value(row, Attribute::Author) {
            Some(login) => self.store.user_by_login(login)?,
            None => None,
        };
        match author {
            Some(author) => issue.author_id = Some(author.id),
            None if issue.author_id.is_none() => issue.author_id = Some(self.user.id),
            None => {}
        }

        if let Some(login) = m.value(row, Attribute::AssignedTo) {
            match self.store.user_by_login(login)? {
                Some(user) => issue.assigned_to_id = Some(user.id),
                None => warn!(row = row.position(), assignee = login, "指派用户不存在，保留原值"),
            }
        }

        if let Some(name) = m.value(row, Attribute::Category) {
            match self.store.category_by_name(issue.project_id, name)? {
                Some(category) => issue.category_id = Some(category.id),
                None => warn!(row = row.position(), category = name, "类别不存在，保留原值"),
            }
        }

        if let Some(name) = m.value(row, Attribute::FixedVersion) {
            match self.store.version_by_name(issue.project_id, name)? {
                Some(version) => issue.fixed_version_id = Some(version.id),
                None => warn!(row = row.position(), version = name, "目标版本不存在，保留原值"),
            }
        }

        Ok(named_project)
    }

    // ==========================================
    // 字段赋值（行内有值才覆盖）
    // ==========================================

    fn parse_cell<T>(
        &self,
        row: &Row,
        attr: Attribute,
        parse: impl Fn(&DataCleaner, &str) -> Option<T>,
    ) -> RowStep<Option<T>> {
        match self.mapping.value(row, attr) {
            None => Ok(None),
            Some(value) => parse(&self.cleaner, value)
                .map(Some)
                .ok_or_else(|| invalid_value(attr, value)),
        }
    }

    fn apply_values(&self, row: &Row, issue: &mut Issue) -> RowStep<()> {
        if let Some(subject) = self.mapping.value(row, Attribute::Subject) {
            issue.subject = subject.to_string();
        }
        if issue.subject.trim().is_empty() {
            return Err(mandatory_missing(Attribute::Subject));
        }

        if issue.is_new() {
            if let Some(id) = self.parse_cell(row, Attribute::Id, |_, v| v.parse::<i64>().ok().filter(|id| *id > 0))? {
                issue.id = Some(id);
            }
            if let Some(created_on) = self.parse_cell(row, Attribute::CreatedOn, DataCleaner::parse_datetime)? {
                issue.created_on = Some(created_on);
            }
        }

        if let Some(description) = self.mapping.text(row, Attribute::Description) {
            issue.description = Some(description.to_string());
        }
        if let Some(date) = self.parse_cell(row, Attribute::StartDate, DataCleaner::parse_date)? {
            issue.start_date = Some(date);
        }
        if let Some(date) = self.parse_cell(row, Attribute::DueDate, DataCleaner::parse_date)? {
            issue.due_date = Some(date);
        }
        if let Some(ratio) = self.parse_cell(row, Attribute::DoneRatio, DataCleaner::parse_ratio)? {
            issue.done_ratio = ratio;
        }
        if let Some(hours) = self.parse_cell(row, Attribute::EstimatedHours, DataCleaner::parse_hours)? {
            issue.estimated_hours = Some(hours);
        }
        if let Some(parent) = self.parse_cell(row, Attribute::ParentIssue, DataCleaner::parse_issue_reference)? {
            issue.parent_id = Some(parent);
        }

        for (cf, column) in self.mapping.custom_fields() {
            if let Some(value) = row.value(column) {
                issue.custom_values.insert(cf.id, value.trim().to_string());
            }
        }

        for (relation, column) in self.mapping.relations() {
            let Some(value) = row.value(column) else {
                continue;
            };
            for reference in self.cleaner.split_list(value) {
                let target = self.cleaner.parse_issue_reference(reference).ok_or_else(|| {
                    failure(
                        RowErrorKind::InvalidValue,
                        "row.invalid_value",
                        &[("field", &i18n::t(relation.label_key())), ("value", reference)],
                    )
                })?;
                if !issue.relations.contains(&(*relation, target)) {
                    issue.relations.push((*relation, target));
                }
            }
        }

        Ok(())
    }

    /// 关注者（逗号分隔的登录名，未知登录名记为行失败）
    fn resolve_watchers(&self, row: &Row, issue: &mut Issue) -> ImportResult<RowStep<()>> {
        let Some(value) = self.mapping.value(row, Attribute::Watchers) else {
            return Ok(Ok(()));
        };
        for login in self.cleaner.split_list(value) {
            match self.store.user_by_login(login)? {
                Some(user) if !issue.watcher_ids.contains(&user.id) => issue.watcher_ids.push(user.id),
                Some(_) => {}
                None => return Ok(Err(not_found(Attribute::Watchers, login))),
            }
        }
        Ok(Ok(()))
    }

    // ==========================================
    // 落库
    // ==========================================

    fn journal_for(&self, row: &Row, issue: &Issue, before: &Issue) -> Journal {
        let notes = self
            .options
            .journal_field
            .as_deref()
            .and_then(|column| row.raw(column))
            .map(|notes| notes.trim().to_string())
            .unwrap_or_default();
        Journal {
            user_id: self.user.id,
            notes,
            details: issue.changes_since(before),
        }
    }

    fn project_name(&self, project_id: i64) -> ImportResult<String> {
        if project_id == self.project.id {
            return Ok(self.project.name.clone());
        }
        Ok(self
            .store
            .project_by_id(project_id)?
            .map_or_else(|| project_id.to_string(), |p| p.name))
    }
}

impl<'s, S: TrackerStore + ?Sized> RowImporter for IssueImporter<'s, S> {
    fn warnings(&self) -> Vec<String> {
        self.warnings.clone()
    }

    fn import_row(&mut self, row: &Row) -> ImportResult<RowOutcome> {
        let (mut issue, before) = match self.target_issue(row)? {
            Ok(target) => target,
            Err(outcome) => return Ok(outcome),
        };

        let named_project = self.apply_lookups(row, &mut issue)?;
        if let Err(outcome) = self.apply_values(row, &mut issue) {
            return Ok(outcome);
        }
        if let Err(outcome) = self.resolve_watchers(row, &mut issue)? {
            return Ok(outcome);
        }

        let journal = before.as_ref().map(|before| self.journal_for(row, &issue, before));
        match self.store.save_issue(&issue, journal.as_ref()) {
            Ok(id) => {
                if let Some(unique) = &self.unique {
                    let raw = row.raw(&unique.column).unwrap_or_default();
                    self.locator.forget(unique.filter, raw);
                }
                let project = match named_project {
                    Some(name) => name,
                    None => self.project_name(issue.project_id)?,
                };
                debug!(row = row.position(), issue = id, created = issue.is_new(), "问题已保存");
                Ok(if issue.is_new() {
                    RowOutcome::Created { project }
                } else {
                    RowOutcome::Updated { project }
                })
            }
            Err(err) if err.is_validation() => {
                warn!(row = row.position(), error = %err, "问题保存被拒绝");
                Ok(rejected(&err))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::tracker_store_impl::fixtures::{new_issue, seeded_store};
    use crate::repository::TrackerStoreImpl;
    use std::sync::Arc;

    fn alpha() -> Project {
        Project {
            id: 1,
            name: "Alpha".to_string(),
        }
    }

    fn admin() -> User {
        User {
            id: 1,
            login: "admin".to_string(),
        }
    }

    fn row(position: usize, headers: &[&str], cells: &[&str]) -> Row {
        let headers: Arc<[String]> = headers.iter().map(|h| h.to_string()).collect::<Vec<_>>().into();
        Row::new(position, headers, cells.iter().map(|c| c.to_string()).collect())
    }

    fn importer<'s>(
        store: &'s TrackerStoreImpl,
        options: IssueImportOptions,
        pairs: &[(&str, &str)],
    ) -> IssueImporter<'s, TrackerStoreImpl> {
        let mapping = ColumnMapping::from_pairs(pairs.iter().copied());
        IssueImporter::prepare(store, alpha(), admin(), options, &mapping).unwrap()
    }

    fn create_only() -> IssueImportOptions {
        IssueImportOptions {
            default_tracker: Some(1),
            ..Default::default()
        }
    }

    fn update_by(column: &str) -> IssueImportOptions {
        IssueImportOptions {
            update_issue: true,
            unique_field: Some(column.to_string()),
            ..create_only()
        }
    }

    #[test]
    fn test_subject_must_be_mapped() {
        let store = seeded_store();
        let mapping = ColumnMapping::from_pairs(vec![("State", "status")]);
        let result = IssueImporter::prepare(&store, alpha(), admin(), IssueImportOptions::default(), &mapping);
        assert!(matches!(result, Err(ImportError::Configuration(ref p)) if p.len() == 1));
    }

    #[test]
    fn test_update_mode_requires_mapped_unique_column() {
        let store = seeded_store();
        let mapping = ColumnMapping::from_pairs(vec![("Title", "subject")]);

        let missing = IssueImporter::prepare(
            &store,
            alpha(),
            admin(),
            IssueImportOptions { update_issue: true, ..Default::default() },
            &mapping,
        );
        assert!(matches!(missing, Err(ImportError::Configuration(_))));

        let unmapped = IssueImporter::prepare(&store, alpha(), admin(), update_by("Ref"), &mapping);
        assert!(matches!(unmapped, Err(ImportError::Configuration(_))));

        let bad_tracker = IssueImporter::prepare(
            &store,
            alpha(),
            admin(),
            IssueImportOptions { default_tracker: Some(77), ..Default::default() },
            &mapping,
        );
        assert!(matches!(bad_tracker, Err(ImportError::Configuration(_))));
    }

    #[test]
    fn test_name_lookup_fields_cannot_be_unique() {
        let store = seeded_store();
        for key in ["assigned_to", "author", "tracker", "status", "priority", "project"] {
            let mapping = ColumnMapping::from_pairs(vec![("Title", "subject"), ("Owner", key)]);
            let result = IssueImporter::prepare(&store, alpha(), admin(), update_by("Owner"), &mapping);
            match result {
                Err(ImportError::Configuration(problems)) => {
                    assert_eq!(problems.len(), 1, "{}", key);
                    assert!(problems[0].contains("Owner"), "{}", problems[0]);
                }
                _ => panic!("{} accepted as unique field", key),
            }
        }

        let mapping = ColumnMapping::from_pairs(vec![("Title", "subject"), ("Start", "start_date")]);
        assert!(IssueImporter::prepare(&store, alpha(), admin(), update_by("Start"), &mapping).is_ok());
    }

    #[test]
    fn test_create_applies_defaults_and_values() {
        let store = seeded_store();
        let mut imp = importer(
            &store,
            IssueImportOptions { default_tracker: Some(2), ..Default::default() },
            &[("Title", "subject"), ("Start", "start_date"), ("Done", "done_ratio"), ("Ref", "External ref")],
        );

        let outcome = imp
            .import_row(&row(1, &["Title", "Start", "Done", "Ref"], &["Fix bug", "2026-02-01", "40%", "EXT-9"]))
            .unwrap();
        assert_eq!(outcome, RowOutcome::Created { project: "Alpha".to_string() });

        let ids = store.issue_ids_by_custom_value(1, "EXT-9", 2).unwrap();
        let issue = store.issue_by_id(ids[0]).unwrap().unwrap();
        assert_eq!(issue.tracker_id, Some(2));
        assert_eq!(issue.status_id, Some(1));
        assert_eq!(issue.priority_id, Some(4));
        assert_eq!(issue.author_id, Some(1));
        assert_eq!(issue.done_ratio, 40);
    }

    #[test]
    fn test_empty_subject_is_mandatory_failure() {
        let store = seeded_store();
        let mut imp = importer(&store, create_only(), &[("Title", "subject")]);
        let outcome = imp.import_row(&row(2, &["Title"], &["  "])).unwrap();
        assert!(matches!(
            outcome,
            RowOutcome::Failed(RowError { kind: RowErrorKind::MandatoryFieldMissing, .. })
        ));
    }

    #[test]
    fn test_unparseable_date_is_invalid_value() {
        let store = seeded_store();
        let mut imp = importer(&store, create_only(), &[("Title", "subject"), ("Due", "due_date")]);
        let outcome = imp.import_row(&row(1, &["Title", "Due"], &["A", "next week"])).unwrap();
        assert!(matches!(
            outcome,
            RowOutcome::Failed(RowError { kind: RowErrorKind::InvalidValue, .. })
        ));
    }

    #[test]
    fn test_unknown_watcher_is_not_found() {
        let store = seeded_store();
        let mut imp = importer(&store, create_only(), &[("Title", "subject"), ("Watch", "watchers")]);
        let outcome = imp.import_row(&row(1, &["Title", "Watch"], &["A", "jsmith, ghost"])).unwrap();
        assert!(matches!(
            outcome,
            RowOutcome::Failed(RowError { kind: RowErrorKind::NotFound, .. })
        ));
    }

    #[test]
    fn test_store_rejection_is_truncated_validation_failure() {
        let store = seeded_store();
        let mut imp = importer(&store, create_only(), &[("Title", "subject"), ("Done", "done_ratio")]);
        let outcome = imp.import_row(&row(1, &["Title", "Done"], &["A", "250"])).unwrap();
        match outcome {
            RowOutcome::Failed(error) => {
                assert_eq!(error.kind, RowErrorKind::Validation);
                assert!(error.message.contains("% Done is not included in the list"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_update_writes_journal_with_notes() {
        let store = seeded_store();
        let mut existing = new_issue("Old title");
        existing.custom_values.insert(1, "R-1".to_string());
        let id = store.save_issue(&existing, None).unwrap();

        let mut imp = importer(
            &store,
            IssueImportOptions {
                journal_field: Some("Note".to_string()),
                ..update_by("Ref")
            },
            &[("Ref", "External ref"), ("Title", "subject"), ("Note", "")],
        );
        let outcome = imp
            .import_row(&row(1, &["Ref", "Title", "Note"], &["R-1", "New title", "bulk edit"]))
            .unwrap();
        assert_eq!(outcome, RowOutcome::Updated { project: "Alpha".to_string() });
        assert_eq!(store.issue_by_id(id).unwrap().unwrap().subject, "New title");
    }

    #[test]
    fn test_ambiguous_match_aborts_with_alias_warning() {
        let store = seeded_store();
        for _ in 0..2 {
            let mut issue = new_issue("Twin");
            issue.custom_values.insert(1, "DUP".to_string());
            store.save_issue(&issue, None).unwrap();
        }

        let mut imp = importer(&store, update_by("Ref"), &[("Ref", "External ref"), ("Title", "subject")]);
        match imp.import_row(&row(3, &["Ref", "Title"], &["DUP", "Twin"])).unwrap() {
            RowOutcome::Abort { error, warning } => {
                assert_eq!(error.kind, RowErrorKind::AmbiguousMatch);
                assert!(warning.contains("cf_1"));
            }
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[test]
    fn test_skip_rules_for_closed_other_project_and_unmatched() {
        let store = seeded_store();
        let mut closed = new_issue("Done already");
        closed.status_id = Some(5);
        let closed_id = store.save_issue(&closed, None).unwrap();
        let mut foreign = new_issue("Foreign");
        foreign.project_id = 2;
        let foreign_id = store.save_issue(&foreign, None).unwrap();

        let mut imp = importer(
            &store,
            IssueImportOptions { ignore_non_exist: true, ..update_by("Id") },
            &[("Id", "id"), ("Title", "subject"), ("State", "status")],
        );
        let headers = ["Id", "Title", "State"];

        assert_eq!(
            imp.import_row(&row(1, &headers, &[&closed_id.to_string(), "x", ""])).unwrap(),
            RowOutcome::Skipped(SkipReason::ClosedIssue)
        );
        assert_eq!(
            imp.import_row(&row(2, &headers, &[&foreign_id.to_string(), "x", ""])).unwrap(),
            RowOutcome::Skipped(SkipReason::OtherProject)
        );
        assert_eq!(
            imp.import_row(&row(3, &headers, &["9999", "x", ""])).unwrap(),
            RowOutcome::Skipped(SkipReason::Unmatched)
        );
        assert_eq!(
            imp.import_row(&row(4, &headers, &[&closed_id.to_string(), "Reopened", "In Progress"])).unwrap(),
            RowOutcome::Updated { project: "Alpha".to_string() }
        );
    }

    #[test]
    fn test_project_column_does_not_move_updated_issue() {
        let store = seeded_store();
        let existing = store.save_issue(&new_issue("Stays home"), None).unwrap();
        let mut imp = importer(
            &store,
            update_by("Id"),
            &[("Id", "id"), ("Title", "subject"), ("Where", "project")],
        );
        let headers = ["Id", "Title", "Where"];

        let outcome = imp
            .import_row(&row(1, &headers, &[&existing.to_string(), "Renamed", "Beta"]))
            .unwrap();
        assert_eq!(outcome, RowOutcome::Updated { project: "Beta".to_string() });

        let stored = store.issue_by_id(existing).unwrap().unwrap();
        assert_eq!(stored.project_id, 1);
        assert_eq!(stored.subject, "Renamed");

        let created = imp
            .import_row(&row(2, &headers, &["", "Fresh", "Beta"]))
            .unwrap();
        assert_eq!(created, RowOutcome::Created { project: "Beta".to_string() });
    }

    #[test]
    fn test_relations_and_parent_references() {
        let store = seeded_store();
        let target = store.save_issue(&new_issue("Target"), None).unwrap();
        let mut imp = importer(
            &store,
            create_only(),
            &[("Title", "subject"), ("Blocks", "blocks"), ("Parent", "parent_issue")],
        );

        let reference = format!("#{}", target);
        let outcome = imp
            .import_row(&row(1, &["Title", "Blocks", "Parent"], &["Child", &reference, &reference]))
            .unwrap();
        assert!(matches!(outcome, RowOutcome::Created { .. }));

        let bad = imp
            .import_row(&row(2, &["Title", "Blocks", "Parent"], &["Child 2", "soon", ""]))
            .unwrap();
        assert!(matches!(
            bad,
            RowOutcome::Failed(RowError { kind: RowErrorKind::InvalidValue, .. })
        ));
    }
}
