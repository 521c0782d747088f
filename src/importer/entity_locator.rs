// ==========================================
// CSV 数据导入系统 - 目标记录定位
// ==========================================
// 职责: 按唯一字段 + 行内取值定位至多一条已有问题
// 规则:
// - 非纯数字值中若含 `#<数字>:`，用捕获的数字作为查找值
// - 唯一字段为 id 时按主键直接查找
// - 其他字段: 在作业项目内未关闭的问题中等值过滤，最多取 2 条
// - 0 条 → NotFound，1 条 → Found，≥2 条 → Ambiguous
// - 同一作业内按查找值缓存结果；新建记录后需 forget 对应值
// ==========================================

use crate::domain::tracker::Issue;
use crate::domain::types::Attribute;
use crate::importer::data_cleaner::extract_reference;
use crate::repository::error::RepositoryResult;
use crate::repository::tracker_store::{IssueFilterField, TrackerStore};
use std::collections::HashMap;
use tracing::debug;

/// 过滤查询上限（只需知道是否存在第二条）
pub const MATCH_PROBE_LIMIT: usize = 2;

// ==========================================
// MatchResult - 定位结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Found(Issue),
    NotFound,
    Ambiguous,
}

/// 缓存项只保存 id，命中时重新读取最新数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CachedMatch {
    Found(i64),
    NotFound,
    Ambiguous,
}

// ==========================================
// EntityLocator
// ==========================================
pub struct EntityLocator<'s, S: TrackerStore + ?Sized> {
    store: &'s S,
    project_id: i64,
    cache: HashMap<(IssueFilterField, String), CachedMatch>,
}

impl<'s, S: TrackerStore + ?Sized> EntityLocator<'s, S> {
    pub fn new(store: &'s S, project_id: i64) -> Self {
        Self {
            store,
            project_id,
            cache: HashMap::new(),
        }
    }

    /// 实际用于查找的值（复合引用提取 + 去空白）
    pub fn lookup_value(raw: &str) -> &str {
        let raw = raw.trim();
        extract_reference(raw).unwrap_or(raw)
    }

    pub fn locate(&mut self, field: IssueFilterField, raw: &str) -> RepositoryResult<MatchResult> {
        let value = Self::lookup_value(raw);
        if value.is_empty() {
            return Ok(MatchResult::NotFound);
        }

        let cache_key = (field, value.to_string());
        if let Some(cached) = self.cache.get(&cache_key).copied() {
            debug!(?field, value, ?cached, "定位缓存命中");
            return match cached {
                CachedMatch::Found(id) => Ok(self
                    .store
                    .issue_by_id(id)?
                    .map_or(MatchResult::NotFound, MatchResult::Found)),
                CachedMatch::NotFound => Ok(MatchResult::NotFound),
                CachedMatch::Ambiguous => Ok(MatchResult::Ambiguous),
            };
        }

        let result = match field {
            IssueFilterField::Attribute(Attribute::Id) => match value.parse::<i64>() {
                Ok(id) => self
                    .store
                    .issue_by_id(id)?
                    .map_or(MatchResult::NotFound, MatchResult::Found),
                Err(_) => MatchResult::NotFound,
            },
            _ => {
                let mut candidates =
                    self.store
                        .find_open_issues(self.project_id, field, value, MATCH_PROBE_LIMIT)?;
                match candidates.len() {
                    0 => MatchResult::NotFound,
                    1 => MatchResult::Found(candidates.remove(0)),
                    _ => MatchResult::Ambiguous,
                }
            }
        };

        let cached = match &result {
            MatchResult::Found(issue) => issue.id.map(CachedMatch::Found),
            MatchResult::NotFound => Some(CachedMatch::NotFound),
            MatchResult::Ambiguous => Some(CachedMatch::Ambiguous),
        };
        if let Some(cached) = cached {
            self.cache.insert(cache_key, cached);
        }
        Ok(result)
    }

    /// 使缓存失效（新建记录可能改变该值的匹配结果）
    pub fn forget(&mut self, field: IssueFilterField, raw: &str) {
        let value = Self::lookup_value(raw);
        self.cache.remove(&(field, value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::tracker_store_impl::fixtures::{new_issue, seeded_store};

    const SUBJECT: IssueFilterField = IssueFilterField::Attribute(Attribute::Subject);

    #[test]
    fn test_classification_by_candidate_count() {
        let store = seeded_store();
        let mut locator = EntityLocator::new(&store, 1);

        assert_eq!(locator.locate(SUBJECT, "Task").unwrap(), MatchResult::NotFound);

        let id = store.save_issue(&new_issue("Task"), None).unwrap();
        locator.forget(SUBJECT, "Task");
        match locator.locate(SUBJECT, "Task").unwrap() {
            MatchResult::Found(issue) => assert_eq!(issue.id, Some(id)),
            other => panic!("expected found, got {other:?}"),
        }

        store.save_issue(&new_issue("Task"), None).unwrap();
        locator.forget(SUBJECT, "Task");
        assert_eq!(locator.locate(SUBJECT, "Task").unwrap(), MatchResult::Ambiguous);
    }

    #[test]
    fn test_id_lookup_uses_composite_reference() {
        let store = seeded_store();
        let id = store.save_issue(&new_issue("Target"), None).unwrap();
        let mut locator = EntityLocator::new(&store, 1);
        let by_id = IssueFilterField::Attribute(Attribute::Id);

        let value = format!("id: #{}: Target", id);
        assert!(matches!(locator.locate(by_id, &value).unwrap(), MatchResult::Found(_)));
        assert!(matches!(locator.locate(by_id, &id.to_string()).unwrap(), MatchResult::Found(_)));
        assert_eq!(locator.locate(by_id, "abc").unwrap(), MatchResult::NotFound);
        assert_eq!(locator.locate(by_id, "").unwrap(), MatchResult::NotFound);
    }

    #[test]
    fn test_cached_result_until_forgotten() {
        let store = seeded_store();
        let mut locator = EntityLocator::new(&store, 1);
        assert_eq!(locator.locate(SUBJECT, "Later").unwrap(), MatchResult::NotFound);

        store.save_issue(&new_issue("Later"), None).unwrap();
        assert_eq!(locator.locate(SUBJECT, "Later").unwrap(), MatchResult::NotFound);

        locator.forget(SUBJECT, "Later");
        assert!(matches!(locator.locate(SUBJECT, "Later").unwrap(), MatchResult::Found(_)));
    }

    #[test]
    fn test_found_cache_returns_fresh_issue() {
        let store = seeded_store();
        let mut issue = new_issue("Fresh");
        issue.custom_values.insert(1, "R-1".to_string());
        let id = store.save_issue(&issue, None).unwrap();
        let by_ref = IssueFilterField::CustomField(1);

        let mut locator = EntityLocator::new(&store, 1);
        assert!(matches!(locator.locate(by_ref, "R-1").unwrap(), MatchResult::Found(_)));

        let mut loaded = store.issue_by_id(id).unwrap().unwrap();
        loaded.description = Some("changed".to_string());
        store.save_issue(&loaded, None).unwrap();

        match locator.locate(by_ref, "R-1").unwrap() {
            MatchResult::Found(issue) => assert_eq!(issue.description.as_deref(), Some("changed")),
            other => panic!("expected found, got {other:?}"),
        }
    }

    #[test]
    fn test_other_project_not_candidate() {
        let store = seeded_store();
        store.save_issue(&new_issue("Elsewhere"), None).unwrap();
        let mut locator = EntityLocator::new(&store, 2);
        assert_eq!(locator.locate(SUBJECT, "Elsewhere").unwrap(), MatchResult::NotFound);
    }
}
