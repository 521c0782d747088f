// ==========================================
// CSV 数据导入系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::job::DEFAULT_RETENTION_DAYS;
use crate::importer::file_parser::PREVIEW_ROW_COUNT;
use crate::repository::error::RepositoryResult;
use serde::{Deserialize, Serialize};

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait ImportConfigReader {
    /// 工时反查所属问题用的自定义字段 id
    ///
    /// # 默认值
    /// - None（工时必须映射问题引用列）
    fn get_issue_custom_field_id(&self) -> RepositoryResult<Option<i64>>;

    /// 暂存作业保留天数（超期作业在提交后被回收）
    ///
    /// # 默认值
    /// - 3
    fn get_retention_days(&self) -> RepositoryResult<i64>;

    /// 上传预览的样本行数
    ///
    /// # 默认值
    /// - 5
    fn get_sample_count(&self) -> RepositoryResult<usize>;
}

// ==========================================
// ImportSettings - 一次运行使用的配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSettings {
    pub issue_custom_field_id: Option<i64>,
    pub retention_days: i64,
    pub sample_count: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            issue_custom_field_id: None,
            retention_days: DEFAULT_RETENTION_DAYS,
            sample_count: PREVIEW_ROW_COUNT,
        }
    }
}

impl ImportSettings {
    pub fn load<C: ImportConfigReader + ?Sized>(reader: &C) -> RepositoryResult<Self> {
        Ok(Self {
            issue_custom_field_id: reader.get_issue_custom_field_id()?,
            retention_days: reader.get_retention_days()?,
            sample_count: reader.get_sample_count()?,
        })
    }
}
