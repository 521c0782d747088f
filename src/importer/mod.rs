// ==========================================
// CSV 数据导入系统 - 导入层
// ==========================================
// 职责: 分隔文本 → 目标实体的导入流水线
// 流程: 编码转换 → 解析 → 字段映射 → 目标定位 → 行导入 → 批处理汇总
// ==========================================

// 模块声明
pub mod batch_coordinator;
pub mod data_cleaner;
pub mod encoding;
pub mod entity_locator;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod issue_importer;
pub mod row_importer_trait;
pub mod time_entry_importer;

// 重导出核心类型
pub use batch_coordinator::{summarize, BatchCoordinator, CommitRequest};
pub use data_cleaner::DataCleaner;
pub use encoding::{normalize, NormalizedText};
pub use entity_locator::{EntityLocator, MatchResult};
pub use error::{ImportError, ImportResult};
pub use field_mapper::{available_fields, ColumnMapping, FieldKey, FieldOption, ResolvedMapping};
pub use file_parser::{DelimitedParser, Preview, Rows};
pub use issue_importer::IssueImporter;
pub use time_entry_importer::TimeEntryImporter;

// 重导出 Trait 接口
pub use row_importer_trait::{IssueImportOptions, RowImporter};
