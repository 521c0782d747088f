// ==========================================
// CSV 数据导入系统 - 核心库
// ==========================================
// 职责: 将分隔符文本文件批量导入为问题 / 工时记录
// 流程: 上传暂存 → 预览 → 字段映射 → 提交（逐行导入，整批单事务）
// 技术栈: Rust + SQLite
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "en");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 暂存作业 / 目标实体存储
pub mod repository;

// 导入层 - 编码、解析、映射、逐行导入、批次协调
pub mod importer;

// 配置层 - 导入配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{Attribute, DeclaredEncoding, ImportType, RelationType};

// 领域实体
pub use domain::{ImportJob, ImportOutcome, Issue, Row, RowError, RowErrorKind, TimeEntry};

// 导入层
pub use importer::{BatchCoordinator, CommitRequest, ImportError, IssueImportOptions};

// API
pub use api::{ApiError, ApiResult, CommitResponse, ImportApi, StageRequest, StageResponse};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "csv-record-importer";
