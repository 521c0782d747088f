// ==========================================
// CSV 数据导入系统 - API 层
// ==========================================
// 职责: 提供上传 / 提交业务接口，供 CLI 调用
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{CommitResponse, FailedRowDto, ImportApi, StageRequest, StageResponse};
