// ==========================================
// CSV 数据导入系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换导入层 / 仓储层错误为用户友好的错误消息
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("导入冲突: {0}")]
    ImportCollision(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::ValidationError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::ValidationError(format!("外键约束违反: {}", msg))
            }
            RepositoryError::StoredValueError { field, message } => {
                ApiError::InternalError(format!("字段{}存储值损坏: {}", field, message))
            }
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Collision => ApiError::ImportCollision(err.to_string()),
            ImportError::NoJobInProgress => ApiError::NotFound(err.to_string()),
            ImportError::FileNotSpecified => ApiError::InvalidInput(err.to_string()),
            ImportError::Configuration(_) => ApiError::InvalidInput(err.to_string()),
            ImportError::Encoding { .. } | ImportError::Parse { .. } => {
                ApiError::ImportError(err.to_string())
            }
            ImportError::Repository(inner) => inner.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
