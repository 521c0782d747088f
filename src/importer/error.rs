// ==========================================
// CSV 数据导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 仅包含作业级错误；行级失败以 RowOutcome 值的形式返回
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型（作业级）
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 解析前拒绝 =====
    #[error("编码转换失败 ({encoding}): 第 {offset} 字节无效")]
    Encoding { encoding: String, offset: usize },

    #[error("CSV 解析失败 (行 {line}): {message}")]
    Parse { line: u64, message: String },

    #[error("字段映射配置错误: {}", .0.join("; "))]
    Configuration(Vec<String>),

    // ===== 作业状态 =====
    #[error("检测到同一用户启动了新的导入，本次导入已取消")]
    Collision,

    #[error("当前用户没有进行中的导入")]
    NoJobInProgress,

    #[error("未指定导入文件")]
    FileNotSpecified,

    // ===== 不可恢复错误（整批回滚）=====
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ImportError {
    /// 是否在事务开启前拒绝（无任何行被处理）
    pub fn is_rejected_before_rows(&self) -> bool {
        !matches!(self, ImportError::Repository(_))
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
