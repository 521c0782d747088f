// ==========================================
// CSV 数据导入系统 - 暂存作业 Repository Trait
// ==========================================
// 职责: 定义暂存导入作业的数据访问接口（不包含业务逻辑）
// 不变量: 每个用户至多一个作业
// ==========================================

use crate::domain::job::ImportJob;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;

/// 删除条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPredicate {
    /// 指定用户的作业
    User(i64),
    /// 创建时间早于给定时刻的作业（过期回收）
    CreatedBefore(NaiveDateTime),
}

// ==========================================
// ImportJobRepository Trait
// ==========================================
// 实现者: ImportJobRepositoryImpl（使用 rusqlite）
pub trait ImportJobRepository {
    /// 查询用户当前的暂存作业
    fn get(&self, user_id: i64) -> RepositoryResult<Option<ImportJob>>;

    /// 写入作业，并删除该用户已有的作业
    ///
    /// # 说明
    /// - 删除与写入在同一事务内完成
    /// - 调用方不应假设旧作业在并发替换后仍然存在
    fn replace(&self, job: &ImportJob) -> RepositoryResult<()>;

    /// 按条件删除作业
    ///
    /// # 返回
    /// - Ok(usize): 删除的作业数
    fn delete_where(&self, predicate: JobPredicate) -> RepositoryResult<usize>;
}
