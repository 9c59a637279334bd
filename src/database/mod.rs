// 数据库模块
// 身份存储和请求日志的定义及 Postgres 实现

pub mod models; // 数据库实体定义
pub mod repositories; // 存储库实现

use async_trait::async_trait;
use uuid::Uuid;

pub use models::{ApiKey, NewApiKey, RequestLog};
pub use repositories::PgStore;

/// 调用方身份存储
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// 按 key 查找，不过滤停用状态，由调用方判断
    async fn find_by_key(&self, key: &str) -> Result<Option<ApiKey>, sqlx::Error>;

    async fn create(&self, new_key: NewApiKey) -> Result<ApiKey, sqlx::Error>;

    /// 按创建时间倒序
    async fn list(&self) -> Result<Vec<ApiKey>, sqlx::Error>;

    /// 返回是否真的删除了记录
    async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error>;

    /// 切换启用状态，返回更新后的记录
    async fn toggle_active(&self, id: Uuid) -> Result<Option<ApiKey>, sqlx::Error>;

    async fn ping(&self) -> Result<(), sqlx::Error>;
}

/// 请求日志存储
#[async_trait]
pub trait RequestLogStore: Send + Sync {
    async fn insert(&self, entry: &RequestLog) -> Result<(), sqlx::Error>;
}
