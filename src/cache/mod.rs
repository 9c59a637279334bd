// 计数存储模块
// 限流器和响应缓存共用同一个外部键值存储

pub mod keys;
pub mod models;
pub mod operations;

use async_trait::async_trait;
use thiserror::Error;

pub use models::{BucketState, CachedResponse};
pub use operations::{MemoryCounterStore, RedisCounterStore, ResponseCache};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("gave up on {0} after repeated concurrent updates")]
    Contention(String),
}

/// 共享的低延迟键值存储
///
/// 所有实现都必须保证 `compare_and_set` 是原子的：
/// 只有当前值与 `expected` 完全一致（`None` 表示键不存在）时才写入。
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn set_ex(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<(), StoreError>;

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
        ttl_secs: u64,
    ) -> Result<bool, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// 删除所有以 `prefix` 开头的键，返回删除数量
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
