use std::sync::Arc;
use std::time::Duration;

use crate::cache::{
    CounterStore, StoreError,
    keys::{RESPONSE_CACHE_PREFIX, response_cache_key},
    models::CachedResponse,
};

/// 响应缓存操作
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CounterStore>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CounterStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// 根据请求形状生成缓存键
    pub fn key(method: &str, path: &str, query: &str) -> String {
        response_cache_key(method, path, query)
    }

    /// 获取缓存的响应
    pub async fn get(&self, key: &str) -> Result<Option<CachedResponse>, StoreError> {
        match self.store.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// 缓存响应，`ttl` 为零时使用默认过期时间
    pub async fn set(
        &self,
        key: &str,
        entry: &CachedResponse,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let ttl = if ttl.is_zero() { self.ttl } else { ttl };
        let bytes = serde_json::to_vec(entry)?;
        self.store.set_ex(key, &bytes, ttl.as_secs()).await
    }

    /// 写入失败只记日志，不影响客户端看到的响应
    pub async fn store(&self, key: &str, entry: CachedResponse) {
        match self.set(key, &entry, self.ttl).await {
            Ok(()) => tracing::debug!(
                key,
                bytes = entry.body.len(),
                ttl_secs = self.ttl.as_secs(),
                "Cached response"
            ),
            Err(e) => tracing::warn!(key, "Failed to cache response: {}", e),
        }
    }

    /// 删除单个缓存项
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.store.delete(key).await
    }

    /// 清空全部响应缓存，不在请求热路径上调用
    pub async fn clear_all(&self) -> Result<u64, StoreError> {
        self.store.delete_prefix(RESPONSE_CACHE_PREFIX).await
    }
}
