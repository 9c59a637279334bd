use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient, Script, aio::MultiplexedConnection};
use std::sync::Arc;

use crate::cache::{CounterStore, StoreError};

/// 只有当前值等于期望值时才写入，整个比较和写入在 Redis 内部一次完成
const COMPARE_AND_SET: &str = r"
local current = redis.call('GET', KEYS[1])
if ARGV[1] == '1' then
    if current ~= ARGV[2] then
        return 0
    end
elseif current then
    return 0
end
redis.call('SET', KEYS[1], ARGV[3], 'EX', ARGV[4])
return 1
";

const SCAN_BATCH: usize = 100;

/// 基于 Redis 的计数存储
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: MultiplexedConnection,
    compare_and_set: Arc<Script>,
}

impl RedisCounterStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = RedisClient::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;

        Ok(Self {
            conn,
            compare_and_set: Arc::new(Script::new(COMPARE_AND_SET)),
        })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl_secs.max(1)).await?;
        Ok(())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
        ttl_secs: u64,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let (flag, expected): (&str, &[u8]) = match expected {
            Some(bytes) => ("1", bytes),
            None => ("0", b""),
        };

        let swapped: i32 = self
            .compare_and_set
            .key(key)
            .arg(flag)
            .arg(expected)
            .arg(value)
            .arg(ttl_secs.max(1))
            .invoke_async(&mut conn)
            .await?;

        Ok(swapped == 1)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;

        // 用 SCAN 分批遍历，避免 KEYS 阻塞整个实例
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let removed: u64 = conn.del(&keys).await?;
                deleted += removed;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(deleted)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
