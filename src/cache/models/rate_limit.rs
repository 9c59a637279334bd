use serde::{Deserialize, Serialize};

/// 令牌桶状态
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct BucketState {
    pub tokens: i64,
    pub last_refill_ms: i64, // Unix 毫秒时间戳
}
