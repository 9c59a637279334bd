/// 缓存键模块
/// 提供各种缓存键生成函数

// 响应缓存键
pub mod response_keys;

// 限流桶键
pub mod rate_limit_keys;

pub use rate_limit_keys::{RATE_LIMIT_PREFIX, bucket_key};
pub use response_keys::{RESPONSE_CACHE_PREFIX, response_cache_key};
