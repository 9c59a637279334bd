/// 缓存操作
/// 提供计数存储的实现和响应缓存操作

// Redis 计数存储
pub mod redis_store;

// 进程内计数存储
pub mod memory_store;

// 响应缓存操作
pub mod response;

pub use memory_store::MemoryCounterStore;
pub use redis_store::RedisCounterStore;
pub use response::ResponseCache;
