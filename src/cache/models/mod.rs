/// 缓存数据模型
/// 定义存入计数存储的结构体

pub mod rate_limit;
pub mod response;

pub use rate_limit::BucketState;
pub use response::CachedResponse;
