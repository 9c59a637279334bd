/// 限流桶键前缀
pub const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// 生成某个身份在某个窗口上的令牌桶键
pub fn bucket_key(identity_id: &str, window: &str) -> String {
    format!("{}{}:{}", RATE_LIMIT_PREFIX, identity_id, window)
}
