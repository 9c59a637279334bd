use sha2::{Digest, Sha256};

/// 响应缓存键前缀
pub const RESPONSE_CACHE_PREFIX: &str = "cache:";

/// 摘要截取的字节数
const DIGEST_PREFIX_BYTES: usize = 16;

/// 根据 (method, path, query) 生成响应缓存键
///
/// 字段之间用 NUL 分隔，请求行里不会出现 NUL，
/// 所以 `("/a:x", "")` 和 `("/a", "x:")` 不会拼成同一个输入。
pub fn response_cache_key(method: &str, path: &str, query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update([0u8]);
    hasher.update(path.as_bytes());
    hasher.update([0u8]);
    hasher.update(query.as_bytes());
    let digest = hasher.finalize();

    let hex: String = digest[..DIGEST_PREFIX_BYTES]
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect();
    format!("{}{}", RESPONSE_CACHE_PREFIX, hex)
}
