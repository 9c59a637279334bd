use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "https://jsonplaceholder.typicode.com";

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub backend_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub cache_ttl_secs: u64,
    pub api_key_header: String,
    pub default_rate_limit_per_minute: i64,
    pub default_rate_limit_per_hour: i64,
    pub health_check_timeout_secs: u64,
    pub max_body_bytes: usize,
    pub db_max_connections: u32,
    pub admin_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let server_port = env::var("SERVER_PORT")
            .or_else(|_| env::var("PORT"))
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            backend_url: non_empty("BACKEND_URL").unwrap_or_else(|| DEFAULT_BACKEND_URL.into()),
            server_host: non_empty("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            server_port,
            // 缓存过期时间，单位秒
            cache_ttl_secs: parse_or("CACHE_TTL", 60),
            api_key_header: non_empty("API_KEY_HEADER").unwrap_or_else(|| "X-API-Key".into()),
            default_rate_limit_per_minute: parse_or("DEFAULT_RATE_LIMIT_PER_MINUTE", 100),
            default_rate_limit_per_hour: parse_or("DEFAULT_RATE_LIMIT_PER_HOUR", 5000),
            health_check_timeout_secs: parse_or("HEALTH_CHECK_TIMEOUT", 5),
            max_body_bytes: parse_or("MAX_BODY_BYTES", 10 * 1024 * 1024),
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 25),
            admin_token: non_empty("ADMIN_TOKEN"),
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout_secs)
    }

    /// 内存计数存储只在单节点下有意义
    pub fn uses_memory_store(&self) -> bool {
        self.redis_url.starts_with("memory://")
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: String::new(),
            redis_url: "memory://".into(),
            backend_url: DEFAULT_BACKEND_URL.into(),
            server_host: "0.0.0.0".into(),
            server_port: 8080,
            cache_ttl_secs: 60,
            api_key_header: "X-API-Key".into(),
            default_rate_limit_per_minute: 100,
            default_rate_limit_per_hour: 5000,
            health_check_timeout_secs: 5,
            max_body_bytes: 10 * 1024 * 1024,
            db_max_connections: 25,
            admin_token: None,
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
