use serde::Serialize;
use uuid::Uuid;

/// 请求日志，未认证的请求没有 api_key_id
#[derive(Debug, Clone, Serialize)]
pub struct RequestLog {
    pub api_key_id: Option<Uuid>,
    pub method: String,
    pub path: String,
    pub status_code: i32,
    pub response_time_ms: i32,
    pub ip_address: String,
    pub user_agent: String,
}
