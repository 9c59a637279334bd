//! 网关请求链
//!
//! 每个请求按固定顺序经过 身份识别 → 限流 → 缓存 → 转发 四个阶段，
//! 任何阶段都可以直接给出响应并跳过后续阶段。

mod admin;
mod auth;
mod cache;
mod capture;
mod pipeline;
mod rate_limit;

use async_trait::async_trait;
use axum::{extract::Request, response::Response};

use crate::cache::ResponseCache;
use crate::database::ApiKey;
use crate::error::GatewayResult;

pub use admin::require_admin_token;
pub use auth::IdentityStage;
pub use cache::CacheStage;
pub use capture::CaptureBody;
pub use pipeline::Pipeline;
pub use rate_limit::{Admission, AdmissionStage, HOUR, MINUTE, RateLimiter, Window};

/// 阶段执行结果
pub enum Flow {
    /// 交给下一个阶段
    Next,
    /// 直接响应，跳过后续阶段
    Respond(Response),
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, req: &mut Request, ctx: &mut RequestContext) -> GatewayResult<Flow>;
}

/// 限流结果，最终写入响应头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit_minute: i64,
    pub limit_hour: i64,
    pub remaining_minute: i64,
    pub remaining_hour: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// 缓存未命中时由缓存阶段留下，转发阶段据此捕获响应体
#[derive(Clone)]
pub struct CacheFill {
    pub cache: ResponseCache,
    pub key: String,
}

/// 单个请求的上下文，在各阶段之间按引用传递
#[derive(Default)]
pub struct RequestContext {
    pub identity: Option<ApiKey>,
    pub rate_limit: Option<RateLimitStatus>,
    pub cache_status: Option<CacheStatus>,
    pub cache_fill: Option<CacheFill>,
    pub client_ip: String,
    pub user_agent: String,
}

impl RequestContext {
    pub fn new(client_ip: String, user_agent: String) -> Self {
        Self {
            client_ip,
            user_agent,
            ..Default::default()
        }
    }
}
