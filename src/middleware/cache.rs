use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, Method, StatusCode, header},
    response::Response,
};

use crate::{
    cache::{CachedResponse, ResponseCache},
    error::GatewayResult,
    metrics::MetricsCollector,
    middleware::{CacheFill, CacheStatus, Flow, RequestContext, Stage},
};

/// 缓存阶段：只有 GET 请求查缓存
pub struct CacheStage {
    cache: ResponseCache,
    metrics: Arc<MetricsCollector>,
}

impl CacheStage {
    pub fn new(cache: ResponseCache, metrics: Arc<MetricsCollector>) -> Self {
        Self { cache, metrics }
    }
}

#[async_trait]
impl Stage for CacheStage {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn handle(&self, req: &mut Request, ctx: &mut RequestContext) -> GatewayResult<Flow> {
        if req.method() != Method::GET {
            return Ok(Flow::Next);
        }

        let path = req.uri().path();
        let key = ResponseCache::key(
            req.method().as_str(),
            path,
            req.uri().query().unwrap_or(""),
        );

        match self.cache.get(&key).await {
            Ok(Some(entry)) => {
                tracing::debug!(path, "Cache HIT");
                self.metrics.record_cache_hit();
                ctx.cache_status = Some(CacheStatus::Hit);
                return Ok(Flow::Respond(replay(entry)));
            }
            Ok(None) => tracing::debug!(path, "Cache MISS"),
            // 查询失败按未命中处理
            Err(e) => tracing::warn!(path, "Cache get error: {}", e),
        }

        self.metrics.record_cache_miss();
        ctx.cache_status = Some(CacheStatus::Miss);
        ctx.cache_fill = Some(CacheFill {
            cache: self.cache.clone(),
            key,
        });

        Ok(Flow::Next)
    }
}

/// 把缓存项还原成响应
fn replay(entry: CachedResponse) -> Response {
    let content_type = entry
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));

    let mut response = Response::new(Body::from(entry.body));
    *response.status_mut() = StatusCode::from_u16(entry.status_code).unwrap_or(StatusCode::OK);
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, content_type);
    response
}
