use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};

use crate::{
    database::{RequestLog, RequestLogStore},
    error::{GatewayError, GatewayResult},
    metrics::MetricsCollector,
    middleware::{Flow, RequestContext, Stage},
};

/// 请求链编排器
///
/// 启动时按顺序组装各阶段，之后每个请求都走同一条链。
/// 不论链在哪一步结束，都会记录一次指标、输出一行日志并异步落库请求日志。
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    metrics: Arc<MetricsCollector>,
    request_log: Arc<dyn RequestLogStore>,
}

impl Pipeline {
    pub fn new(metrics: Arc<MetricsCollector>, request_log: Arc<dyn RequestLogStore>) -> Self {
        Self {
            stages: Vec::new(),
            metrics,
            request_log,
        }
    }

    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, mut req: Request, mut ctx: RequestContext) -> Response {
        let start = Instant::now();
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let (mut response, error) = match self.execute(&mut req, &mut ctx).await {
            Ok(response) => (response, None),
            Err(e) => {
                let message = e.to_string();
                (e.into_response(), Some(message))
            }
        };

        apply_headers(response.headers_mut(), &ctx);

        let latency_ms = start.elapsed().as_millis() as u64;
        let status = response.status().as_u16();
        self.metrics.record_request(latency_ms, status);

        let key_name = ctx.identity.as_ref().map(|k| k.name.as_str());
        log_request(&method, &path, status, latency_ms, key_name, error.as_deref());

        self.persist(RequestLog {
            api_key_id: ctx.identity.as_ref().map(|k| k.id),
            method,
            path,
            status_code: i32::from(status),
            response_time_ms: latency_ms.min(i32::MAX as u64) as i32,
            ip_address: ctx.client_ip,
            user_agent: ctx.user_agent,
        });

        response
    }

    async fn execute(&self, req: &mut Request, ctx: &mut RequestContext) -> GatewayResult<Response> {
        for stage in &self.stages {
            if let Flow::Respond(response) = stage.handle(req, ctx).await? {
                return Ok(response);
            }
        }

        Err(GatewayError::Internal(
            "request passed every stage without a response".into(),
        ))
    }

    /// 请求日志写入失败只记录，不影响响应
    fn persist(&self, entry: RequestLog) {
        let store = self.request_log.clone();
        tokio::spawn(async move {
            if let Err(e) = store.insert(&entry).await {
                tracing::warn!("Failed to log request to database: {}", e);
            }
        });
    }
}

fn apply_headers(headers: &mut HeaderMap, ctx: &RequestContext) {
    if let Some(limits) = ctx.rate_limit {
        let pairs = [
            ("x-ratelimit-limit-minute", limits.limit_minute),
            ("x-ratelimit-limit-hour", limits.limit_hour),
            ("x-ratelimit-remaining-minute", limits.remaining_minute),
            ("x-ratelimit-remaining-hour", limits.remaining_hour),
        ];
        for (name, value) in pairs {
            headers.insert(name, HeaderValue::from(value));
        }
    }

    if let Some(status) = ctx.cache_status {
        headers.insert("x-cache", HeaderValue::from_static(status.as_str()));
    }
}

fn log_request(
    method: &str,
    path: &str,
    status: u16,
    latency_ms: u64,
    key: Option<&str>,
    error: Option<&str>,
) {
    if status >= 500 {
        tracing::error!(method, path, status, latency_ms, key, error, "✗ request");
    } else if status >= 400 {
        tracing::warn!(method, path, status, latency_ms, key, error, "✗ request");
    } else {
        tracing::info!(method, path, status, latency_ms, key, error, "→ request");
    }
}
