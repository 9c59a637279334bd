use std::sync::Arc;

use axum::http::HeaderName;
use config::Config;

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod proxy;
pub mod routes;
pub mod utils;

use cache::{CounterStore, ResponseCache};
use database::{ApiKeyStore, RequestLogStore};
use error::GatewayResult;
use metrics::MetricsCollector;
use middleware::{AdmissionStage, CacheStage, IdentityStage, Pipeline, RateLimiter};
use proxy::{ForwardStage, Forwarder};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub counter_store: Arc<dyn CounterStore>,
    pub api_keys: Arc<dyn ApiKeyStore>,
    pub cache: ResponseCache,
    pub metrics: Arc<MetricsCollector>,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    /// 启动时组装请求链：身份识别 → 限流 → 缓存 → 转发
    pub fn new(
        config: Config,
        counter_store: Arc<dyn CounterStore>,
        api_keys: Arc<dyn ApiKeyStore>,
        request_log: Arc<dyn RequestLogStore>,
    ) -> GatewayResult<Self> {
        let metrics = Arc::new(MetricsCollector::new());
        let cache = ResponseCache::new(counter_store.clone(), config.cache_ttl());
        let forwarder = Forwarder::new(&config.backend_url, config.max_body_bytes)?;

        let header = HeaderName::from_bytes(config.api_key_header.as_bytes()).unwrap_or_else(|_| {
            tracing::warn!(
                "Invalid API_KEY_HEADER {:?}, falling back to X-API-Key",
                config.api_key_header
            );
            HeaderName::from_static("x-api-key")
        });

        let pipeline = Pipeline::new(metrics.clone(), request_log)
            .stage(IdentityStage::new(api_keys.clone(), header))
            .stage(AdmissionStage::new(
                RateLimiter::new(counter_store.clone()),
                metrics.clone(),
            ))
            .stage(CacheStage::new(cache.clone(), metrics.clone()))
            .stage(ForwardStage::new(forwarder));

        tracing::debug!(stages = ?pipeline.stage_names(), "Pipeline assembled");

        Ok(Self {
            config: Arc::new(config),
            counter_store,
            api_keys,
            cache,
            metrics,
            pipeline: Arc::new(pipeline),
        })
    }
}
