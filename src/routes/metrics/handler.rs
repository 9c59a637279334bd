use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{SecondsFormat, Utc};
use serde_json::json;

use crate::AppState;

use super::model::{HealthResponse, MetricsResponse};

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub async fn get_metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        snapshot: state.metrics.snapshot(),
        timestamp: now_rfc3339(),
    })
}

pub async fn reset_metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.reset();
    tracing::info!("Metrics reset");
    Json(json!({ "message": "Metrics reset successfully" }))
}

/// 依赖探测带超时，依赖挂起时报告 degraded 而不是卡住
async fn probe<F, E>(name: &str, timeout: Duration, check: F) -> Result<(), String>
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    let result = match tokio::time::timeout(timeout, check).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {}s", timeout.as_secs())),
    };

    if let Err(reason) = &result {
        tracing::warn!("{} health check failed: {}", name, reason);
    }
    result
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let timeout = state.config.health_check_timeout();

    let (postgres, redis) = tokio::join!(
        probe("PostgreSQL", timeout, state.api_keys.ping()),
        probe("Redis", timeout, state.counter_store.ping()),
    );

    let mut services = BTreeMap::new();
    let mut healthy = true;
    for (name, result) in [("postgresql", postgres), ("redis", redis)] {
        let status = match result {
            Ok(()) => "healthy".to_string(),
            Err(reason) => {
                healthy = false;
                format!("unhealthy: {}", reason)
            }
        };
        services.insert(name, status);
    }

    let (code, status) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(HealthResponse {
            status,
            timestamp: now_rfc3339(),
            services,
        }),
    )
}
