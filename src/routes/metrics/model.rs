use std::collections::BTreeMap;

use serde::Serialize;

use crate::metrics::MetricsSnapshot;

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub snapshot: MetricsSnapshot,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub services: BTreeMap<&'static str, String>,
}
