mod handler;
mod model;

pub use handler::{get_metrics, health_check, reset_metrics};
pub use model::{HealthResponse, MetricsResponse};
