pub mod admin;
pub mod gateway;
pub mod metrics;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::{AppState, middleware::require_admin_token};

/// 组装全部路由
///
/// 健康检查、指标和管理接口不进入请求链；其余路径全部交给网关处理。
pub fn create_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route(
            "/admin/keys",
            post(admin::create_api_key).get(admin::list_api_keys),
        )
        .route("/admin/keys/delete", delete(admin::delete_api_key))
        .route("/admin/keys/toggle", put(admin::toggle_api_key))
        .route("/admin/cache", delete(admin::clear_cache))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_admin_token,
        ));

    Router::new()
        .route("/health", get(metrics::health_check))
        .route("/metrics", get(metrics::get_metrics))
        .route("/metrics/reset", post(metrics::reset_metrics))
        .merge(admin_routes)
        .fallback(gateway::proxy)
        .with_state(state)
}
