use axum::{
    extract::{Request, State},
    response::Response,
};

use crate::{
    AppState,
    middleware::RequestContext,
    utils::{client_ip, user_agent},
};

/// 网关入口，所有非管理路径都走完整请求链
pub async fn proxy(State(state): State<AppState>, req: Request) -> Response {
    let ctx = RequestContext::new(client_ip(&req), user_agent(&req));
    state.pipeline.run(req, ctx).await
}
