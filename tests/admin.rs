mod common;

use std::sync::atomic::Ordering;

use api_gateway::config::Config;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use common::{TestGateway, body_json, header, spawn_backend};
use serde_json::Value;

fn admin_request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn api_key_lifecycle() {
    let (addr, backend) = spawn_backend().await;
    let gateway = TestGateway::new(addr);

    let response = gateway
        .send(admin_request(
            Method::POST,
            "/admin/keys",
            Some(serde_json::json!({ "name": "mobile app", "rate_limit_per_minute": 5 })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["name"], "mobile app");
    assert_eq!(created["rate_limit_per_minute"], 5);
    assert_eq!(created["rate_limit_per_hour"], 5000);
    assert_eq!(created["is_active"], true);

    let key = created["key"].as_str().unwrap().to_string();
    let id = created["id"].as_str().unwrap().to_string();

    let response = gateway.get("/posts/1", Some(&key)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-ratelimit-limit-minute"), Some("5"));

    let response = gateway
        .send(admin_request(Method::GET, "/admin/keys", None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], id.as_str());

    let response = gateway
        .send(admin_request(
            Method::PUT,
            &format!("/admin/keys/toggle?id={}", id),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["is_active"], false);

    let response = gateway.get("/posts/1", Some(&key)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let delete_uri = format!("/admin/keys/delete?id={}", id);
    let response = gateway
        .send(admin_request(Method::DELETE, &delete_uri, None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["message"],
        "API key deleted successfully"
    );

    let response = gateway
        .send(admin_request(Method::DELETE, &delete_uri, None))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn admin_input_is_validated() {
    let (addr, _backend) = spawn_backend().await;
    let gateway = TestGateway::new(addr);

    let cases = [
        admin_request(Method::POST, "/admin/keys", Some(serde_json::json!({ "name": "  " }))),
        admin_request(Method::POST, "/admin/keys", Some(serde_json::json!({ "limit": 1 }))),
        admin_request(Method::DELETE, "/admin/keys/delete", None),
        admin_request(Method::PUT, "/admin/keys/toggle?id=not-a-uuid", None),
    ];

    for req in cases {
        let response = gateway.send(req).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }
}

#[tokio::test]
async fn admin_token_gates_management_routes() {
    let (addr, _backend) = spawn_backend().await;
    let gateway = TestGateway::with_config(Config {
        backend_url: format!("http://{}", addr),
        admin_token: Some("s3cret".into()),
        ..Config::default()
    });

    let response = gateway
        .send(admin_request(Method::GET, "/admin/keys", None))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = gateway
        .send(
            Request::builder()
                .uri("/admin/keys")
                .header("X-Admin-Token", "s3cret")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // 指标和健康检查不受管理令牌限制
    let response = gateway.send(admin_request(Method::GET, "/metrics", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn clearing_cache_forces_a_miss() {
    let (addr, backend) = spawn_backend().await;
    let gateway = TestGateway::new(addr);
    gateway.keys.insert("k1", "reader", 10, 100);

    gateway.get("/posts/1", Some("k1")).await;
    gateway.wait_for_cache("GET", "/posts/1", "").await;

    let response = gateway
        .send(admin_request(Method::DELETE, "/admin/cache", None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["deleted"], 1);

    let response = gateway.get("/posts/1", Some("k1")).await;
    assert_eq!(header(&response, "x-cache"), Some("MISS"));
    assert_eq!(backend.hits(), 2);
}

#[tokio::test]
async fn metrics_report_and_reset() {
    let (addr, _backend) = spawn_backend().await;
    let gateway = TestGateway::new(addr);
    gateway.keys.insert("k1", "reader", 1, 100);

    gateway.get("/posts/1", Some("k1")).await;
    gateway.get("/posts/1", Some("k1")).await;
    gateway.get("/posts/1", None).await;

    let response = gateway.send(admin_request(Method::GET, "/metrics", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let metrics = body_json(response).await;
    assert_eq!(metrics["total_requests"], 3);
    assert_eq!(metrics["admission_denials"], 1);
    assert!(metrics["timestamp"].is_string());
    assert!(metrics["uptime_seconds"].is_number());
    let error_rate = metrics["error_rate"].as_f64().unwrap();
    assert!((error_rate - 2.0 / 3.0).abs() < 1e-9);

    let response = gateway
        .send(admin_request(Method::POST, "/metrics/reset", None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let metrics = body_json(gateway.send(admin_request(Method::GET, "/metrics", None)).await).await;
    assert_eq!(metrics["total_requests"], 0);
    assert_eq!(metrics["requests_per_second"], 0.0);
    assert_eq!(metrics["admission_denials"], 0);
}

#[tokio::test]
async fn health_reports_each_dependency() {
    let (addr, _backend) = spawn_backend().await;
    let gateway = TestGateway::new(addr);

    let response = gateway.send(admin_request(Method::GET, "/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let health = body_json(response).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["services"]["postgresql"], "healthy");
    assert_eq!(health["services"]["redis"], "healthy");

    gateway.keys.failing.store(true, Ordering::SeqCst);

    let response = gateway.send(admin_request(Method::GET, "/health", None)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let health = body_json(response).await;
    assert_eq!(health["status"], "degraded");
    assert!(
        health["services"]["postgresql"]
            .as_str()
            .unwrap()
            .starts_with("unhealthy")
    );
    assert_eq!(health["services"]["redis"], "healthy");
}
