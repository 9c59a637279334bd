#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use api_gateway::{
    AppState,
    cache::{CachedResponse, CounterStore, MemoryCounterStore, StoreError},
    config::Config,
    database::{ApiKey, ApiKeyStore, NewApiKey, RequestLog, RequestLogStore},
    routes,
};
use async_trait::async_trait;
use axum::{
    Json, Router,
    body::{Body, to_bytes},
    extract::State,
    http::{Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryApiKeyStore {
    keys: Mutex<Vec<ApiKey>>,
    pub failing: AtomicBool,
}

impl MemoryApiKeyStore {
    pub fn insert(&self, key: &str, name: &str, per_minute: i32, per_hour: i32) -> ApiKey {
        let record = ApiKey {
            id: Uuid::new_v4(),
            key: key.to_string(),
            name: name.to_string(),
            rate_limit_per_minute: per_minute,
            rate_limit_per_hour: per_hour,
            is_active: true,
            created_at: Utc::now(),
        };
        self.keys.lock().push(record.clone());
        record
    }

    pub fn deactivate(&self, id: Uuid) {
        if let Some(key) = self.keys.lock().iter_mut().find(|k| k.id == id) {
            key.is_active = false;
        }
    }

    fn check(&self) -> Result<(), sqlx::Error> {
        if self.failing.load(Ordering::SeqCst) {
            Err(sqlx::Error::PoolTimedOut)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ApiKeyStore for MemoryApiKeyStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<ApiKey>, sqlx::Error> {
        self.check()?;
        Ok(self.keys.lock().iter().find(|k| k.key == key).cloned())
    }

    async fn create(&self, new_key: NewApiKey) -> Result<ApiKey, sqlx::Error> {
        self.check()?;
        let record = ApiKey {
            id: Uuid::new_v4(),
            key: new_key.key,
            name: new_key.name,
            rate_limit_per_minute: new_key.rate_limit_per_minute,
            rate_limit_per_hour: new_key.rate_limit_per_hour,
            is_active: true,
            created_at: Utc::now(),
        };
        self.keys.lock().push(record.clone());
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<ApiKey>, sqlx::Error> {
        self.check()?;
        let mut keys = self.keys.lock().clone();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        self.check()?;
        let mut keys = self.keys.lock();
        let before = keys.len();
        keys.retain(|k| k.id != id);
        Ok(keys.len() != before)
    }

    async fn toggle_active(&self, id: Uuid) -> Result<Option<ApiKey>, sqlx::Error> {
        self.check()?;
        let mut keys = self.keys.lock();
        Ok(keys.iter_mut().find(|k| k.id == id).map(|k| {
            k.is_active = !k.is_active;
            k.clone()
        }))
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        self.check()
    }
}

#[derive(Default)]
pub struct RecordingLogStore {
    pub entries: Mutex<Vec<RequestLog>>,
}

#[async_trait]
impl RequestLogStore for RecordingLogStore {
    async fn insert(&self, entry: &RequestLog) -> Result<(), sqlx::Error> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

/// 可按键前缀注入故障的计数存储
#[derive(Default)]
pub struct FlakyCounterStore {
    inner: MemoryCounterStore,
    broken_prefix: Mutex<Option<&'static str>>,
}

impl FlakyCounterStore {
    /// 之后所有以 `prefix` 开头的键操作都返回错误，空串表示整个存储不可用
    pub fn break_prefix(&self, prefix: &'static str) {
        *self.broken_prefix.lock() = Some(prefix);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    fn check(&self, key: &str) -> Result<(), StoreError> {
        match *self.broken_prefix.lock() {
            Some(prefix) if key.starts_with(prefix) => Err(StoreError::Redis(
                redis::RedisError::from((redis::ErrorKind::IoError, "connection refused")),
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl CounterStore for FlakyCounterStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check(key)?;
        self.inner.get(key).await
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<(), StoreError> {
        self.check(key)?;
        self.inner.set_ex(key, value, ttl_secs).await
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
        ttl_secs: u64,
    ) -> Result<bool, StoreError> {
        self.check(key)?;
        self.inner.compare_and_set(key, expected, value, ttl_secs).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check(key)?;
        self.inner.delete(key).await
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        self.check(prefix)?;
        self.inner.delete_prefix(prefix).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check("")?;
        self.inner.ping().await
    }
}

/// 测试用后端，记录收到的请求数
#[derive(Clone, Default)]
pub struct Backend {
    pub hits: Arc<AtomicUsize>,
}

impl Backend {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn get_post(State(backend): State<Backend>) -> Response {
    backend.hits.fetch_add(1, Ordering::SeqCst);
    (
        [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
        r#"{"id":1,"title":"hello"}"#,
    )
        .into_response()
}

async fn create_post(State(backend): State<Backend>, body: String) -> Response {
    backend.hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::CREATED, body).into_response()
}

async fn missing(State(backend): State<Backend>) -> Response {
    backend.hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::NOT_FOUND, Json(serde_json::json!({ "detail": "nope" }))).into_response()
}

/// 固定返回 gzip 编码的响应体
async fn gzipped(State(backend): State<Backend>) -> Response {
    backend.hits.fetch_add(1, Ordering::SeqCst);
    (
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CONTENT_ENCODING, "gzip"),
        ],
        vec![0x1f_u8, 0x8b, 0x08, 0x00, 0x01, 0x02, 0x03],
    )
        .into_response()
}

async fn echo_headers(State(backend): State<Backend>, req: Request<Body>) -> Response {
    backend.hits.fetch_add(1, Ordering::SeqCst);
    let query = req.uri().query().unwrap_or_default().to_string();
    let api_key = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Json(serde_json::json!({ "query": query, "api_key": api_key })).into_response()
}

pub async fn spawn_backend() -> (SocketAddr, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/posts/{id}", get(get_post).post(create_post))
        .route("/missing", get(missing))
        .route("/echo", get(echo_headers))
        .route("/gzip", get(gzipped))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, backend)
}

/// 拿到一个没有服务监听的地址
pub async fn closed_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub struct TestGateway {
    pub router: Router,
    pub state: AppState,
    pub counters: Arc<FlakyCounterStore>,
    pub keys: Arc<MemoryApiKeyStore>,
    pub logs: Arc<RecordingLogStore>,
}

impl TestGateway {
    pub fn new(backend: SocketAddr) -> Self {
        Self::with_config(Config {
            backend_url: format!("http://{}", backend),
            ..Config::default()
        })
    }

    pub fn with_config(config: Config) -> Self {
        let counters = Arc::new(FlakyCounterStore::default());
        let keys = Arc::new(MemoryApiKeyStore::default());
        let logs = Arc::new(RecordingLogStore::default());
        let state = AppState::new(config, counters.clone(), keys.clone(), logs.clone()).unwrap();

        Self {
            router: routes::create_router(state.clone()),
            state,
            counters,
            keys,
            logs,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> Response {
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn get(&self, uri: &str, api_key: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(key) = api_key {
            builder = builder.header("X-API-Key", key);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// 缓存在后台任务里写入，轮询等待
    pub async fn wait_for_cache(&self, method: &str, path: &str, query: &str) -> CachedResponse {
        let key = api_gateway::cache::ResponseCache::key(method, path, query);
        for _ in 0..100 {
            if let Some(entry) = self.state.cache.get(&key).await.unwrap() {
                return entry;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("response for {} {} was never cached", method, path);
    }

    pub async fn wait_for_logs(&self, count: usize) -> Vec<RequestLog> {
        for _ in 0..100 {
            if self.logs.entries.lock().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.logs.entries.lock().clone()
    }
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}
