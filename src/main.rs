use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use api_gateway::{
    AppState,
    cache::{CounterStore, MemoryCounterStore, RedisCounterStore},
    config::Config,
    database::PgStore,
    routes,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    let filter = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var("LOG_LEVEL"))
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(
        "Starting on port {} → {}",
        config.server_port,
        config.backend_url
    );

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'api_gateway';").await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");
    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // 设置计数存储
    let counter_store: Arc<dyn CounterStore> = if config.uses_memory_store() {
        tracing::warn!("Using in-process counter store; limits are not shared between instances");
        Arc::new(MemoryCounterStore::new())
    } else {
        let store = RedisCounterStore::connect(&config.redis_url)
            .await
            .expect("Failed to connect to Redis");
        store.ping().await.expect("Redis did not answer PING");
        tracing::info!("Connected to Redis");
        Arc::new(store)
    };

    let pg_store = Arc::new(PgStore::new(pool));
    let state = AppState::new(config, counter_store, pg_store.clone(), pg_store)
        .expect("Failed to build gateway pipeline");

    let router = routes::create_router(state.clone());

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Ready, listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
