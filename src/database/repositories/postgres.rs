use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::{ApiKey, ApiKeyStore, NewApiKey, RequestLog, RequestLogStore};

const API_KEY_COLUMNS: &str =
    "id, key, name, rate_limit_per_minute, rate_limit_per_hour, is_active, created_at";

/// Postgres 存储库
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyStore for PgStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<ApiKey>, sqlx::Error> {
        let query = format!("SELECT {} FROM api_keys WHERE key = $1", API_KEY_COLUMNS);
        sqlx::query_as::<_, ApiKey>(&query)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create(&self, new_key: NewApiKey) -> Result<ApiKey, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO api_keys (key, name, rate_limit_per_minute, rate_limit_per_hour, is_active)
            VALUES ($1, $2, $3, $4, true)
            RETURNING {}
            "#,
            API_KEY_COLUMNS
        );

        let result = sqlx::query_as::<_, ApiKey>(&query)
            .bind(&new_key.key)
            .bind(&new_key.name)
            .bind(new_key.rate_limit_per_minute)
            .bind(new_key.rate_limit_per_hour)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(key) => {
                tracing::info!("Created API key: {} ({})", key.name, key.id);
                Ok(key)
            }
            Err(e) => {
                tracing::error!("Failed to create API key: {:?}", e);
                Err(e)
            }
        }
    }

    async fn list(&self) -> Result<Vec<ApiKey>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM api_keys ORDER BY created_at DESC",
            API_KEY_COLUMNS
        );
        sqlx::query_as::<_, ApiKey>(&query)
            .fetch_all(&self.pool)
            .await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn toggle_active(&self, id: Uuid) -> Result<Option<ApiKey>, sqlx::Error> {
        let query = format!(
            "UPDATE api_keys SET is_active = NOT is_active WHERE id = $1 RETURNING {}",
            API_KEY_COLUMNS
        );
        sqlx::query_as::<_, ApiKey>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl RequestLogStore for PgStore {
    async fn insert(&self, entry: &RequestLog) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO request_logs
                (api_key_id, method, path, status_code, response_time_ms, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.api_key_id)
        .bind(&entry.method)
        .bind(&entry.path)
        .bind(entry.status_code)
        .bind(entry.response_time_ms)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
