use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// API key 数据库实体
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct ApiKey {
    pub id: Uuid,
    pub key: String,
    pub name: String,
    pub rate_limit_per_minute: i32,
    pub rate_limit_per_hour: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// 新建 API key 所需字段
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub key: String,
    pub name: String,
    pub rate_limit_per_minute: i32,
    pub rate_limit_per_hour: i32,
}
