use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::Request;

use crate::{
    cache::{BucketState, CounterStore, StoreError, keys::bucket_key},
    error::{GatewayError, GatewayResult},
    metrics::MetricsCollector,
    middleware::{Flow, RateLimitStatus, RequestContext, Stage},
};

/// 单个令牌桶窗口
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub name: &'static str,
    pub period_secs: i64,
}

impl Window {
    fn period_ms(&self) -> i64 {
        self.period_secs * 1000
    }

    /// 空闲身份的桶状态在两个周期后自动过期
    fn ttl_secs(&self) -> u64 {
        (self.period_secs * 2) as u64
    }
}

pub const MINUTE: Window = Window {
    name: "minute",
    period_secs: 60,
};

pub const HOUR: Window = Window {
    name: "hour",
    period_secs: 3600,
};

/// compare-and-set 冲突时的最大重试次数
const MAX_CAS_ATTEMPTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    pub remaining_minute: i64,
    pub remaining_hour: i64,
}

#[derive(Debug, Clone, Copy)]
struct Take {
    granted: bool,
    remaining: i64,
}

/// 双窗口令牌桶限流器
///
/// 桶状态全部保存在计数存储里，进程内不持有任何锁。
/// 每次更新都是 读取 → 计算 → compare-and-set，冲突就重新读取，
/// 所以两个并发请求不会同时拿到最后一个令牌。
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    pub async fn allow(
        &self,
        identity_id: &str,
        limit_per_minute: i64,
        limit_per_hour: i64,
    ) -> Result<Admission, StoreError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.allow_at(identity_id, limit_per_minute, limit_per_hour, now_ms)
            .await
    }

    pub async fn allow_at(
        &self,
        identity_id: &str,
        limit_per_minute: i64,
        limit_per_hour: i64,
        now_ms: i64,
    ) -> Result<Admission, StoreError> {
        let minute_key = bucket_key(identity_id, MINUTE.name);
        let hour_key = bucket_key(identity_id, HOUR.name);

        let minute = self
            .take(&minute_key, limit_per_minute, MINUTE, now_ms)
            .await?;
        if !minute.granted {
            // 分钟窗口拒绝时只读取小时窗口剩余量，不消耗
            let remaining_hour = self.peek(&hour_key, limit_per_hour, HOUR, now_ms).await?;
            return Ok(Admission {
                allowed: false,
                remaining_minute: minute.remaining,
                remaining_hour,
            });
        }

        let hour = match self.take(&hour_key, limit_per_hour, HOUR, now_ms).await {
            Ok(hour) => hour,
            Err(e) => {
                if let Err(refund_err) = self.refund(&minute_key, limit_per_minute, MINUTE).await {
                    tracing::warn!(key = %minute_key, "Failed to refund minute token: {}", refund_err);
                }
                return Err(e);
            }
        };

        if !hour.granted {
            // 小时窗口拒绝，退还本次已经扣掉的分钟令牌
            let remaining_minute = self.refund(&minute_key, limit_per_minute, MINUTE).await?;
            return Ok(Admission {
                allowed: false,
                remaining_minute,
                remaining_hour: hour.remaining,
            });
        }

        Ok(Admission {
            allowed: true,
            remaining_minute: minute.remaining,
            remaining_hour: hour.remaining,
        })
    }

    async fn load(&self, key: &str) -> Result<(Option<Vec<u8>>, Option<BucketState>), StoreError> {
        let raw = self.store.get(key).await?;
        let state = match raw.as_deref() {
            Some(bytes) => match serde_json::from_slice::<BucketState>(bytes) {
                Ok(state) => Some(state),
                Err(e) => {
                    // 损坏的状态按新桶处理，compare-and-set 仍以原始字节为期望值
                    tracing::warn!(key, "Discarding unreadable bucket state: {}", e);
                    None
                }
            },
            None => None,
        };
        Ok((raw, state))
    }

    async fn take(
        &self,
        key: &str,
        capacity: i64,
        window: Window,
        now_ms: i64,
    ) -> Result<Take, StoreError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let (raw, state) = self.load(key).await?;
            let refilled = replenish(state, capacity, window, now_ms);

            if refilled.tokens <= 0 {
                return Ok(Take {
                    granted: false,
                    remaining: 0,
                });
            }

            let next = BucketState {
                tokens: refilled.tokens - 1,
                last_refill_ms: refilled.last_refill_ms,
            };
            let encoded = serde_json::to_vec(&next)?;

            if self
                .store
                .compare_and_set(key, raw.as_deref(), &encoded, window.ttl_secs())
                .await?
            {
                return Ok(Take {
                    granted: true,
                    remaining: next.tokens,
                });
            }
        }

        Err(StoreError::Contention(key.to_string()))
    }

    async fn peek(
        &self,
        key: &str,
        capacity: i64,
        window: Window,
        now_ms: i64,
    ) -> Result<i64, StoreError> {
        let (_, state) = self.load(key).await?;
        Ok(replenish(state, capacity, window, now_ms).tokens.max(0))
    }

    /// 退还一个令牌，返回退还后的剩余量
    async fn refund(&self, key: &str, capacity: i64, window: Window) -> Result<i64, StoreError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let (raw, state) = self.load(key).await?;
            let (Some(raw), Some(state)) = (raw, state) else {
                // 桶已过期，下次请求会按满容量重建
                return Ok(capacity.max(0));
            };

            let next = BucketState {
                tokens: (state.tokens + 1).min(capacity),
                last_refill_ms: state.last_refill_ms,
            };
            let encoded = serde_json::to_vec(&next)?;

            if self
                .store
                .compare_and_set(key, Some(&raw), &encoded, window.ttl_secs())
                .await?
            {
                return Ok(next.tokens.max(0));
            }
        }

        Err(StoreError::Contention(key.to_string()))
    }
}

/// 按流逝时间补充令牌
///
/// 补充量为 `floor(elapsed * capacity / period)`，上限为容量。
/// 未满时补充时间戳只前进"已兑现"的那部分时间，不丢失小数部分。
fn replenish(state: Option<BucketState>, capacity: i64, window: Window, now_ms: i64) -> BucketState {
    if capacity <= 0 {
        return BucketState {
            tokens: 0,
            last_refill_ms: now_ms,
        };
    }

    let Some(state) = state else {
        return BucketState {
            tokens: capacity,
            last_refill_ms: now_ms,
        };
    };

    let tokens = state.tokens.min(capacity);
    let elapsed_ms = (now_ms - state.last_refill_ms).max(0) as i128;
    let period_ms = window.period_ms() as i128;
    let added = (elapsed_ms * capacity as i128 / period_ms).min(capacity as i128) as i64;

    if added == 0 {
        return BucketState {
            tokens,
            last_refill_ms: state.last_refill_ms,
        };
    }

    let tokens = (tokens + added).min(capacity);
    let last_refill_ms = if tokens == capacity {
        now_ms
    } else {
        state.last_refill_ms + (added as i128 * period_ms / capacity as i128) as i64
    };

    BucketState {
        tokens,
        last_refill_ms,
    }
}

/// 限流阶段
pub struct AdmissionStage {
    limiter: RateLimiter,
    metrics: Arc<MetricsCollector>,
}

impl AdmissionStage {
    pub fn new(limiter: RateLimiter, metrics: Arc<MetricsCollector>) -> Self {
        Self { limiter, metrics }
    }
}

#[async_trait]
impl Stage for AdmissionStage {
    fn name(&self) -> &'static str {
        "admission"
    }

    async fn handle(&self, _req: &mut Request, ctx: &mut RequestContext) -> GatewayResult<Flow> {
        let Some(identity) = ctx.identity.as_ref() else {
            return Err(GatewayError::Internal(
                "admission stage reached without a resolved identity".into(),
            ));
        };

        let limit_minute = i64::from(identity.rate_limit_per_minute);
        let limit_hour = i64::from(identity.rate_limit_per_hour);

        let admission = self
            .limiter
            .allow(&identity.id.to_string(), limit_minute, limit_hour)
            .await
            .map_err(|e| {
                tracing::error!("Rate limiter error: {}", e);
                GatewayError::from(e)
            })?;

        ctx.rate_limit = Some(RateLimitStatus {
            limit_minute,
            limit_hour,
            remaining_minute: admission.remaining_minute,
            remaining_hour: admission.remaining_hour,
        });

        if !admission.allowed {
            tracing::info!(key = %identity.name, "Rate limited");
            self.metrics.record_admission_denial();
            return Err(GatewayError::AdmissionDenied);
        }

        Ok(Flow::Next)
    }
}
