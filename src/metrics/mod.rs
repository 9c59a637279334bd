//! 进程内请求指标

use parking_lot::Mutex;
use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    total_requests: u64,
    success_requests: u64,
    error_requests: u64,
    cache_hits: u64,
    cache_misses: u64,
    admission_denials: u64,
    total_latency_ms: u64,
}

struct State {
    counters: Counters,
    started_at: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub requests_per_second: f64,
    pub avg_latency_ms: f64,
    pub error_rate: f64,
    pub cache_hit_rate: f64,
    pub admission_denials: u64,
}

/// 指标收集器
///
/// 整个进程只有一个实例，通过 `Arc` 注入到各阶段。
/// 锁内只做计数，不做任何 I/O。
pub struct MetricsCollector {
    state: Mutex<State>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                counters: Counters::default(),
                started_at: Instant::now(),
            }),
        }
    }

    /// [200, 400) 记为成功，>= 400 记为错误
    pub fn record_request(&self, latency_ms: u64, status_code: u16) {
        let mut state = self.state.lock();
        let c = &mut state.counters;
        c.total_requests += 1;
        c.total_latency_ms = c.total_latency_ms.saturating_add(latency_ms);

        if (200..400).contains(&status_code) {
            c.success_requests += 1;
        } else if status_code >= 400 {
            c.error_requests += 1;
        }
    }

    pub fn record_cache_hit(&self) {
        self.state.lock().counters.cache_hits += 1;
    }

    pub fn record_cache_miss(&self) {
        self.state.lock().counters.cache_misses += 1;
    }

    pub fn record_admission_denial(&self) {
        self.state.lock().counters.admission_denials += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let (c, started_at) = {
            let state = self.state.lock();
            (state.counters, state.started_at)
        };

        let uptime = started_at.elapsed();
        let uptime_secs = uptime.as_secs_f64();
        let cache_lookups = c.cache_hits + c.cache_misses;

        MetricsSnapshot {
            uptime_seconds: uptime.as_secs(),
            total_requests: c.total_requests,
            requests_per_second: ratio(c.total_requests as f64, uptime_secs),
            avg_latency_ms: ratio(c.total_latency_ms as f64, c.total_requests as f64),
            error_rate: ratio(c.error_requests as f64, c.total_requests as f64),
            cache_hit_rate: ratio(c.cache_hits as f64, cache_lookups as f64),
            admission_denials: c.admission_denials,
        }
    }

    /// 清零所有计数并重新开始计时
    pub fn reset(&self) {
        *self.state.lock() = State {
            counters: Counters::default(),
            started_at: Instant::now(),
        };
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}
