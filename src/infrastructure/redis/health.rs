//! Redis connection health tracking

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU8, Ordering};

use serde::Serialize;

use super::current_time_ms;

/// Redis connection health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RedisHealthStatus {
    /// Last operation succeeded
    Healthy = 0,
    /// No connection yet, or the last one was dropped
    Reconnecting = 1,
}

impl RedisHealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedisHealthStatus::Healthy => "healthy",
            RedisHealthStatus::Reconnecting => "reconnecting",
        }
    }
}

/// Lock-free health tracker updated by `RedisPool`
pub struct RedisHealth {
    status: AtomicU8,
    last_connected_ms: AtomicI64,
    consecutive_failures: AtomicU32,
}

impl RedisHealth {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(RedisHealthStatus::Reconnecting as u8),
            last_connected_ms: AtomicI64::new(0),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn record_success(&self) {
        self.status
            .store(RedisHealthStatus::Healthy as u8, Ordering::Release);
        self.last_connected_ms
            .store(current_time_ms(), Ordering::Release);
        self.consecutive_failures.store(0, Ordering::Release);
    }

    pub fn record_failure(&self) {
        self.status
            .store(RedisHealthStatus::Reconnecting as u8, Ordering::Release);
        self.consecutive_failures.fetch_add(1, Ordering::AcqRel);
    }

    pub fn status(&self) -> RedisHealthStatus {
        match self.status.load(Ordering::Acquire) {
            0 => RedisHealthStatus::Healthy,
            _ => RedisHealthStatus::Reconnecting,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status() == RedisHealthStatus::Healthy
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    /// Milliseconds since epoch of the last successful operation, 0 if never
    pub fn last_connected_ms(&self) -> i64 {
        self.last_connected_ms.load(Ordering::Acquire)
    }
}

impl Default for RedisHealth {
    fn default() -> Self {
        Self::new()
    }
}
