//! Redis OTP backend.
//!
//! Each subject maps to a hash `{prefix}:{subject}` with fields `code`,
//! `issued_at`, `consumed` and `attempts`. Issue replaces the hash and sets
//! `PEXPIRE` in one `MULTI/EXEC`, so Redis eviction is the expiry clock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::Script;

use super::backend::{OtpBackend, OtpError, OtpRecord};
use crate::redis::RedisPool;

/// KEYS[1] = record key, ARGV[1] = supplied code, ARGV[2] = max attempts.
/// Returns 1 when the code matched a live, unconsumed record.
const CONSUME_SCRIPT: &str = r#"
local code = redis.call('HGET', KEYS[1], 'code')
if not code then
    return 0
end
if redis.call('HGET', KEYS[1], 'consumed') == '1' then
    return 0
end
if code == ARGV[1] then
    redis.call('HSET', KEYS[1], 'consumed', '1')
    return 1
end
local attempts = redis.call('HINCRBY', KEYS[1], 'attempts', 1)
if attempts >= tonumber(ARGV[2]) then
    redis.call('DEL', KEYS[1])
end
return 0
"#;

pub struct RedisOtpBackend {
    pool: Arc<RedisPool>,
    prefix: String,
    consume_script: Script,
}

impl RedisOtpBackend {
    pub fn new(pool: Arc<RedisPool>, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
            consume_script: Script::new(CONSUME_SCRIPT),
        }
    }

    fn record_key(&self, subject: &str) -> String {
        format!("{}:{}", self.prefix, subject)
    }
}

#[async_trait]
impl OtpBackend for RedisOtpBackend {
    fn backend_type(&self) -> &'static str {
        "redis"
    }

    async fn store(&self, record: OtpRecord, ttl: Duration) -> Result<(), OtpError> {
        let key = self.record_key(&record.subject);
        let ttl_ms = ttl.as_millis().max(1) as u64;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("DEL")
            .arg(&key)
            .ignore()
            .cmd("HSET")
            .arg(&key)
            .arg("code")
            .arg(&record.code)
            .arg("issued_at")
            .arg(record.issued_at.timestamp_millis())
            .arg("consumed")
            .arg(0)
            .arg("attempts")
            .arg(0)
            .ignore()
            .cmd("PEXPIRE")
            .arg(&key)
            .arg(ttl_ms)
            .ignore();

        let _: () = self
            .pool
            .execute(|mut conn| async move { pipe.query_async(&mut conn).await })
            .await?;

        tracing::debug!(key = %key, ttl_ms, "OTP stored in Redis");
        Ok(())
    }

    async fn consume(
        &self,
        subject: &str,
        code: &str,
        max_attempts: u32,
    ) -> Result<bool, OtpError> {
        let key = self.record_key(subject);
        let script = &self.consume_script;

        let matched: i64 = self
            .pool
            .execute(|mut conn| async move {
                let mut invocation = script.key(&key);
                invocation.arg(code).arg(max_attempts);
                invocation.invoke_async(&mut conn).await
            })
            .await?;

        Ok(matched == 1)
    }
}
