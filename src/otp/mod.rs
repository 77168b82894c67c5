//! One-time passcodes for recipient verification.
//!
//! A code is issued per subject (phone identifier), lives for a fixed TTL
//! and validates at most once. Issuing again overwrites the previous code.
//! Every reason for rejection collapses to `false`.
//!
//! # Architecture
//!
//! - `OtpService`: code generation, metrics, input checks
//! - `OtpBackend`: atomic store-level operations (set-with-TTL, compare-and-consume)
//!   - `MemoryOtpBackend`: DashMap with tokio-clock expiry
//!   - `RedisOtpBackend`: hash with native `PEXPIRE`, Lua compare-and-consume

mod backend;
mod factory;
mod memory_backend;
mod redis_backend;
mod service;

pub use backend::{OtpBackend, OtpError, OtpRecord};
pub use factory::create_otp_backend;
pub use memory_backend::MemoryOtpBackend;
pub use redis_backend::RedisOtpBackend;
pub use service::OtpService;
