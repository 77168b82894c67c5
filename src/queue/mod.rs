//! Durable dispatch queue.
//!
//! A multi-producer, single-consumer FIFO of per-recipient send jobs.
//! Claiming a job removes it from the queue in the same atomic operation,
//! so a job is never visible to two consumers.
//!
//! # Architecture
//!
//! - `MemoryDispatchQueue`: in-process `VecDeque` (development and tests)
//! - `RedisDispatchQueue`: Redis list, `RPUSH` to enqueue, `BLPOP` to claim
//!
//! Use `create_dispatch_queue()` to build the backend selected by configuration.

pub mod backend;
mod factory;
mod job;
pub mod memory_backend;
pub mod redis_backend;

pub use backend::{DispatchQueue, QueueError};
pub use factory::create_dispatch_queue;
pub use job::DispatchJob;
pub use memory_backend::MemoryDispatchQueue;
pub use redis_backend::RedisDispatchQueue;
