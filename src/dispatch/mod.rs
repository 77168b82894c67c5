//! The asynchronous dispatch pipeline.
//!
//! Producers call `DispatchService` to validate, render and fan out a
//! request into per-recipient jobs. A single `DispatchWorker` drains the
//! queue, calls the gateway and records every outcome in the delivery log.
//!
//! ```text
//! RenderRequest ─► validate ─► render ─► fan-out ─► DispatchQueue
//!                                                        │ claim
//!                                                        ▼
//!                         DeliveryLog ◄─ Sent/Failed ◄─ DispatchWorker ─► MessageGateway
//! ```

mod backoff;
mod service;
mod worker;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use service::{DispatchError, DispatchService, RenderRequest};
pub use worker::{DispatchWorker, WorkerHandle, WorkerSummary};
