//! PostgreSQL storage for templates and delivery logs.

mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
