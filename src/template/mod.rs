//! Message templates.
//!
//! This module provides:
//! - Template definitions with `{{variable}}` placeholders
//! - The rendering engine: variable validation and substitution
//! - Template storage behind the `TemplateRepository` trait (memory, PostgreSQL)
//!
//! # Example
//!
//! ```ignore
//! let template = Template::new("otp-login", "Hello {{name}}, your code is {{code}}", vec![], None)?;
//! store.create(template).await?;
//!
//! let template = store.get_by_name("otp-login").await?;
//! let errors = validate(&template, &variables);
//! if errors.is_empty() {
//!     let text = render(&template, &variables);
//! }
//! ```

mod engine;
mod postgres_store;
mod store;
mod types;

pub use engine::{is_valid_variable_name, placeholders, render, render_str, validate, Variables};
pub use postgres_store::PostgresTemplateStore;
pub use store::{create_template_store, MemoryTemplateStore, TemplateRepository};
pub use types::{
    CreateTemplateRequest, Template, TemplateError, TemplateListResponse, TemplateResult,
};
