//! HTTP surface of the template catalog
//!
//! Exposes templates, networks and storage pools under `/api/v1` on top of
//! [`vm_catalog::Catalog`].

pub mod api_docs;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_app;
pub use state::AppState;
