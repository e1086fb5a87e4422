pub mod analytics;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod repo;
pub mod router;

// Re-export commonly used items
pub use db::DatabasePool;
pub use error::{ApiError, ApiResult};
pub use router::router;
