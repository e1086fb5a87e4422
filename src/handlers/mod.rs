pub mod analytics;
pub mod assets;
pub mod categories;
pub mod reports;
pub mod transactions;
pub mod users;

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

/// Liveness check; needs no identity.
pub async fn health() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
