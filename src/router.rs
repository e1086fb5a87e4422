use std::any::Any;

use axum::{
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{self, TraceLayer};
use tracing::Level;

use crate::db::DatabasePool;
use crate::error::ApiError;
use crate::handlers::{analytics, assets, categories, health, reports, transactions, users};

/// Every API route, bound to the shared database handle.
pub fn router(pool: DatabasePool) -> Router {
    Router::new()
        .route("/health", get(health))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        // Categories
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::update_category)
                .patch(categories::update_category)
                .delete(categories::delete_category),
        )
        // Assets
        .route("/assets", get(assets::list_assets).post(assets::create_asset))
        .route(
            "/assets/:id",
            get(assets::get_asset)
                .put(assets::update_asset)
                .patch(assets::update_asset)
                .delete(assets::delete_asset),
        )
        .route("/assets/:id/update_price", post(assets::update_price))
        .route("/assets/:id/statistics", get(assets::asset_statistics))
        // Transactions
        .route(
            "/transactions",
            get(transactions::list_transactions).post(transactions::create_transaction),
        )
        .route("/transactions/summary", get(transactions::transaction_summary))
        .route(
            "/transactions/:id",
            get(transactions::get_transaction)
                .put(transactions::update_transaction)
                .patch(transactions::update_transaction)
                .delete(transactions::delete_transaction),
        )
        // Reports
        .route("/reports", get(reports::list_reports).post(reports::create_report))
        .route(
            "/reports/:id",
            get(reports::get_report)
                .put(reports::update_report)
                .patch(reports::update_report)
                .delete(reports::delete_report),
        )
        .route("/reports/:id/complete", post(reports::complete_report))
        .route("/reports/:id/fail", post(reports::fail_report))
        // Analytics
        .route("/analytics/graphs", get(analytics::graphs))
        .route("/analytics/available_graphs", get(analytics::available_graphs))
        .route("/analytics/market_overview", get(analytics::market_overview))
        // Database app state
        .with_state(pool)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Turns a handler panic into the generic 500 body instead of a dropped connection.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let reason = if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else {
        "unknown panic"
    };
    ApiError::Internal(format!("handler panicked: {reason}")).into_response()
}
