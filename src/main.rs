use asset_tracker_backend::config::{log_level_from_args, Config};
use asset_tracker_backend::repo::users;
use asset_tracker_backend::{router, DatabasePool};
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set the log level based on the first argument
    let args: Vec<String> = std::env::args().collect();
    let log_level = log_level_from_args(&args);

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .with_max_level(log_level)
        .init();

    tracing::info!("Log level set to: {}", log_level);

    let config = Config::from_env()?;

    // Initialize database pool
    let pool = DatabasePool::open(&config.database_path)?;
    tracing::info!("Using database at {}", config.database_path);

    if let Some(username) = &config.admin_username {
        let conn = pool.0.lock().await;
        if let Some(admin) = users::ensure_admin(&conn, username, chrono::Utc::now())? {
            tracing::info!("Created admin user {} with id {}", admin.username, admin.id);
        }
    }

    // Initialize CORS layer
    let cors = CorsLayer::new()
        .allow_credentials(true)
        .allow_origin(config.frontend_url.parse::<HeaderValue>()?)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(vec![
            ACCEPT,
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(asset_tracker_backend::auth::USER_ID_HEADER),
        ]);

    let app = router(pool).layer(cors);

    // Run server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    tracing::info!("Listening on: {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
