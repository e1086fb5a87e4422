use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;

use crate::auth::CurrentUser;
use crate::db::DatabasePool;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::models::{NewUser, User};
use crate::repo::users;

/// Lists active users ordered by username.
pub async fn list_users(
    State(pool): State<DatabasePool>,
    _caller: CurrentUser,
) -> Result<(StatusCode, Json<Vec<User>>), ApiError> {
    let conn = pool.0.lock().await;
    Ok((StatusCode::OK, Json(users::list_active(&conn)?)))
}

/// Creates a user. Staff only.
#[axum::debug_handler]
pub async fn create_user(
    State(pool): State<DatabasePool>,
    caller: CurrentUser,
    ApiJson(input): ApiJson<NewUser>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    caller.require_staff()?;
    input.validate()?;
    let user = input.into_user(Utc::now());

    let conn = pool.0.lock().await;
    users::insert(&conn, &user)?;
    tracing::info!("Created user {} ({})", user.username, user.id);
    Ok((StatusCode::CREATED, Json(user)))
}
