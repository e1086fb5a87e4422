use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::db::DatabasePool;
use crate::error::{ApiError, ApiResult};
use crate::models::User;
use crate::repo::users;

/// Header carrying the caller's user id, set by the fronting proxy.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The active user a request is made on behalf of.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn require_staff(&self) -> ApiResult<()> {
        if self.0.is_staff {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "You do not have permission to perform this action.".to_string(),
            ))
        }
    }

    /// Owner restriction for list queries: staff may pick any user (or none),
    /// everyone else is pinned to themselves.
    pub fn owner_scope(&self, requested: Option<Uuid>) -> Option<Uuid> {
        if self.0.is_staff {
            requested
        } else {
            Some(self.0.id)
        }
    }
}

#[async_trait]
impl FromRequestParts<DatabasePool> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, pool: &DatabasePool) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;
        let id = Uuid::parse_str(raw.trim()).map_err(|_| ApiError::Unauthorized)?;

        let conn = pool.0.lock().await;
        match users::get(&conn, id)? {
            Some(user) if user.is_active => Ok(CurrentUser(user)),
            _ => {
                tracing::debug!("Rejected unknown or inactive user id {}", id);
                Err(ApiError::Unauthorized)
            }
        }
    }
}
