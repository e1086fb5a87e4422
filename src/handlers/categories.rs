use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::db::DatabasePool;
use crate::error::ApiError;
use crate::extract::{flag, lenient, ApiJson, ApiPath, ApiQuery};
use crate::models::{CategoryInput, CategoryView};
use crate::repo::categories::{self, CategoryFilter};

#[derive(Deserialize, Debug, Default)]
pub struct CategoryQuery {
    pub parent: Option<String>,
    pub is_active: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

impl CategoryQuery {
    fn into_filter(self) -> CategoryFilter {
        CategoryFilter {
            parent: lenient(self.parent.as_deref()),
            is_active: flag(self.is_active.as_deref()),
            search: self.search,
            ordering: self.ordering,
        }
    }
}

pub async fn list_categories(
    State(pool): State<DatabasePool>,
    _caller: CurrentUser,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> Result<(StatusCode, Json<Vec<CategoryView>>), ApiError> {
    let conn = pool.0.lock().await;
    let views = categories::list(&conn, &query.into_filter())?
        .into_iter()
        .map(|category| categories::view(&conn, category))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((StatusCode::OK, Json(views)))
}

#[axum::debug_handler]
pub async fn create_category(
    State(pool): State<DatabasePool>,
    _caller: CurrentUser,
    ApiJson(input): ApiJson<CategoryInput>,
) -> Result<(StatusCode, Json<CategoryView>), ApiError> {
    let category = input.into_new(Utc::now())?;

    let conn = pool.0.lock().await;
    categories::check_parent(&conn, &category)?;
    categories::insert(&conn, &category)?;
    tracing::info!("Created category {} ({})", category.name, category.id);
    Ok((StatusCode::CREATED, Json(categories::view(&conn, category)?)))
}

pub async fn get_category(
    State(pool): State<DatabasePool>,
    _caller: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<(StatusCode, Json<CategoryView>), ApiError> {
    let conn = pool.0.lock().await;
    let category = categories::find_active(&conn, id)?;
    Ok((StatusCode::OK, Json(categories::view(&conn, category)?)))
}

/// Partial update, used for both PUT and PATCH.
#[axum::debug_handler]
pub async fn update_category(
    State(pool): State<DatabasePool>,
    _caller: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<CategoryInput>,
) -> Result<(StatusCode, Json<CategoryView>), ApiError> {
    let conn = pool.0.lock().await;
    let mut category = categories::find_active(&conn, id)?;
    input.apply(&mut category, Utc::now())?;
    categories::check_parent(&conn, &category)?;
    categories::update(&conn, &category)?;
    Ok((StatusCode::OK, Json(categories::view(&conn, category)?)))
}

pub async fn delete_category(
    State(pool): State<DatabasePool>,
    _caller: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    let conn = pool.0.lock().await;
    categories::find_active(&conn, id)?;
    categories::delete(&conn, id)?;
    tracing::info!("Deleted category {}", id);
    Ok(StatusCode::NO_CONTENT)
}
