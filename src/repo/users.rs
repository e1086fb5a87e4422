use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{is_unique_violation, uuid_column};
use crate::error::{ApiError, ApiResult};
use crate::models::{NewUser, User};

const COLUMNS: &str = "id, username, email, first_name, last_name, is_staff, is_active, date_joined";

pub(crate) fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_column(row, "id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        is_staff: row.get("is_staff")?,
        is_active: row.get("is_active")?,
        date_joined: row.get("date_joined")?,
    })
}

pub fn insert(conn: &Connection, user: &User) -> ApiResult<()> {
    conn.execute(
        "INSERT INTO users (id, username, email, first_name, last_name, is_staff, is_active, date_joined)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user.id.to_string(),
            user.username,
            user.email,
            user.first_name,
            user.last_name,
            user.is_staff,
            user.is_active,
            user.date_joined,
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e, "users", "username") {
            ApiError::field("username", "A user with that username already exists.")
        } else {
            e.into()
        }
    })?;
    Ok(())
}

pub fn get(conn: &Connection, id: Uuid) -> ApiResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
            [id.to_string()],
            map_user,
        )
        .optional()?;
    Ok(user)
}

pub fn list_active(conn: &Connection) -> ApiResult<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM users WHERE is_active = 1 ORDER BY username"
    ))?;
    let users = stmt
        .query_map([], map_user)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn count(conn: &Connection) -> ApiResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
}

/// Creates a staff account named `username` when no user exists yet.
pub fn ensure_admin(conn: &Connection, username: &str, now: DateTime<Utc>) -> ApiResult<Option<User>> {
    if count(conn)? > 0 {
        return Ok(None);
    }
    let input = NewUser {
        username: username.to_string(),
        is_staff: true,
        ..Default::default()
    };
    input.validate()?;
    let admin = input.into_user(now);
    insert(conn, &admin)?;
    Ok(Some(admin))
}
