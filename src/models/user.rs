use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{check_max_len, check_required_text};
use crate::error::{ApiResult, ValidationErrors};

/// An account that owns transactions and reports.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Public view of a user, embedded in transaction and report responses.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        UserSummary {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_staff: bool,
}

impl NewUser {
    pub fn validate(&self) -> ApiResult<()> {
        let mut errors = ValidationErrors::new();
        check_required_text(&mut errors, "username", &self.username, 150);
        if self.username.chars().any(char::is_whitespace) {
            errors.add("username", "Username may not contain whitespace.");
        }
        if !self.email.is_empty() && !self.email.contains('@') {
            errors.add("email", "Enter a valid email address.");
        }
        check_max_len(&mut errors, "first_name", &self.first_name, 150);
        check_max_len(&mut errors, "last_name", &self.last_name, 150);
        errors.into_result()
    }

    pub fn into_user(self, now: DateTime<Utc>) -> User {
        User {
            id: Uuid::new_v4(),
            username: self.username.trim().to_string(),
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            is_staff: self.is_staff,
            is_active: true,
            date_joined: now,
        }
    }
}
