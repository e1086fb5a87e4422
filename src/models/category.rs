use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{check_max_len, check_required_text, double_option, required};
use crate::error::{ApiResult, ValidationErrors};

pub const DEFAULT_COLOR: &str = "#007bff";

/// A node in the asset category tree. Roots have no parent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub parent: Option<Uuid>,
    pub icon: String,
    pub color: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    /// Field checks that need no database access.
    pub fn validate(&self) -> ApiResult<()> {
        let mut errors = ValidationErrors::new();
        check_required_text(&mut errors, "name", &self.name, 100);
        check_max_len(&mut errors, "icon", &self.icon, 50);
        if !is_hex_color(&self.color) {
            errors.add("color", "Enter a hex color code such as #007bff.");
        }
        if self.parent == Some(self.id) {
            errors.add("parent", "Category cannot be its own parent");
        }
        errors.into_result()
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Builds "Root > Child > Leaf" from the chain of names, leaf last.
pub fn full_path<S: AsRef<str>>(names_root_first: &[S]) -> String {
    names_root_first
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" > ")
}

/// Category as returned by the API, with tree and usage details resolved.
#[derive(Serialize, Debug, Clone)]
pub struct CategoryView {
    #[serde(flatten)]
    pub category: Category,
    pub full_path: String,
    pub asset_count: i64,
    pub subcategories: Vec<String>,
}

/// Create and partial update payload.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct CategoryInput {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent: Option<Option<Uuid>>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub is_active: Option<bool>,
}

impl CategoryInput {
    pub fn into_new(self, now: DateTime<Utc>) -> ApiResult<Category> {
        let mut errors = ValidationErrors::new();
        let name = required(&mut errors, "name", self.name);
        errors.into_result()?;

        let category = Category {
            id: Uuid::new_v4(),
            name: name.unwrap_or_default().trim().to_string(),
            description: self.description.unwrap_or_default(),
            parent: self.parent.flatten(),
            icon: self.icon.unwrap_or_default(),
            color: self.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            is_active: self.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        category.validate()?;
        Ok(category)
    }

    pub fn apply(self, category: &mut Category, now: DateTime<Utc>) -> ApiResult<()> {
        if let Some(name) = self.name {
            category.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            category.description = description;
        }
        if let Some(parent) = self.parent {
            category.parent = parent;
        }
        if let Some(icon) = self.icon {
            category.icon = icon;
        }
        if let Some(color) = self.color {
            category.color = color;
        }
        if let Some(is_active) = self.is_active {
            category.is_active = is_active;
        }
        category.updated_at = now;
        category.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    fn input(name: &str) -> CategoryInput {
        CategoryInput {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_applied_on_create() {
        let category = input("Technology").into_new(Utc::now()).unwrap();
        assert_eq!(category.color, DEFAULT_COLOR);
        assert!(category.parent.is_none());
        assert!(category.is_active);
    }

    #[test]
    fn name_is_required() {
        match CategoryInput::default().into_new(Utc::now()) {
            Err(ApiError::Validation(errors)) => assert!(errors.has("name")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn cannot_be_own_parent() {
        let mut category = input("Bonds").into_new(Utc::now()).unwrap();
        let update = CategoryInput {
            parent: Some(Some(category.id)),
            ..Default::default()
        };
        match update.apply(&mut category, Utc::now()) {
            Err(ApiError::Validation(errors)) => assert!(errors.has("parent")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn color_must_be_hex() {
        let mut bad = input("Crypto");
        bad.color = Some("blue".into());
        assert!(bad.into_new(Utc::now()).is_err());

        let mut good = input("Crypto");
        good.color = Some("#A1b2C3".into());
        assert!(good.into_new(Utc::now()).is_ok());
    }

    #[test]
    fn explicit_null_clears_parent() {
        let mut category = input("Child").into_new(Utc::now()).unwrap();
        category.parent = Some(Uuid::new_v4());
        let update: CategoryInput = serde_json::from_str(r#"{"parent": null}"#).unwrap();
        update.apply(&mut category, Utc::now()).unwrap();
        assert!(category.parent.is_none());

        let untouched: CategoryInput = serde_json::from_str(r#"{"icon": "x"}"#).unwrap();
        assert!(untouched.parent.is_none());
    }

    #[test]
    fn path_joins_names() {
        assert_eq!(full_path(&["Equity", "Tech", "Chips"]), "Equity > Tech > Chips");
        assert_eq!(full_path(&["Solo"]), "Solo");
    }
}
