use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use crate::error::ValidationErrors;

/// Raised when a stored or submitted string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("\"{value}\" is not a valid {kind}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares an enum stored as an upper-case string, both in SQLite and in JSON.
macro_rules! db_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($kind:literal) {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::models::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

pub mod asset;
pub mod category;
pub mod report;
pub mod transaction;
pub mod user;

pub use asset::*;
pub use category::*;
pub use report::*;
pub use transaction::*;
pub use user::*;

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
/// in partial updates.
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub(crate) fn check_max_len(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(
            field,
            format!("Ensure this field has no more than {max} characters."),
        );
    }
}

pub(crate) fn check_required_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: &str,
    max: usize,
) {
    if value.trim().is_empty() {
        errors.add(field, "This field may not be blank.");
    } else {
        check_max_len(errors, field, value, max);
    }
}

pub(crate) fn check_decimal_places(
    errors: &mut ValidationErrors,
    field: &str,
    value: Decimal,
    places: u32,
) -> bool {
    if value.normalize().scale() > places {
        errors.add(
            field,
            format!("Ensure that there are no more than {places} decimal places."),
        );
        return false;
    }
    true
}

/// Column precision: at most `max_digits` digits, `places` of them after the point.
pub(crate) fn check_max_digits(
    errors: &mut ValidationErrors,
    field: &str,
    value: Decimal,
    max_digits: u32,
    places: u32,
) {
    if !check_decimal_places(errors, field, value, places) {
        return;
    }
    let whole = max_digits - places;
    if whole_digits(value) > whole {
        errors.add(
            field,
            format!("Ensure that there are no more than {whole} digits before the decimal point."),
        );
    }
}

fn whole_digits(value: Decimal) -> u32 {
    let whole = value.abs().trunc().normalize();
    if whole.is_zero() {
        0
    } else {
        whole.to_string().len() as u32
    }
}

/// Unwraps a required field of a create payload, recording it as missing otherwise.
pub(crate) fn required<T>(errors: &mut ValidationErrors, field: &str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        errors.add(field, "This field is required.");
    }
    value
}
