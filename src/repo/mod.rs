//! SQL access, one module per table. Every function borrows a plain
//! `Connection` so it works the same on the shared handle and inside a
//! `rusqlite::Transaction`.

use rusqlite::types::Value;

pub mod assets;
pub mod categories;
pub mod reports;
pub mod transactions;
pub mod users;

/// Accumulates `WHERE` fragments with their positional bindings.
#[derive(Default)]
pub(crate) struct Conditions {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `clause` with a single `?` placeholder bound to `value`.
    pub fn push(&mut self, clause: &str, value: impl Into<Value>) {
        self.clauses.push(clause.to_string());
        self.values.push(value.into());
    }

    pub fn push_raw(&mut self, clause: &str) {
        self.clauses.push(clause.to_string());
    }

    /// Case-insensitive substring match of `term` against any of `columns`.
    pub fn push_search(&mut self, columns: &[&str], term: &str) {
        let term = term.trim();
        if term.is_empty() {
            return;
        }
        let any = columns
            .iter()
            .map(|column| format!("instr(lower({column}), lower(?)) > 0"))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.clauses.push(format!("({any})"));
        for _ in columns {
            self.values.push(Value::Text(term.to_string()));
        }
    }

    pub fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Translates a `?ordering=` value (comma separated, `-` prefix for
/// descending) into an `ORDER BY` clause. Unknown fields are skipped and
/// `default` is used when nothing usable remains.
pub(crate) fn order_by(requested: Option<&str>, allowed: &[(&str, &str)], default: &str) -> String {
    let terms: Vec<String> = requested
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter_map(|field| {
            let (name, direction) = match field.strip_prefix('-') {
                Some(name) => (name, "DESC"),
                None => (field, "ASC"),
            };
            allowed
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, expr)| format!("{expr} {direction}"))
        })
        .collect();

    if terms.is_empty() {
        format!(" ORDER BY {default}")
    } else {
        format!(" ORDER BY {}", terms.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[(&str, &str)] = &[("name", "a.name"), ("current_price", "CAST(a.current_price AS REAL)")];

    #[test]
    fn ordering_maps_known_fields() {
        assert_eq!(
            order_by(Some("-current_price,name"), FIELDS, "a.created_at DESC"),
            " ORDER BY CAST(a.current_price AS REAL) DESC, a.name ASC"
        );
    }

    #[test]
    fn unknown_ordering_falls_back() {
        assert_eq!(
            order_by(Some("password"), FIELDS, "a.created_at DESC"),
            " ORDER BY a.created_at DESC"
        );
        assert_eq!(order_by(None, FIELDS, "a.name ASC"), " ORDER BY a.name ASC");
    }

    #[test]
    fn conditions_join_with_and() {
        let mut conditions = Conditions::new();
        assert_eq!(conditions.sql(), "");
        conditions.push_raw("a.is_active = 1");
        conditions.push("a.currency = ?", "USD".to_string());
        conditions.push_search(&["a.name", "a.symbol"], " app ");
        assert_eq!(
            conditions.sql(),
            " WHERE a.is_active = 1 AND a.currency = ? AND \
             (instr(lower(a.name), lower(?)) > 0 OR instr(lower(a.symbol), lower(?)) > 0)"
        );
        assert_eq!(conditions.into_values().len(), 3);
    }

    #[test]
    fn blank_search_adds_nothing() {
        let mut conditions = Conditions::new();
        conditions.push_search(&["name"], "   ");
        assert_eq!(conditions.sql(), "");
    }
}
