use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{order_by, Conditions};
use crate::db::{is_unique_violation, opt_uuid_column, uuid_column};
use crate::error::{ApiError, ApiResult};
use crate::models::{full_path, Category, CategoryView};

const COLUMNS: &str = "id, name, description, parent_id, icon, color, is_active, created_at, updated_at";

const ORDERING: &[(&str, &str)] = &[("name", "name"), ("created_at", "created_at")];

/// Guards against corrupted data when walking up the tree.
const MAX_DEPTH: i64 = 64;

#[derive(Debug, Default, Clone)]
pub struct CategoryFilter {
    pub parent: Option<Uuid>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

fn map_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: uuid_column(row, "id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        parent: opt_uuid_column(row, "parent_id")?,
        icon: row.get("icon")?,
        color: row.get("color")?,
        is_active: row.get("is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn unique_name(e: rusqlite::Error) -> ApiError {
    if is_unique_violation(&e, "asset_categories", "name") {
        ApiError::field("name", "Asset category with this name already exists.")
    } else {
        e.into()
    }
}

pub fn insert(conn: &Connection, category: &Category) -> ApiResult<()> {
    conn.execute(
        "INSERT INTO asset_categories (id, name, description, parent_id, icon, color, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            category.id.to_string(),
            category.name,
            category.description,
            category.parent.map(|id| id.to_string()),
            category.icon,
            category.color,
            category.is_active,
            category.created_at,
            category.updated_at,
        ],
    )
    .map_err(unique_name)?;
    Ok(())
}

pub fn update(conn: &Connection, category: &Category) -> ApiResult<()> {
    let changed = conn
        .execute(
            "UPDATE asset_categories SET name = ?2, description = ?3, parent_id = ?4, icon = ?5,
                 color = ?6, is_active = ?7, updated_at = ?8
             WHERE id = ?1",
            params![
                category.id.to_string(),
                category.name,
                category.description,
                category.parent.map(|id| id.to_string()),
                category.icon,
                category.color,
                category.is_active,
                category.updated_at,
            ],
        )
        .map_err(unique_name)?;
    if changed == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(())
}

pub fn get(conn: &Connection, id: Uuid) -> ApiResult<Option<Category>> {
    let category = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM asset_categories WHERE id = ?1"),
            [id.to_string()],
            map_category,
        )
        .optional()?;
    Ok(category)
}

/// Active category by id, the only kind the API exposes.
pub fn find_active(conn: &Connection, id: Uuid) -> ApiResult<Category> {
    get(conn, id)?
        .filter(|category| category.is_active)
        .ok_or(ApiError::NotFound)
}

/// Removes the category; the store cascades to subcategories and detaches assets.
pub fn delete(conn: &Connection, id: Uuid) -> ApiResult<()> {
    let removed = conn.execute(
        "DELETE FROM asset_categories WHERE id = ?1",
        [id.to_string()],
    )?;
    if removed == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(())
}

pub fn list(conn: &Connection, filter: &CategoryFilter) -> ApiResult<Vec<Category>> {
    let mut conditions = Conditions::new();
    conditions.push("is_active = ?", filter.is_active.unwrap_or(true));
    if let Some(parent) = filter.parent {
        conditions.push("parent_id = ?", parent.to_string());
    }
    if let Some(term) = &filter.search {
        conditions.push_search(&["name", "description"], term);
    }

    let sql = format!(
        "SELECT {COLUMNS} FROM asset_categories{}{}",
        conditions.sql(),
        order_by(filter.ordering.as_deref(), ORDERING, "name ASC"),
    );
    let mut stmt = conn.prepare(&sql)?;
    let categories = stmt
        .query_map(params_from_iter(conditions.into_values()), map_category)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

/// Ids and names from the tree root down to `id` itself.
fn lineage(conn: &Connection, id: Uuid) -> ApiResult<Vec<(Uuid, String)>> {
    let mut stmt = conn.prepare(
        "WITH RECURSIVE chain(id, name, parent_id, depth) AS (
             SELECT id, name, parent_id, 0 FROM asset_categories WHERE id = ?1
             UNION ALL
             SELECT c.id, c.name, c.parent_id, chain.depth + 1
             FROM asset_categories c JOIN chain ON c.id = chain.parent_id
             WHERE chain.depth < ?2
         )
         SELECT id, name FROM chain ORDER BY depth DESC",
    )?;
    let chain = stmt
        .query_map(params![id.to_string(), MAX_DEPTH], |row| {
            Ok((uuid_column(row, "id")?, row.get("name")?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(chain)
}

/// Checks the parent reference of `category` against the stored tree: it must
/// exist and must not sit below `category` itself.
pub fn check_parent(conn: &Connection, category: &Category) -> ApiResult<()> {
    let Some(parent) = category.parent else {
        return Ok(());
    };
    if get(conn, parent)?.is_none() {
        return Err(ApiError::field(
            "parent",
            format!("Invalid pk \"{parent}\" - object does not exist."),
        ));
    }
    if lineage(conn, parent)?.iter().any(|(id, _)| *id == category.id) {
        return Err(ApiError::field(
            "parent",
            "Category cannot be moved under one of its own subcategories",
        ));
    }
    Ok(())
}

pub fn view(conn: &Connection, category: Category) -> ApiResult<CategoryView> {
    let names: Vec<String> = lineage(conn, category.id)?
        .into_iter()
        .map(|(_, name)| name)
        .collect();
    let asset_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM assets WHERE category_id = ?1 AND is_active = 1",
        [category.id.to_string()],
        |row| row.get(0),
    )?;
    let mut stmt = conn.prepare(
        "SELECT name FROM asset_categories WHERE parent_id = ?1 AND is_active = 1 ORDER BY name",
    )?;
    let subcategories = stmt
        .query_map([category.id.to_string()], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    Ok(CategoryView {
        full_path: if names.is_empty() {
            category.name.clone()
        } else {
            full_path(&names)
        },
        asset_count,
        subcategories,
        category,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::models::CategoryInput;
    use chrono::Utc;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn create(conn: &Connection, name: &str, parent: Option<Uuid>) -> Category {
        let category = CategoryInput {
            name: Some(name.into()),
            parent: Some(parent),
            ..Default::default()
        }
        .into_new(Utc::now())
        .unwrap();
        check_parent(conn, &category).unwrap();
        insert(conn, &category).unwrap();
        category
    }

    #[test]
    fn view_resolves_path_and_children() {
        let conn = conn();
        let equity = create(&conn, "Equity", None);
        let tech = create(&conn, "Technology", Some(equity.id));
        create(&conn, "Healthcare", Some(equity.id));

        let view = view(&conn, tech).unwrap();
        assert_eq!(view.full_path, "Equity > Technology");
        assert_eq!(view.asset_count, 0);

        let root = super::view(&conn, equity).unwrap();
        assert_eq!(root.full_path, "Equity");
        assert_eq!(root.subcategories, ["Healthcare", "Technology"]);
    }

    #[test]
    fn descendant_cannot_become_parent() {
        let conn = conn();
        let root = create(&conn, "Root", None);
        let child = create(&conn, "Child", Some(root.id));
        let grandchild = create(&conn, "Grandchild", Some(child.id));

        let mut moved = root.clone();
        moved.parent = Some(grandchild.id);
        match check_parent(&conn, &moved) {
            Err(ApiError::Validation(errors)) => assert!(errors.has("parent")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let conn = conn();
        let mut orphan = CategoryInput {
            name: Some("Orphan".into()),
            ..Default::default()
        }
        .into_new(Utc::now())
        .unwrap();
        orphan.parent = Some(Uuid::new_v4());
        assert!(matches!(
            check_parent(&conn, &orphan),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn delete_cascades_to_children() {
        let conn = conn();
        let root = create(&conn, "Root", None);
        let child = create(&conn, "Child", Some(root.id));
        delete(&conn, root.id).unwrap();
        assert!(get(&conn, child.id).unwrap().is_none());
        assert!(matches!(delete(&conn, root.id), Err(ApiError::NotFound)));
    }

    #[test]
    fn list_filters_and_searches() {
        let conn = conn();
        let root = create(&conn, "Fixed Income", None);
        create(&conn, "Government", Some(root.id));
        create(&conn, "Corporate", Some(root.id));
        create(&conn, "Crypto", None);

        let children = list(
            &conn,
            &CategoryFilter {
                parent: Some(root.id),
                ordering: Some("-name".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let names: Vec<_> = children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Government", "Corporate"]);

        let found = list(
            &conn,
            &CategoryFilter {
                search: Some("CRYP".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn duplicate_name_is_a_field_error() {
        let conn = conn();
        create(&conn, "Stocks", None);
        let again = CategoryInput {
            name: Some("Stocks".into()),
            ..Default::default()
        }
        .into_new(Utc::now())
        .unwrap();
        match insert(&conn, &again) {
            Err(ApiError::Validation(errors)) => assert!(errors.has("name")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
