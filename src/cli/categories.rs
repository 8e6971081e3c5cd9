use comfy_table::{Cell, Table};
use rusqlite::{Connection, OptionalExtension};

use crate::error::{DroverError, Result};
use crate::fmt::plural;
use crate::models::{Category, IMPORTED_CATEGORY};

use super::{open_db, remote};

#[derive(Debug, Clone)]
pub struct CategoryRow {
    pub category: Category,
    pub account_count: i64,
}

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let rows = list_categories(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Description", "Accounts", "Remote ID"]);
    for row in rows {
        table.add_row(vec![
            Cell::new(row.category.id),
            Cell::new(row.category.name),
            Cell::new(row.category.description),
            Cell::new(row.account_count),
            Cell::new(row.category.remote_id.unwrap_or_default()),
        ]);
    }
    println!("Categories\n{table}");
    Ok(())
}

pub fn add(name: &str, description: &str) -> Result<()> {
    let conn = open_db()?;
    validate_name(&conn, name.trim(), None)?;
    let remote_id = match remote()? {
        Some(api) => Some(api.create_category(name.trim(), description)?.id),
        None => None,
    };
    let id = add_category(&conn, name, description)?;
    if let Some(remote_id) = remote_id {
        set_remote_id(&conn, id, &remote_id)?;
    }
    println!("Added category: {}", name.trim());
    Ok(())
}

pub fn update(name: &str, new_name: Option<&str>, description: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let current = get_category_by_name(&conn, name)?;
    let new_name = new_name.unwrap_or(&current.name);
    validate_name(&conn, new_name.trim(), Some(current.id))?;

    if let (Some(api), Some(remote_id)) = (remote()?, current.remote_id.as_deref()) {
        let description = description.unwrap_or(&current.description);
        api.update_category(remote_id, new_name.trim(), description)?;
    }
    match description {
        Some(description) => update_category(&conn, current.id, new_name, description)?,
        None => rename_category(&conn, current.id, new_name)?,
    }
    println!("Updated category {}: {}", current.id, new_name.trim());
    Ok(())
}

pub fn delete(name: &str) -> Result<()> {
    let conn = open_db()?;
    let category = get_category_by_name(&conn, name)?;
    if category.name == IMPORTED_CATEGORY {
        return Err(DroverError::Other(format!(
            "The {IMPORTED_CATEGORY} category cannot be deleted"
        )));
    }
    if let (Some(api), Some(remote_id)) = (remote()?, category.remote_id.as_deref()) {
        api.delete_category(remote_id)?;
    }
    let moved = delete_category(&conn, category.id)?;
    println!("Deleted category: {}", category.name);
    if moved > 0 {
        println!("Moved {} to {IMPORTED_CATEGORY}", plural(moved, "account"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Data layer
// ---------------------------------------------------------------------------

fn category_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        remote_id: row.get(3)?,
    })
}

pub fn list_categories(conn: &Connection) -> Result<Vec<CategoryRow>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.name, c.description, c.remote_id, \
                (SELECT count(*) FROM accounts a WHERE a.category_id = c.id) \
         FROM categories c ORDER BY c.name ASC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(CategoryRow {
                category: category_from_row(row)?,
                account_count: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_category(conn: &Connection, id: i64) -> Result<Category> {
    conn.query_row(
        "SELECT id, name, description, remote_id FROM categories WHERE id = ?1",
        [id],
        category_from_row,
    )
    .optional()?
    .ok_or_else(|| DroverError::Other(format!("Category not found: id {id}")))
}

pub fn get_category_by_name(conn: &Connection, name: &str) -> Result<Category> {
    find_category(conn, name.trim())?
        .ok_or_else(|| DroverError::UnknownCategory(name.trim().to_string()))
}

fn find_category(conn: &Connection, name: &str) -> Result<Option<Category>> {
    Ok(conn
        .query_row(
            "SELECT id, name, description, remote_id FROM categories WHERE name = ?1",
            [name],
            category_from_row,
        )
        .optional()?)
}

fn validate_name(conn: &Connection, name: &str, exclude_id: Option<i64>) -> Result<()> {
    if name.is_empty() {
        return Err(DroverError::Other("Name is required".into()));
    }
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE name = ?1 AND id != ?2)",
        rusqlite::params![name, exclude_id.unwrap_or(-1)],
        |row| row.get(0),
    )?;
    if exists {
        return Err(DroverError::Other(format!("Category name already exists: {name}")));
    }
    Ok(())
}

pub fn add_category(conn: &Connection, name: &str, description: &str) -> Result<i64> {
    let name = name.trim();
    validate_name(conn, name, None)?;
    conn.execute(
        "INSERT INTO categories (name, description) VALUES (?1, ?2)",
        rusqlite::params![name, description.trim()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Id of the named category, creating it when missing.
pub fn ensure_category(conn: &Connection, name: &str) -> Result<i64> {
    let name = name.trim();
    match find_category(conn, name)? {
        Some(category) => Ok(category.id),
        None => {
            tracing::info!(category = name, "creating category on demand");
            add_category(conn, name, "")
        }
    }
}

pub fn update_category(conn: &Connection, id: i64, name: &str, description: &str) -> Result<()> {
    let name = name.trim();
    let current = get_category(conn, id)?;
    if current.name == IMPORTED_CATEGORY && name != IMPORTED_CATEGORY {
        return Err(DroverError::Other(format!(
            "The {IMPORTED_CATEGORY} category cannot be renamed"
        )));
    }
    validate_name(conn, name, Some(id))?;
    conn.execute(
        "UPDATE categories SET name = ?1, description = ?2 WHERE id = ?3",
        rusqlite::params![name, description.trim(), id],
    )?;
    Ok(())
}

pub fn rename_category(conn: &Connection, id: i64, new_name: &str) -> Result<()> {
    let current = get_category(conn, id)?;
    update_category(conn, id, new_name, &current.description)
}

pub fn set_remote_id(conn: &Connection, id: i64, remote_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE categories SET remote_id = ?1 WHERE id = ?2",
        rusqlite::params![remote_id, id],
    )?;
    Ok(())
}

/// Delete a category, moving its accounts to `Imported` and dropping its
/// scheduled posts. Returns the number of accounts moved.
pub fn delete_category(conn: &Connection, id: i64) -> Result<usize> {
    let category = get_category(conn, id)?;
    if category.name == IMPORTED_CATEGORY {
        return Err(DroverError::Other(format!(
            "The {IMPORTED_CATEGORY} category cannot be deleted"
        )));
    }

    let tx = conn.unchecked_transaction()?;
    let imported_id = ensure_category(&tx, IMPORTED_CATEGORY)?;
    let moved = tx.execute(
        "UPDATE accounts SET category_id = ?1 WHERE category_id = ?2",
        rusqlite::params![imported_id, id],
    )?;
    let dropped_posts = tx.execute("DELETE FROM scheduled_posts WHERE category_id = ?1", [id])?;
    tx.execute("DELETE FROM categories WHERE id = ?1", [id])?;
    tx.commit()?;

    tracing::info!(
        category = %category.name,
        moved,
        dropped_posts,
        "deleted category"
    );
    Ok(moved)
}
