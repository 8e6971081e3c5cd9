use comfy_table::{Cell, Table};
use rusqlite::{Connection, OptionalExtension};

use crate::error::{DroverError, Result};
use crate::models::User;

use super::open_db;

pub const MAX_NAME_LEN: usize = 60;

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let users = list_users(&conn)?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Email", "Created"]);
    for user in users {
        table.add_row(vec![
            Cell::new(user.id),
            Cell::new(user.name),
            Cell::new(user.email),
            Cell::new(user.created_at),
        ]);
    }
    println!("Users\n{table}");
    Ok(())
}

pub fn add(name: &str, email: &str) -> Result<()> {
    let conn = open_db()?;
    let id = create_user(&conn, name, email)?;
    println!("Added user {id}: {}", name.trim());
    Ok(())
}

pub fn show(id: i64) -> Result<()> {
    let conn = open_db()?;
    let user = get_user(&conn, id)?;
    println!("ID:       {}", user.id);
    println!("Name:     {}", user.name);
    println!("Email:    {}", user.email);
    println!("Created:  {}", user.created_at);
    Ok(())
}

pub fn update(id: i64, name: Option<&str>, email: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    update_user(&conn, id, name, email)?;
    println!("Updated user {id}");
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let conn = open_db()?;
    delete_user(&conn, id)?;
    println!("Deleted user {id}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Data layer
// ---------------------------------------------------------------------------

fn not_found(id: i64) -> DroverError {
    DroverError::Other(format!("User not found: id {id}"))
}

fn validate(conn: &Connection, name: &str, email: &str, exclude_id: Option<i64>) -> Result<()> {
    if name.is_empty() {
        return Err(DroverError::Other("Name is required".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DroverError::Other(format!(
            "Name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if email.is_empty() {
        return Err(DroverError::Other("Email is required".into()));
    }
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1 AND id != ?2)",
        rusqlite::params![email, exclude_id.unwrap_or(-1)],
        |row| row.get(0),
    )?;
    if taken {
        return Err(DroverError::Other(format!("Email already in use: {email}")));
    }
    Ok(())
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub fn list_users(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare("SELECT id, name, email, created_at FROM users ORDER BY id ASC")?;
    let users = stmt
        .query_map([], user_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn get_user(conn: &Connection, id: i64) -> Result<User> {
    conn.query_row(
        "SELECT id, name, email, created_at FROM users WHERE id = ?1",
        [id],
        user_from_row,
    )
    .optional()?
    .ok_or_else(|| not_found(id))
}

pub fn create_user(conn: &Connection, name: &str, email: &str) -> Result<i64> {
    let (name, email) = (name.trim(), email.trim());
    validate(conn, name, email, None)?;
    conn.execute(
        "INSERT INTO users (name, email) VALUES (?1, ?2)",
        rusqlite::params![name, email],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_user(conn: &Connection, id: i64, name: Option<&str>, email: Option<&str>) -> Result<()> {
    let current = get_user(conn, id)?;
    let name = name.map(str::trim).unwrap_or(&current.name);
    let email = email.map(str::trim).unwrap_or(&current.email);
    validate(conn, name, email, Some(id))?;
    conn.execute(
        "UPDATE users SET name = ?1, email = ?2 WHERE id = ?3",
        rusqlite::params![name, email, id],
    )?;
    Ok(())
}

pub fn delete_user(conn: &Connection, id: i64) -> Result<()> {
    let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
    if deleted == 0 {
        return Err(not_found(id));
    }
    Ok(())
}
