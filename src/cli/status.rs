use std::path::PathBuf;

use rusqlite::Connection;

use crate::db::{get_connection, DB_FILE};
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::load_settings;

fn count(conn: &Connection, sql: &str) -> Result<i64> {
    Ok(conn.query_row(sql, [], |r| r.get(0))?)
}

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = PathBuf::from(&settings.data_dir);
    let db_path = data_dir.join(DB_FILE);

    println!("Data dir:   {}", data_dir.display());
    println!("Database:   {}", db_path.display());
    println!(
        "API:        {}",
        settings.effective_api_url().as_deref().unwrap_or("(local only)")
    );
    println!("Page size:  {}", settings.page_size);

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `drover init` to set up.");
        return Ok(());
    }

    let size = std::fs::metadata(&db_path)?.len();
    println!("DB size:    {}", format_bytes(size));

    let conn = get_connection(&db_path)?;
    println!();
    println!("Accounts:        {}", count(&conn, "SELECT count(*) FROM accounts")?);
    println!(
        "  active:        {}",
        count(&conn, "SELECT count(*) FROM accounts WHERE status = 'active'")?
    );
    println!("Categories:      {}", count(&conn, "SELECT count(*) FROM categories")?);
    println!("Scheduled posts: {}", count(&conn, "SELECT count(*) FROM scheduled_posts")?);
    println!("Users:           {}", count(&conn, "SELECT count(*) FROM users")?);
    println!("Imported files:  {}", count(&conn, "SELECT count(*) FROM imports")?);
    Ok(())
}
