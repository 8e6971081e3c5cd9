use std::collections::HashSet;
use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};
use rusqlite::{Connection, OptionalExtension};

use crate::account_import::ImportCandidate;
use crate::api::AccountPatch;
use crate::batch::BatchOutcome;
use crate::error::{DroverError, Result};
use crate::fmt::plural;
use crate::models::{Account, AccountStatus};
use crate::pagination::{
    filter_accounts, render_page_numbers, CategoryFilter, PageWindow, PAGE_SIZE_OPTIONS,
};
use crate::settings::load_settings;

use super::categories::{ensure_category, get_category_by_name};
use super::{open_db, remote};

pub fn list(category: Option<&str>, page: usize, page_size: Option<usize>) -> Result<()> {
    let page_size = page_size.unwrap_or_else(|| load_settings().page_size);
    if !PAGE_SIZE_OPTIONS.contains(&page_size) {
        let options: Vec<String> = PAGE_SIZE_OPTIONS.iter().map(|n| n.to_string()).collect();
        return Err(DroverError::Other(format!(
            "Page size must be one of: {}",
            options.join(", ")
        )));
    }

    let conn = open_db()?;
    let accounts = list_accounts(&conn)?;
    let filter = CategoryFilter::from_arg(category);
    if let CategoryFilter::Named(name) = &filter {
        get_category_by_name(&conn, name)?;
    }
    let filtered = filter_accounts(&accounts, &filter);
    let window = PageWindow::new(filtered.len(), page, page_size)?;

    let mut table = Table::new();
    table.set_header(vec!["Username", "Category", "Proxy", "Status"]);
    for account in window.slice(&filtered) {
        let status = match account.status {
            AccountStatus::Active => account.status.as_str().green().to_string(),
            AccountStatus::Inactive => account.status.as_str().dimmed().to_string(),
        };
        table.add_row(vec![
            Cell::new(&account.username),
            Cell::new(account.category.as_deref().unwrap_or("-")),
            Cell::new(account.proxy.as_deref().unwrap_or("-")),
            Cell::new(status),
        ]);
    }
    println!("Accounts\n{table}");
    println!("{}", window.label());
    if window.total_pages > 1 {
        println!("Pages: {}", render_page_numbers(window.page, window.total_pages));
    }
    Ok(())
}

pub fn edit(
    username: &str,
    new_username: Option<&str>,
    proxy: Option<&str>,
    status: Option<&str>,
) -> Result<()> {
    let status = status.map(str::parse::<AccountStatus>).transpose()?;
    if new_username.is_none() && proxy.is_none() && status.is_none() {
        return Err(DroverError::Other(
            "Nothing to change (use --username, --proxy or --status)".into(),
        ));
    }

    let new_username = new_username.map(str::trim);

    let conn = open_db()?;
    let account = get_account(&conn, username)?;
    if let Some(new_username) = new_username {
        check_rename(&conn, &account, new_username)?;
    }
    if let Some(api) = remote()? {
        api.update_account(
            username,
            &AccountPatch {
                username: new_username.map(String::from),
                proxy: proxy.map(String::from),
                status: status.map(|s| s.as_str().to_string()),
            },
        )?;
    }

    if new_username.is_some() || proxy.is_some() {
        update_account(&conn, username, new_username, proxy)?;
    }
    let current = new_username.unwrap_or(username);
    if let Some(status) = status {
        set_status(&conn, current, status)?;
    }
    println!("Updated account: {current}");
    Ok(())
}

pub fn move_to(usernames: &[String], category: &str) -> Result<()> {
    let conn = open_db()?;
    let target = get_category_by_name(&conn, category)?;
    let mut pending: Vec<String> = Vec::new();
    for username in usernames {
        let account = get_account(&conn, username)?;
        if account.category_id == Some(target.id) {
            tracing::debug!(%username, category = %target.name, "account already in category");
        } else if !pending.contains(&account.username) {
            pending.push(account.username);
        }
    }
    if pending.is_empty() {
        println!("Nothing to move; already in {}", target.name);
        return Ok(());
    }
    if let (Some(api), Some(remote_id)) = (remote()?, target.remote_id.as_deref()) {
        api.add_accounts_to_category(remote_id, &pending)?;
    }
    let moved = change_category(&conn, &pending, target.id)?;
    println!("Moved {} to {}", plural(moved, "account"), target.name);
    Ok(())
}

pub fn delete(username: &str) -> Result<()> {
    let conn = open_db()?;
    get_account(&conn, username)?;
    if let Some(api) = remote()? {
        api.delete_account(username)?;
    }
    delete_account(&conn, username)?;
    println!("Deleted account: {username}");
    Ok(())
}

pub fn export(output: Option<&Path>, category: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let accounts = list_accounts(&conn)?;
    let filter = CategoryFilter::from_arg(category);
    let selected = filter_accounts(&accounts, &filter);

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            write_csv(file, &selected)?;
            println!("Exported {} to {}", plural(selected.len(), "account"), path.display());
        }
        None => write_csv(std::io::stdout().lock(), &selected)?,
    }
    Ok(())
}

fn write_csv<W: std::io::Write>(writer: W, accounts: &[&Account]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["username", "category", "proxy", "status"])?;
    for account in accounts {
        wtr.write_record([
            account.username.as_str(),
            account.category.as_deref().unwrap_or(""),
            account.proxy.as_deref().unwrap_or(""),
            account.status.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Data layer
// ---------------------------------------------------------------------------

const ACCOUNT_SELECT: &str = "SELECT a.id, a.username, a.proxy, a.status, a.category_id, c.name \
     FROM accounts a LEFT JOIN categories c ON c.id = a.category_id";

fn account_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    let status: String = row.get(3)?;
    Ok(Account {
        id: row.get(0)?,
        username: row.get(1)?,
        proxy: row.get(2)?,
        status: status.parse().unwrap_or(AccountStatus::Inactive),
        category_id: row.get(4)?,
        category: row.get(5)?,
    })
}

pub fn list_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(&format!("{ACCOUNT_SELECT} ORDER BY a.id ASC"))?;
    let accounts = stmt
        .query_map([], account_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(accounts)
}

pub fn get_account(conn: &Connection, username: &str) -> Result<Account> {
    conn.query_row(
        &format!("{ACCOUNT_SELECT} WHERE a.username = ?1"),
        [username],
        account_from_row,
    )
    .optional()?
    .ok_or_else(|| DroverError::UnknownAccount(username.to_string()))
}

fn username_taken(conn: &Connection, username: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM accounts WHERE username = ?1)",
        [username],
        |row| row.get(0),
    )?)
}

pub fn add_account(
    conn: &Connection,
    username: &str,
    proxy: Option<&str>,
    status: AccountStatus,
    category_id: Option<i64>,
) -> Result<i64> {
    let username = username.trim();
    if username.is_empty() {
        return Err(DroverError::Other("Username is required".into()));
    }
    if username_taken(conn, username)? {
        return Err(DroverError::Other(format!("Account already exists: {username}")));
    }
    conn.execute(
        "INSERT INTO accounts (username, proxy, status, category_id) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![username, proxy, status.as_str(), category_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// A new username must be non-empty and not belong to another account.
pub fn check_rename(conn: &Connection, current: &Account, new_username: &str) -> Result<()> {
    if new_username.is_empty() {
        return Err(DroverError::Other("Username is required".into()));
    }
    if new_username != current.username && username_taken(conn, new_username)? {
        return Err(DroverError::Other(format!(
            "Account already exists: {new_username}"
        )));
    }
    Ok(())
}

pub fn update_account(
    conn: &Connection,
    username: &str,
    new_username: Option<&str>,
    proxy: Option<&str>,
) -> Result<()> {
    let current = get_account(conn, username)?;
    let new_username = new_username.map(str::trim).unwrap_or(&current.username);
    check_rename(conn, &current, new_username)?;
    let proxy = proxy.map(String::from).or(current.proxy);
    conn.execute(
        "UPDATE accounts SET username = ?1, proxy = ?2 WHERE id = ?3",
        rusqlite::params![new_username, proxy, current.id],
    )?;
    Ok(())
}

pub fn set_status(conn: &Connection, username: &str, status: AccountStatus) -> Result<()> {
    let updated = conn.execute(
        "UPDATE accounts SET status = ?1 WHERE username = ?2",
        rusqlite::params![status.as_str(), username],
    )?;
    if updated == 0 {
        return Err(DroverError::UnknownAccount(username.to_string()));
    }
    Ok(())
}

/// Move every listed account into `category_id`; all or nothing. Repeated
/// usernames are counted once.
pub fn change_category(conn: &Connection, usernames: &[String], category_id: i64) -> Result<usize> {
    let unique: HashSet<&str> = usernames.iter().map(String::as_str).collect();
    let tx = conn.unchecked_transaction()?;
    for username in &unique {
        let updated = tx.execute(
            "UPDATE accounts SET category_id = ?1 WHERE username = ?2",
            rusqlite::params![category_id, username],
        )?;
        if updated == 0 {
            return Err(DroverError::UnknownAccount(username.to_string()));
        }
    }
    tx.commit()?;
    Ok(unique.len())
}

pub fn delete_account(conn: &Connection, username: &str) -> Result<()> {
    let deleted = conn.execute("DELETE FROM accounts WHERE username = ?1", [username])?;
    if deleted == 0 {
        return Err(DroverError::UnknownAccount(username.to_string()));
    }
    Ok(())
}

/// Insert imported accounts one by one. A clash with an existing username is
/// recorded against the candidate's file and does not stop the batch.
pub fn commit_candidates(
    conn: &Connection,
    candidates: &[ImportCandidate],
) -> Result<BatchOutcome<String>> {
    let mut outcome = BatchOutcome::new();
    let tx = conn.unchecked_transaction()?;
    for candidate in candidates {
        let category_id = ensure_category(&tx, &candidate.category)?;
        match add_account(
            &tx,
            &candidate.username,
            Some(&candidate.proxy),
            AccountStatus::Inactive,
            Some(category_id),
        ) {
            Ok(_) => outcome.accept(candidate.username.clone()),
            Err(e @ DroverError::Other(_)) => outcome.reject(candidate.source.clone(), e.to_string()),
            Err(e) => return Err(e),
        }
    }
    tx.commit()?;
    tracing::info!(
        added = outcome.items.len(),
        rejected = outcome.errors.len(),
        "committed imported accounts"
    );
    Ok(outcome)
}
