use std::path::Path;

use chrono::{Local, NaiveTime};
use colored::Colorize;
use comfy_table::{Cell, Table};
use rusqlite::Connection;

use crate::api::{ApiClient, BulkPostBody};
use crate::error::{DroverError, Result};
use crate::fmt::plural;
use crate::models::{Category, PostCandidate, ScheduledPost};
use crate::post_csv::{parse_posts, TEMPLATE};
use crate::schedule::{effective_status, BulkPost, PostStatus, ScheduleTime, TIME_FORMAT_HINT};

use super::categories::get_category_by_name;
use super::{open_db, print_errors, remote};

const PREVIEW_WIDTH: usize = 60;

fn now() -> NaiveTime {
    Local::now().time()
}

fn preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_WIDTH {
        return content.to_string();
    }
    let cut: String = content.chars().take(PREVIEW_WIDTH - 3).collect();
    format!("{cut}...")
}

pub fn template(output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, TEMPLATE)?;
            println!("Wrote template to {}", path.display());
        }
        None => print!("{TEMPLATE}"),
    }
    Ok(())
}

pub fn schedule(csv_path: &Path, category: &str, random_delay: Option<u32>, dry_run: bool) -> Result<()> {
    let text = std::fs::read_to_string(csv_path)?;
    let conn = open_db()?;
    let target = get_category_by_name(&conn, category)?;

    let outcome = parse_posts(&text);
    print_post_preview(&outcome.items);
    print_errors(&outcome.errors);

    let rows = outcome.processed();
    let clean = outcome.is_clean();
    let bulk = BulkPost::new(target.id, outcome.items, random_delay)?;
    if dry_run {
        println!(
            "Dry run: {} of {} would be scheduled for {}.",
            bulk.posts.len(),
            plural(rows, "row"),
            target.name
        );
        return Ok(());
    }
    if !clean {
        println!("{}", "Rows with errors were skipped.".yellow());
    }

    submit(&conn, &target, &bulk, false)?;
    println!(
        "Scheduled {} posts for {}",
        bulk.posts.len().to_string().green(),
        target.name
    );
    Ok(())
}

pub fn create(
    category: &str,
    content: &str,
    time: Option<&str>,
    immediately: bool,
    random_delay: Option<u32>,
) -> Result<()> {
    let content = content.trim();
    if content.is_empty() {
        return Err(DroverError::Other("Post content is empty".into()));
    }
    let time = match (time, immediately) {
        (Some(raw), false) if ScheduleTime::is_valid(raw) => raw.parse::<ScheduleTime>()?,
        (Some(_), false) => return Err(DroverError::Other(TIME_FORMAT_HINT.into())),
        (None, true) => ScheduleTime::from_naive(now()),
        _ => {
            return Err(DroverError::Other(
                "Give exactly one of --time or --now".into(),
            ))
        }
    };

    let conn = open_db()?;
    let target = get_category_by_name(&conn, category)?;
    let bulk = BulkPost::new(
        target.id,
        vec![PostCandidate {
            content: content.to_string(),
            time,
        }],
        random_delay,
    )?;
    submit(&conn, &target, &bulk, immediately)?;
    if immediately {
        println!("Posted to {} now", target.name);
    } else {
        println!("Scheduled post for {} at {time}", target.name);
    }
    Ok(())
}

/// Send to the service first; local rows are written only once it accepts.
fn submit(conn: &Connection, target: &Category, bulk: &BulkPost, immediately: bool) -> Result<()> {
    if let Some(api) = remote()? {
        submit_remote(&api, target, bulk, immediately)?;
    }
    schedule_posts(conn, bulk)?;
    Ok(())
}

fn submit_remote(api: &ApiClient, target: &Category, bulk: &BulkPost, immediately: bool) -> Result<()> {
    let remote_id = target.remote_id.as_deref().ok_or_else(|| {
        DroverError::Other(format!(
            "Category {} is not on the server yet (run `drover sync`)",
            target.name
        ))
    })?;
    api.create_bulk_post(&BulkPostBody::new(bulk, remote_id, immediately))
}

pub fn list(category: Option<&str>, from_server: bool) -> Result<()> {
    if from_server {
        return list_remote();
    }
    let conn = open_db()?;
    let category_id = category
        .map(|name| get_category_by_name(&conn, name).map(|c| c.id))
        .transpose()?;
    let now = now();
    let posts: Vec<ScheduledPost> = list_posts(&conn)?
        .into_iter()
        .filter(|p| category_id.map_or(true, |id| p.category_id == id))
        .collect();

    let mut table = Table::new();
    table.set_header(vec!["ID", "Category", "Content", "Time", "Delay", "Status"]);
    for post in &posts {
        let status = match effective_status(post.status, &post.time, now) {
            PostStatus::Pending => PostStatus::Pending.as_str().yellow().to_string(),
            PostStatus::Completed => PostStatus::Completed.as_str().green().to_string(),
        };
        table.add_row(vec![
            Cell::new(post.id),
            Cell::new(&post.category),
            Cell::new(preview(&post.content)),
            Cell::new(post.time),
            Cell::new(
                post.random_delay_minutes
                    .map(|m| format!("±{m}m"))
                    .unwrap_or_else(|| "-".into()),
            ),
            Cell::new(status),
        ]);
    }
    println!("Scheduled posts\n{table}");
    Ok(())
}

fn list_remote() -> Result<()> {
    let api = remote()?.ok_or_else(|| {
        DroverError::Settings("No API URL configured (set api_url or DROVER_API_URL)".into())
    })?;
    let posts = api.get_scheduled_posts()?;
    let mut table = Table::new();
    table.set_header(vec!["Username", "Content", "Time", "Status"]);
    for post in &posts {
        table.add_row(vec![
            Cell::new(post.username.as_deref().unwrap_or("-")),
            Cell::new(preview(post.text())),
            Cell::new(post.time.as_deref().unwrap_or("-")),
            Cell::new(post.status.as_deref().unwrap_or("-")),
        ]);
    }
    println!("Scheduled posts (server)\n{table}");
    Ok(())
}

pub fn clear_completed_cmd() -> Result<()> {
    let conn = open_db()?;
    let removed = clear_completed(&conn, now())?;
    println!("Removed {}", plural(removed, "completed post"));
    Ok(())
}

fn print_post_preview(posts: &[PostCandidate]) {
    if posts.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec!["#", "Content", "Time"]);
    for (i, post) in posts.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(preview(&post.content)),
            Cell::new(post.time),
        ]);
    }
    println!("Posts\n{table}");
}

// ---------------------------------------------------------------------------
// Data layer
// ---------------------------------------------------------------------------

pub fn schedule_posts(conn: &Connection, bulk: &BulkPost) -> Result<Vec<i64>> {
    let tx = conn.unchecked_transaction()?;
    let mut ids = Vec::with_capacity(bulk.posts.len());
    for post in &bulk.posts {
        tx.execute(
            "INSERT INTO scheduled_posts (category_id, content, scheduled_time, random_delay_minutes) \
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                bulk.category_id,
                post.content,
                post.time.to_string(),
                bulk.random_delay_minutes
            ],
        )?;
        ids.push(tx.last_insert_rowid());
    }
    tx.commit()?;
    tracing::info!(
        category_id = bulk.category_id,
        posts = ids.len(),
        "scheduled posts"
    );
    Ok(ids)
}

pub fn list_posts(conn: &Connection) -> Result<Vec<ScheduledPost>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.category_id, c.name, p.content, p.scheduled_time, \
                p.random_delay_minutes, p.status \
         FROM scheduled_posts p JOIN categories c ON c.id = p.category_id \
         ORDER BY p.id ASC",
    )?;
    let rows: Vec<(i64, i64, String, String, String, Option<u32>, String)> = stmt
        .query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, category_id, category, content, time, delay, status)| -> Result<ScheduledPost> {
            Ok(ScheduledPost {
                id,
                category_id,
                category,
                content,
                time: time.parse()?,
                random_delay_minutes: delay,
                status: status.parse()?,
            })
        })
        .collect()
}

/// Delete posts whose effective status is completed at `now`.
pub fn clear_completed(conn: &Connection, now: NaiveTime) -> Result<usize> {
    let done: Vec<i64> = list_posts(conn)?
        .into_iter()
        .filter(|p| effective_status(p.status, &p.time, now) == PostStatus::Completed)
        .map(|p| p.id)
        .collect();
    let tx = conn.unchecked_transaction()?;
    for id in &done {
        tx.execute("DELETE FROM scheduled_posts WHERE id = ?1", [id])?;
    }
    tx.commit()?;
    Ok(done.len())
}
