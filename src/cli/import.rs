use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};
use rusqlite::Connection;

use crate::account_import::{parse_files, read_files, ImportCandidate, ImportMode, UploadedFile};
use crate::api::ImportResult;
use crate::batch::ImportError;
use crate::error::Result;

use super::accounts::commit_candidates;
use super::categories::get_category_by_name;
use super::{open_db, print_errors, remote};

pub fn run(files: &[PathBuf], mode: ImportMode, category: Option<&str>, dry_run: bool) -> Result<()> {
    let conn = open_db()?;
    let override_category = category.map(|name| get_category_by_name(&conn, name)).transpose()?;

    let (uploaded, read_errors) = read_files(files);
    let (fresh, seen_errors) = split_already_imported(&conn, uploaded)?;

    let mut outcome = parse_files(&fresh, mode, &mut rand::thread_rng());
    outcome.absorb_errors(read_errors);
    outcome.absorb_errors(seen_errors);
    if let Some(target) = &override_category {
        for candidate in &mut outcome.items {
            candidate.category = target.name.clone();
        }
    }

    print_preview(&outcome.items);
    print_errors(&outcome.errors);

    if !outcome.has_items() {
        println!("No valid accounts to import.");
        return Ok(());
    }
    if dry_run {
        println!(
            "Dry run: {} accounts would be imported ({} errors).",
            outcome.items.len(),
            outcome.errors.len()
        );
        return Ok(());
    }

    let mut failed = outcome.errors.len();
    let candidates = match remote()? {
        Some(api) => {
            let remote_category = override_category.as_ref().and_then(|c| c.remote_id.as_deref());
            let results = api.import_accounts(&outcome.items, remote_category)?;
            let (accepted, rejected) = apply_remote_results(outcome.items, &results);
            print_errors(&rejected);
            failed += rejected.len();
            accepted
        }
        None => outcome.items,
    };

    let committed = commit_candidates(&conn, &candidates)?;
    print_errors(&committed.errors);
    failed += committed.errors.len();

    let committed_sources: HashSet<&str> = candidates
        .iter()
        .filter(|c| committed.items.contains(&c.username))
        .map(|c| c.source.as_str())
        .collect();
    for file in fresh.iter().filter(|f| committed_sources.contains(f.name.as_str())) {
        record_import(&conn, file, mode)?;
    }

    println!(
        "{} imported, {} failed",
        committed.items.len().to_string().green(),
        failed.to_string().red()
    );
    Ok(())
}

fn print_preview(candidates: &[ImportCandidate]) {
    if candidates.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec!["Username", "Category", "Proxy", "Source", "Payload"]);
    for c in candidates {
        table.add_row(vec![
            Cell::new(&c.username),
            Cell::new(&c.category),
            Cell::new(&c.proxy),
            Cell::new(&c.source),
            Cell::new(if c.payload.is_some() { "session" } else { "-" }),
        ]);
    }
    println!("Accounts to import\n{table}");
}

/// Keep the candidates the service accepted; everything else becomes an error
/// against the candidate's file.
pub fn apply_remote_results(
    candidates: Vec<ImportCandidate>,
    results: &[ImportResult],
) -> (Vec<ImportCandidate>, Vec<ImportError>) {
    let by_username: HashMap<&str, &ImportResult> =
        results.iter().map(|r| (r.username.as_str(), r)).collect();
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for candidate in candidates {
        match by_username.get(candidate.username.as_str()) {
            Some(result) if result.success => accepted.push(candidate),
            Some(result) => {
                let reason = result
                    .error
                    .as_deref()
                    .or(result.message.as_deref())
                    .unwrap_or("rejected by server");
                rejected.push(ImportError::new(
                    candidate.source.clone(),
                    format!("Failed to import {}: {reason}", candidate.username),
                ));
            }
            None => rejected.push(ImportError::new(
                candidate.source.clone(),
                format!("Failed to import {}: no result from server", candidate.username),
            )),
        }
    }
    tracing::info!(
        accepted = accepted.len(),
        rejected = rejected.len(),
        "bulk import results"
    );
    (accepted, rejected)
}

// ---------------------------------------------------------------------------
// Import history
// ---------------------------------------------------------------------------

/// Same file name with the same content. Name-only imports are often empty
/// files, so the checksum alone is not enough.
pub fn is_imported(conn: &Connection, file: &UploadedFile) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM imports WHERE filename = ?1 AND checksum = ?2)",
        rusqlite::params![file.name, file.checksum],
        |row| row.get(0),
    )?)
}

pub fn record_import(conn: &Connection, file: &UploadedFile, mode: ImportMode) -> Result<()> {
    conn.execute(
        "INSERT INTO imports (filename, mode, checksum) VALUES (?1, ?2, ?3)",
        rusqlite::params![file.name, mode.as_str(), file.checksum],
    )?;
    Ok(())
}

fn split_already_imported(
    conn: &Connection,
    files: Vec<UploadedFile>,
) -> Result<(Vec<UploadedFile>, Vec<ImportError>)> {
    let mut fresh = Vec::with_capacity(files.len());
    let mut errors = Vec::new();
    for file in files {
        if is_imported(conn, &file)? {
            errors.push(ImportError::new(
                file.name.clone(),
                format!("File already imported: {}", file.name),
            ));
        } else {
            fresh.push(file);
        }
    }
    Ok((fresh, errors))
}
