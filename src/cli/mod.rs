pub mod accounts;
pub mod categories;
pub mod import;
pub mod init;
pub mod posts;
pub mod status;
pub mod sync;
pub mod users;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use rusqlite::Connection;

use crate::account_import::ImportMode;
use crate::api::ApiClient;
use crate::batch::ImportError;
use crate::db;
use crate::error::Result;
use crate::fmt::plural;
use crate::settings::{get_data_dir, load_settings};

/// Open the store under the configured data directory, creating it on first use.
pub(crate) fn open_db() -> Result<Connection> {
    let dir = get_data_dir();
    std::fs::create_dir_all(&dir)?;
    db::open(&dir)
}

/// API client when a service URL is configured; `None` means local-only.
pub(crate) fn remote() -> Result<Option<ApiClient>> {
    ApiClient::from_settings(&load_settings())
}

pub(crate) fn print_errors(errors: &[ImportError]) {
    if errors.is_empty() {
        return;
    }
    println!("{}", plural(errors.len(), "error").red().bold());
    for error in errors {
        println!("  - {error}");
    }
}

#[derive(Parser)]
#[command(
    name = "drover",
    version,
    about = "Manage social-media accounts and schedule posts across account categories."
)]
pub struct Cli {
    /// Show debug logging on stderr (DROVER_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create settings and the local database.
    Init {
        /// Path for drover data (default: ~/.local/share/drover)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Base URL of the account service, e.g. http://localhost:3090/api
        #[arg(long = "api-url")]
        api_url: Option<String>,
    },
    /// Show configuration and summary counts.
    Status,
    /// Manage accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Manage account categories.
    Categories {
        #[command(subcommand)]
        command: CategoriesCommands,
    },
    /// Schedule and inspect posts.
    Posts {
        #[command(subcommand)]
        command: PostsCommands,
    },
    /// Manage users.
    Users {
        #[command(subcommand)]
        command: UsersCommands,
    },
    /// Pull categories and accounts from the service into the local store.
    Sync,
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// List accounts, one page at a time.
    List {
        /// Only show this category ("All" shows everything)
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "1")]
        page: usize,
        /// 10, 25, 50, 100 or 500 (default from settings)
        #[arg(long = "page-size")]
        page_size: Option<usize>,
    },
    /// Import accounts from session files or username.extension files.
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, value_enum, default_value_t = ImportMode::Auto)]
        mode: ImportMode,
        /// Put every imported account in this category
        #[arg(long)]
        category: Option<String>,
        /// Parse and preview without importing
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// Change an account's username, proxy or status.
    Edit {
        username: String,
        /// New username
        #[arg(long = "username")]
        new_username: Option<String>,
        #[arg(long)]
        proxy: Option<String>,
        /// active or inactive
        #[arg(long)]
        status: Option<String>,
    },
    /// Move accounts to another category.
    Move {
        #[arg(required = true)]
        usernames: Vec<String>,
        #[arg(long)]
        category: String,
    },
    /// Delete an account.
    Delete { username: String },
    /// Export accounts as CSV.
    Export {
        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        category: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum CategoriesCommands {
    /// List categories with account counts.
    List,
    /// Add a category.
    Add {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Rename a category or change its description.
    Update {
        name: String,
        /// New name
        #[arg(long = "name")]
        new_name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a category; its accounts move to Imported.
    Delete { name: String },
}

#[derive(Subcommand)]
pub enum PostsCommands {
    /// Print or write the mass-post CSV template.
    Template {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Schedule every post in a CSV file for a category.
    Schedule {
        csv: PathBuf,
        #[arg(long)]
        category: String,
        /// Spread each post by up to this many minutes (1-60)
        #[arg(long = "random-delay", value_parser = clap::value_parser!(u32).range(1..=60))]
        random_delay: Option<u32>,
        /// Parse and preview without scheduling
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// Schedule a single post, or post it right away with --now.
    Create {
        #[arg(long)]
        category: String,
        #[arg(long)]
        content: String,
        /// Time of day, e.g. "9:00 AM"
        #[arg(long, conflicts_with = "now", required_unless_present = "now")]
        time: Option<String>,
        #[arg(long)]
        now: bool,
        #[arg(long = "random-delay", value_parser = clap::value_parser!(u32).range(1..=60))]
        random_delay: Option<u32>,
    },
    /// List scheduled posts.
    List {
        #[arg(long)]
        category: Option<String>,
        /// Ask the service instead of the local store
        #[arg(long)]
        remote: bool,
    },
    /// Remove posts whose time has passed.
    ClearCompleted,
}

#[derive(Subcommand)]
pub enum UsersCommands {
    /// List users.
    List,
    /// Add a user.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Show one user.
    Show { id: i64 },
    /// Update a user's name or email.
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Delete a user.
    Delete { id: i64 },
}
