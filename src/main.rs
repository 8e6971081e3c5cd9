mod account_import;
mod api;
mod batch;
mod cli;
mod db;
mod error;
mod fmt;
mod models;
mod pagination;
mod post_csv;
mod schedule;
mod settings;

use clap::Parser;

use cli::{AccountsCommands, CategoriesCommands, Cli, Commands, PostsCommands, UsersCommands};

const LOG_ENV: &str = "DROVER_LOG";

fn setup_logging(verbose: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(format!("drover={level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init { data_dir, api_url } => cli::init::run(data_dir, api_url),
        Commands::Status => cli::status::run(),
        Commands::Accounts { command } => match command {
            AccountsCommands::List {
                category,
                page,
                page_size,
            } => cli::accounts::list(category.as_deref(), page, page_size),
            AccountsCommands::Import {
                files,
                mode,
                category,
                dry_run,
            } => cli::import::run(&files, mode, category.as_deref(), dry_run),
            AccountsCommands::Edit {
                username,
                new_username,
                proxy,
                status,
            } => cli::accounts::edit(
                &username,
                new_username.as_deref(),
                proxy.as_deref(),
                status.as_deref(),
            ),
            AccountsCommands::Move {
                usernames,
                category,
            } => cli::accounts::move_to(&usernames, &category),
            AccountsCommands::Delete { username } => cli::accounts::delete(&username),
            AccountsCommands::Export { output, category } => {
                cli::accounts::export(output.as_deref(), category.as_deref())
            }
        },
        Commands::Categories { command } => match command {
            CategoriesCommands::List => cli::categories::list(),
            CategoriesCommands::Add { name, description } => {
                cli::categories::add(&name, &description)
            }
            CategoriesCommands::Update {
                name,
                new_name,
                description,
            } => cli::categories::update(&name, new_name.as_deref(), description.as_deref()),
            CategoriesCommands::Delete { name } => cli::categories::delete(&name),
        },
        Commands::Posts { command } => match command {
            PostsCommands::Template { output } => cli::posts::template(output.as_deref()),
            PostsCommands::Schedule {
                csv,
                category,
                random_delay,
                dry_run,
            } => cli::posts::schedule(&csv, &category, random_delay, dry_run),
            PostsCommands::Create {
                category,
                content,
                time,
                now,
                random_delay,
            } => cli::posts::create(&category, &content, time.as_deref(), now, random_delay),
            PostsCommands::List { category, remote } => {
                cli::posts::list(category.as_deref(), remote)
            }
            PostsCommands::ClearCompleted => cli::posts::clear_completed_cmd(),
        },
        Commands::Users { command } => match command {
            UsersCommands::List => cli::users::list(),
            UsersCommands::Add { name, email } => cli::users::add(&name, &email),
            UsersCommands::Show { id } => cli::users::show(id),
            UsersCommands::Update { id, name, email } => {
                cli::users::update(id, name.as_deref(), email.as_deref())
            }
            UsersCommands::Delete { id } => cli::users::delete(id),
        },
        Commands::Sync => cli::sync::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
