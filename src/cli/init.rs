use std::path::PathBuf;

use crate::db;
use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(data_dir: Option<String>, api_url: Option<String>) -> Result<()> {
    let mut settings = load_settings();

    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if let Some(url) = api_url {
        let url = url.trim().trim_end_matches('/').to_string();
        settings.api_url = if url.is_empty() { None } else { Some(url) };
    }

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;
    save_settings(&settings)?;
    db::open(&resolved)?;

    println!("Initialized drover at {}", resolved.display());
    match settings.effective_api_url() {
        Some(url) => println!("API:  {url}"),
        None => println!("API:  (local only)"),
    }
    Ok(())
}
