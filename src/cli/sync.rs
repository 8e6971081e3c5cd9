use rusqlite::Connection;

use crate::api::{RemoteAccount, RemoteCategory};
use crate::error::{DroverError, Result};
use crate::models::{AccountStatus, IMPORTED_CATEGORY};

use super::accounts::{add_account, get_account};
use super::categories::{add_category, ensure_category, get_category_by_name, set_remote_id};
use super::{open_db, remote};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub categories_linked: usize,
    pub categories_added: usize,
    pub accounts_added: usize,
    pub accounts_updated: usize,
}

pub fn run() -> Result<()> {
    let api = remote()?.ok_or_else(|| {
        DroverError::Settings("No API URL configured (set api_url or DROVER_API_URL)".into())
    })?;
    let categories = api.get_categories()?;
    let accounts = api.get_accounts()?;

    let conn = open_db()?;
    let summary = merge_remote(&conn, &categories, &accounts)?;
    println!("Synced from {}", api.base_url());
    println!(
        "Categories:  {} linked, {} added",
        summary.categories_linked, summary.categories_added
    );
    println!(
        "Accounts:    {} added, {} updated",
        summary.accounts_added, summary.accounts_updated
    );
    Ok(())
}

/// Fold the server's categories and accounts into the local store. Categories
/// match by name; accounts match by username and take the server's values.
pub fn merge_remote(
    conn: &Connection,
    categories: &[RemoteCategory],
    accounts: &[RemoteAccount],
) -> Result<SyncSummary> {
    let mut summary = SyncSummary::default();
    let tx = conn.unchecked_transaction()?;

    for remote_category in categories {
        let id = match get_category_by_name(&tx, &remote_category.name) {
            Ok(local) => {
                summary.categories_linked += 1;
                local.id
            }
            Err(DroverError::UnknownCategory(_)) => {
                summary.categories_added += 1;
                add_category(&tx, &remote_category.name, &remote_category.description)?
            }
            Err(e) => return Err(e),
        };
        set_remote_id(&tx, id, &remote_category.id)?;
    }

    for remote_account in accounts {
        let category = remote_account
            .category_name(categories)
            .unwrap_or_else(|| IMPORTED_CATEGORY.to_string());
        let category_id = ensure_category(&tx, &category)?;
        let status = remote_account
            .status
            .as_deref()
            .and_then(|s| s.parse::<AccountStatus>().ok())
            .unwrap_or(AccountStatus::Inactive);

        match get_account(&tx, &remote_account.username) {
            Ok(local) => {
                tx.execute(
                    "UPDATE accounts SET proxy = ?1, status = ?2, category_id = ?3 WHERE id = ?4",
                    rusqlite::params![
                        remote_account.proxy.as_deref().or(local.proxy.as_deref()),
                        status.as_str(),
                        category_id,
                        local.id
                    ],
                )?;
                summary.accounts_updated += 1;
            }
            Err(DroverError::UnknownAccount(_)) => {
                add_account(
                    &tx,
                    &remote_account.username,
                    remote_account.proxy.as_deref(),
                    status,
                    Some(category_id),
                )?;
                summary.accounts_added += 1;
            }
            Err(e) => return Err(e),
        }
    }

    tx.commit()?;
    tracing::info!(?summary, "merged remote state");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::CategoryRef;
    use crate::cli::accounts::list_accounts;
    use crate::db::test_db;

    fn remote_category(id: &str, name: &str) -> RemoteCategory {
        RemoteCategory {
            id: id.into(),
            name: name.into(),
            description: String::new(),
        }
    }

    fn remote_account(username: &str, category: Option<CategoryRef>, status: &str) -> RemoteAccount {
        RemoteAccount {
            username: username.into(),
            proxy: Some("10.0.0.1:9000:u:p".into()),
            status: Some(status.into()),
            category,
        }
    }

    #[test]
    fn test_merge_links_and_adds_categories() {
        let (_dir, conn) = test_db();
        let summary = merge_remote(
            &conn,
            &[remote_category("r1", "Personal"), remote_category("r2", "Gaming")],
            &[],
        )
        .unwrap();
        assert_eq!(summary.categories_linked, 1);
        assert_eq!(summary.categories_added, 1);
        assert_eq!(
            get_category_by_name(&conn, "Gaming").unwrap().remote_id.as_deref(),
            Some("r2")
        );
        assert_eq!(
            get_category_by_name(&conn, "Personal").unwrap().remote_id.as_deref(),
            Some("r1")
        );
    }

    #[test]
    fn test_merge_accounts() {
        let (_dir, conn) = test_db();
        add_account(&conn, "alice", None, AccountStatus::Inactive, None).unwrap();
        let cats = vec![remote_category("r9", "Business")];
        let summary = merge_remote(
            &conn,
            &cats,
            &[
                remote_account("alice", Some(CategoryRef::Name("r9".into())), "logged-in"),
                remote_account("bob", None, "logged-out"),
            ],
        )
        .unwrap();
        assert_eq!(summary.accounts_updated, 1);
        assert_eq!(summary.accounts_added, 1);

        let accounts = list_accounts(&conn).unwrap();
        let alice = accounts.iter().find(|a| a.username == "alice").unwrap();
        assert_eq!(alice.category.as_deref(), Some("Business"));
        assert_eq!(alice.status, AccountStatus::Active);
        assert_eq!(alice.proxy.as_deref(), Some("10.0.0.1:9000:u:p"));
        let bob = accounts.iter().find(|a| a.username == "bob").unwrap();
        assert_eq!(bob.category.as_deref(), Some(IMPORTED_CATEGORY));
        assert_eq!(bob.status, AccountStatus::Inactive);
    }
}
