use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn drover(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("drover").unwrap();
    cmd.env("HOME", home)
        .env("NO_COLOR", "1")
        .env_remove("DROVER_API_URL")
        .env_remove("DROVER_LOG");
    cmd
}

fn setup() -> TempDir {
    let home = tempfile::tempdir().unwrap();
    let data_dir = home.path().join("data");
    drover(home.path())
        .args(["init", "--data-dir"])
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized drover at"))
        .stdout(predicate::str::contains("(local only)"));
    home
}

#[test]
fn init_creates_database_and_status_reports_it() {
    let home = setup();
    assert!(home.path().join("data").join("drover.db").exists());
    assert!(home.path().join(".config/drover/settings.json").exists());

    drover(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Categories:      4"))
        .stdout(predicate::str::contains("Accounts:        0"));
}

#[test]
fn template_prints_required_headers() {
    let home = setup();
    drover(home.path())
        .args(["posts", "template"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("content,time\n"));
}

#[test]
fn schedule_dry_run_reports_bad_rows() {
    let home = setup();
    let csv = home.path().join("posts.csv");
    std::fs::write(
        &csv,
        "content,time\n\"Hello, world\",9:00 AM\nBroken,25:00 PM\n",
    )
    .unwrap();

    drover(home.path())
        .args(["posts", "schedule", "--category", "Personal", "--dry-run"])
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello, world"))
        .stdout(predicate::str::contains("Line 3: Invalid time format"))
        .stdout(predicate::str::contains("Dry run: 1 of 2 rows would be scheduled for Personal."));

    drover(home.path())
        .args(["posts", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello, world").not());
}

#[test]
fn schedule_then_list_posts() {
    let home = setup();
    let csv = home.path().join("posts.csv");
    std::fs::write(&csv, "content,time\nLaunch day,11:59 PM\n").unwrap();

    drover(home.path())
        .args(["posts", "schedule", "--category", "Business", "--random-delay", "5"])
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("Scheduled 1 posts for Business"));

    drover(home.path())
        .args(["posts", "list", "--category", "Business"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Launch day"))
        .stdout(predicate::str::contains("11:59 PM"));
}

#[test]
fn schedule_without_valid_rows_fails() {
    let home = setup();
    let csv = home.path().join("posts.csv");
    std::fs::write(&csv, "content,date\nHi,9:00 AM\n").unwrap();

    drover(home.path())
        .args(["posts", "schedule", "--category", "Personal"])
        .arg(&csv)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Missing required headers: time"))
        .stderr(predicate::str::contains("Error: No valid posts to schedule"));
}

#[test]
fn import_by_file_name_and_reject_repeats() {
    let home = setup();
    let files = home.path().join("files");
    std::fs::create_dir_all(&files).unwrap();
    for name in ["alice.lolanna", "bob.xyz", "noext"] {
        std::fs::write(files.join(name), "").unwrap();
    }
    let paths = ["alice.lolanna", "bob.xyz", "noext"].map(|n| files.join(n));

    drover(home.path())
        .args(["accounts", "import", "--mode", "filename", "--dry-run"])
        .args(&paths)
        .assert()
        .success()
        .stdout(predicate::str::contains("alice"))
        .stdout(predicate::str::contains("No extension in file name: noext"))
        .stdout(predicate::str::contains("Dry run: 2 accounts would be imported"));

    drover(home.path())
        .args(["accounts", "import", "--mode", "filename"])
        .args(&paths)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 imported, 1 failed"));

    drover(home.path())
        .args(["accounts", "list", "--category", "Personal"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice"))
        .stdout(predicate::str::contains("bob").not())
        .stdout(predicate::str::contains("Showing 1-1 of 1"));

    drover(home.path())
        .args(["accounts", "import", "--mode", "filename"])
        .arg(&paths[0])
        .assert()
        .success()
        .stdout(predicate::str::contains("File already imported: alice.lolanna"));
}

#[test]
fn deleting_a_category_moves_accounts_to_imported() {
    let home = setup();
    let file = home.path().join("carol.lol");
    std::fs::write(&file, "").unwrap();
    drover(home.path())
        .args(["accounts", "import"])
        .arg(&file)
        .assert()
        .success();

    drover(home.path())
        .args(["categories", "delete", "Marketing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Moved 1 account to Imported"));

    drover(home.path())
        .args(["accounts", "list", "--category", "Imported"])
        .assert()
        .success()
        .stdout(predicate::str::contains("carol"));

    drover(home.path())
        .args(["categories", "delete", "Imported"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: The Imported category cannot be deleted"));
}

#[test]
fn accounts_list_rejects_out_of_range_page() {
    let home = setup();
    drover(home.path())
        .args(["accounts", "list", "--page", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Page 3 out of range (1-1)"));

    drover(home.path())
        .args(["accounts", "list", "--page-size", "7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Page size must be one of"));
}

#[test]
fn user_crud() {
    let home = setup();
    drover(home.path())
        .args(["users", "add", "--name", "Ada", "--email", "ada@example.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added user 1: Ada"));

    drover(home.path())
        .args(["users", "add", "--name", "Other", "--email", "ada@example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Email already in use"));

    drover(home.path())
        .args(["users", "update", "1", "--name", "Ada L."])
        .assert()
        .success();

    drover(home.path())
        .args(["users", "show", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ada L."));

    drover(home.path())
        .args(["users", "delete", "1"])
        .assert()
        .success();

    drover(home.path())
        .args(["users", "show", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("User not found: id 1"));
}

#[test]
fn sync_needs_an_api_url() {
    let home = setup();
    drover(home.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No API URL configured"));
}
