use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

const SITE_SYNC_VARS: [&str; 8] = [
    "SITE_SYNC_BUCKET",
    "SITE_SYNC_DISTRIBUTION_ID",
    "SITE_SYNC_KEY_PREFIX",
    "SITE_SYNC_ACL",
    "SITE_SYNC_REGION",
    "SITE_SYNC_ENDPOINT_URL",
    "SITE_SYNC_ACCESS_KEY_ID",
    "SITE_SYNC_SECRET_ACCESS_KEY",
];

/// The binary, run from an empty directory so no `.env` is picked up, with a
/// clean `SITE_SYNC_*` environment.
fn site_sync(cwd: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("site-sync").expect("Binary exists");
    cmd.current_dir(cwd);
    for var in SITE_SYNC_VARS {
        cmd.env_remove(var);
    }
    cmd.env("AWS_EC2_METADATA_DISABLED", "true");
    cmd
}

#[test]
fn help_lists_the_main_options() {
    let cwd = tempdir().unwrap();
    site_sync(cwd.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("SOURCE_DIRECTORY")
                .and(predicate::str::contains("--bucket"))
                .and(predicate::str::contains("--granular-invalidation"))
                .and(predicate::str::contains("--no-check-md5")),
        );
}

#[test]
fn version_is_printed() {
    let cwd = tempdir().unwrap();
    site_sync(cwd.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_source_directory_is_a_usage_error() {
    let cwd = tempdir().unwrap();
    site_sync(cwd.path())
        .args(["--bucket", "www.example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SOURCE_DIRECTORY"));
}

#[test]
fn missing_bucket_fails_before_any_network_call() {
    let cwd = tempdir().unwrap();
    let site = tempdir().unwrap();
    std::fs::write(site.path().join("index.html"), "<h1>home</h1>").unwrap();

    site_sync(cwd.path())
        .arg(site.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("bucket"));
}

#[test]
fn partial_credentials_are_rejected() {
    let cwd = tempdir().unwrap();
    let site = tempdir().unwrap();

    site_sync(cwd.path())
        .arg(site.path())
        .args(["--bucket", "www.example.com"])
        .env("SITE_SYNC_ACCESS_KEY_ID", "AKIAEXAMPLE")
        .assert()
        .failure()
        .stderr(predicate::str::contains("secret_access_key"));
}

#[test]
fn unreadable_source_directory_is_reported() {
    let cwd = tempdir().unwrap();
    let missing = cwd.path().join("no-such-site");

    site_sync(cwd.path())
        .arg(&missing)
        .args(["--bucket", "www.example.com", "--region", "us-east-1", "--quiet"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no-such-site"));
}

#[test]
fn rc_file_in_source_directory_is_applied() {
    let cwd = tempdir().unwrap();
    let site = tempdir().unwrap();
    std::fs::write(
        site.path().join(".site-sync.yaml"),
        "concurrency: 0\n",
    )
    .unwrap();

    // Only the rc file sets an invalid concurrency.
    site_sync(cwd.path())
        .arg(site.path())
        .args(["--bucket", "www.example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("concurrency"));
}
