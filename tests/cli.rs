use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

fn write_config(dir: &Path, api_host: &str) -> PathBuf {
    let path = dir.join("config.yaml");
    let contents = format!(
        "api_key: test-key\napi_host: {api_host}\norg_id: acme\nsessions:\n  warehouse:\n    project_id: p-1\n    database_id: db-9\ncache:\n  dir: {}\npoll:\n  interval_ms: 1\n  max_attempts: 5\n",
        dir.join("cache").display()
    );
    fs::write(&path, contents).expect("failed to write config");
    path
}

fn sensiscan(config: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sensiscan"));
    cmd.arg("--config")
        .arg(config)
        .env_remove("SENSISCAN_CONFIG")
        .env_remove("SENSISCAN_ORG_ID")
        .env_remove("SENSISCAN_API_HOST")
        .env_remove("SENSISCAN_CACHE_DIR")
        .env_remove("SENSISCAN_NO_CACHE")
        .env_remove("SENSISCAN_FORMAT")
        .env_remove("RUST_LOG");
    cmd
}

const SUCCESS_BODY: &str = r#"{
    "status": "SUCCESS",
    "results": [
        { "columnName": "email", "level": 2, "reason": "email address", "confidence": 0.97 },
        { "columnName": "city", "level": "中", "confidence": 0.6 },
        { "columnName": "id", "level": 0 }
    ]
}"#;

#[test]
fn status_uses_custom_config_path() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config_path = write_config(temp.path(), "http://localhost:1");

    let assert = sensiscan(&config_path).arg("status").assert().success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(stdout.contains("Organization: acme"));
    assert!(stdout.contains("Sessions: warehouse"));
    assert!(stdout.contains(&config_path.to_string_lossy().to_string()));

    Ok(())
}

#[test]
fn version_prints_package_version() {
    Command::new(assert_cmd::cargo::cargo_bin!("sensiscan"))
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn scan_then_second_scan_and_show_use_cache() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new();
    let submit = server
        .mock("POST", "/api/v1/projects/p-1/classification/jobs")
        .match_header("authorization", "Bearer test-key")
        .with_status(200)
        .with_body(r#"{"jobId":"job-1"}"#)
        .expect(1)
        .create();
    let poll = server
        .mock("GET", "/api/v1/projects/p-1/classification/jobs/job-1")
        .with_status(200)
        .with_body(SUCCESS_BODY)
        .expect(1)
        .create();

    let temp = tempdir()?;
    let config_path = write_config(temp.path(), &server.url());

    sensiscan(&config_path)
        .args(["--format", "json", "scan", "sales", "customers", "--session", "warehouse"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"origin\": \"scanned\""))
        .stdout(predicate::str::contains("\"level\": \"HIGH\""))
        .stdout(predicate::str::contains("\"level\": \"MEDIUM\""))
        .stdout(predicate::str::contains("\"scanId\": \"scan-"));

    // New process: served from the on-disk tier without network calls
    sensiscan(&config_path)
        .args(["--format", "json", "scan", "sales", "customers", "--session", "warehouse"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"origin\": \"cached\""));

    sensiscan(&config_path)
        .args(["show", "sales", "customers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("email"))
        .stdout(predicate::str::contains("HIGH"));

    submit.assert();
    poll.assert();
    assert!(temp.path().join("cache").join("cache.db").exists());

    Ok(())
}

#[test]
fn failed_job_exits_nonzero_with_remote_detail() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new();
    let _submit = server
        .mock("POST", "/api/v1/projects/p-1/classification/jobs")
        .with_status(200)
        .with_body(r#"{"jobId":"job-2"}"#)
        .create();
    let _poll = server
        .mock("GET", "/api/v1/projects/p-1/classification/jobs/job-2")
        .with_status(200)
        .with_body(r#"{"status":"FAILED","errorCode":"E_LOCKED","errorMessage":"table is locked"}"#)
        .create();

    let temp = tempdir()?;
    let config_path = write_config(temp.path(), &server.url());

    sensiscan(&config_path)
        .args(["scan", "sales", "orders", "--session", "warehouse"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Sensitive data scan failed for sales.orders"))
        .stderr(predicate::str::contains("E_LOCKED"));

    sensiscan(&config_path)
        .args(["--format", "json", "show", "sales", "orders"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"data\": null"));

    Ok(())
}

#[test]
fn unknown_session_fails_without_network() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new();
    let submit = server
        .mock("POST", mockito::Matcher::Any)
        .expect(0)
        .create();

    let temp = tempdir()?;
    let config_path = write_config(temp.path(), &server.url());

    sensiscan(&config_path)
        .args(["scan", "sales", "customers", "--session", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Session not found: nope"));

    submit.assert();
    Ok(())
}

#[test]
fn clear_table_reports_invalidation() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new();
    let _submit = server
        .mock("POST", "/api/v1/projects/p-1/classification/jobs")
        .with_status(200)
        .with_body(r#"{"jobId":"job-3"}"#)
        .create();
    let _poll = server
        .mock("GET", "/api/v1/projects/p-1/classification/jobs/job-3")
        .with_status(200)
        .with_body(SUCCESS_BODY)
        .create();

    let temp = tempdir()?;
    let config_path = write_config(temp.path(), &server.url());

    sensiscan(&config_path)
        .args(["scan", "sales", "customers", "--session", "warehouse"])
        .assert()
        .success();

    sensiscan(&config_path)
        .args(["clear", "--database", "sales", "--table", "customers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared sales.customers"));

    // Second clear is a no-op
    sensiscan(&config_path)
        .args(["clear", "--database", "sales", "--table", "customers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing cached for sales.customers"));

    sensiscan(&config_path)
        .args(["show", "sales", "customers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached classification"));

    Ok(())
}

#[test]
fn session_add_writes_private_config() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config_path = temp.path().join("fresh").join("config.yaml");

    sensiscan(&config_path)
        .args([
            "session",
            "add",
            "lake",
            "--project-id",
            "p-7",
            "--database-id",
            "db-7",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added session: lake"));

    let contents = fs::read_to_string(&config_path)?;
    assert!(contents.contains("lake"));
    assert!(contents.contains("p-7"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&config_path)?.permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    Ok(())
}
