//! Command-line behavior of the websetup binary.

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Writes a config pointing at a fresh database file inside `dir`.
fn write_config(dir: &Path) -> PathBuf {
    let db_path = dir.join("cli.db");
    let config_path = dir.join("config.toml");
    fs::write(
        &config_path,
        format!(
            "[database]\nkind = \"embedded-file\"\nschema = {:?}\n\n[logging]\nlevel = \"warn\"\n",
            db_path.to_string_lossy()
        ),
    )
    .unwrap();
    config_path
}

fn websetup(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("websetup").unwrap();
    cmd.arg("--config").arg(config);
    cmd
}

#[test]
fn writes_print_affected_rows_and_reads_print_json() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    websetup(&config)
        .arg("create table user (id integer primary key, loginName text)")
        .assert()
        .success()
        .stdout("0\n");

    websetup(&config)
        .args(["insert into user (id, loginName) values (?, ?)", "1", "eva"])
        .assert()
        .success()
        .stdout("1\n");

    websetup(&config)
        .args(["select id, loginName from user where loginName=?", "eva"])
        .assert()
        .success()
        .stdout("{\"id\":1,\"loginName\":\"eva\"}\n");

    websetup(&config)
        .args(["update user set loginName=? where loginName=?", "kate", "nobody"])
        .assert()
        .success()
        .stdout("0\n");
}

#[test]
fn sql_errors_exit_with_failure() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    websetup(&config)
        .arg("select * from missing_table")
        .assert()
        .failure()
        .code(1);
}

#[test]
fn missing_config_file_is_reported() {
    let dir = TempDir::new().unwrap();

    websetup(&dir.path().join("absent.toml"))
        .arg("select 1")
        .assert()
        .failure()
        .code(1);
}

#[test]
fn missing_sql_prints_usage() {
    Command::cargo_bin("websetup")
        .unwrap()
        .assert()
        .failure()
        .code(1);
}
