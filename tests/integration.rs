use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn autolink_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_autolink"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let notes = root.join("notes");
    fs::create_dir_all(notes.join("Templates")).unwrap();
    fs::write(notes.join("Rust.md"), "# Rust\n\nA systems language.").unwrap();
    fs::write(
        notes.join("Cargo Book.md"),
        "# Cargo Book\n\nThe guide to Cargo.",
    )
    .unwrap();
    fs::write(
        notes.join("Journal.md"),
        "Today I read the Cargo Book and wrote some Rust.\n\nMore rust tomorrow.",
    )
    .unwrap();
    fs::write(
        notes.join("Templates/Daily.md"),
        "Template mentioning Rust.",
    )
    .unwrap();

    let config_content = format!(
        r#"[corpus]
root = "{}/notes"
include_globs = ["**/*.md"]

[exclude]
folders = "Templates"
"#,
        root.display()
    );

    let config_path = config_dir.join("autolink.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_autolink(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = autolink_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--progress")
        .arg("off")
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run autolink binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn read_note(tmp: &TempDir, name: &str) -> String {
    fs::read_to_string(tmp.path().join("notes").join(name)).unwrap()
}

#[test]
fn test_index_lists_titles() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_autolink(&config_path, &["index"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Rust"));
    assert!(stdout.contains("Cargo Book"));
    assert!(stdout.contains("Journal"));
    assert!(!stdout.contains("Daily"), "excluded folder leaked: {}", stdout);
}

#[test]
fn test_vault_links_documents() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_autolink(&config_path, &["vault"]);
    assert!(success, "vault failed: stdout={}, stderr={}", stdout, stderr);

    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["processed"], 3);
    assert_eq!(result["errors"], 0);

    assert_eq!(
        read_note(&tmp, "Journal.md"),
        "Today I read the [[Cargo Book]] and wrote some [[Rust]].\n\nMore [[Rust]] tomorrow."
    );
    assert_eq!(
        read_note(&tmp, "Templates/Daily.md"),
        "Template mentioning Rust."
    );
    assert!(tmp.path().join("notes/.autolink/state.json").exists());
}

#[test]
fn test_vault_is_idempotent() {
    let (tmp, config_path) = setup_test_env();

    run_autolink(&config_path, &["vault"]);
    let first = read_note(&tmp, "Journal.md");

    let (stdout, _, success) = run_autolink(&config_path, &["vault"]);
    assert!(success);
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["links_created"], 0);
    assert_eq!(read_note(&tmp, "Journal.md"), first);
}

#[test]
fn test_preview_does_not_write() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_autolink(&config_path, &["preview", "Journal.md"]);
    assert!(success, "preview failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Cargo Book"));
    assert!(stdout.contains("Rust"));
    assert_eq!(
        read_note(&tmp, "Journal.md"),
        "Today I read the Cargo Book and wrote some Rust.\n\nMore rust tomorrow."
    );
}

#[test]
fn test_link_single_document() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_autolink(&config_path, &["link", "Journal.md"]);
    assert!(success);
    assert!(stdout.contains("3 link(s) added"), "link: {}", stdout);

    let (stdout, _, success) = run_autolink(&config_path, &["link", "Cargo Book.md"]);
    assert!(success);
    assert!(stdout.contains("unchanged"));
    assert_eq!(
        read_note(&tmp, "Cargo Book.md"),
        "# Cargo Book\n\nThe guide to Cargo."
    );
}

#[test]
fn test_link_unknown_document_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success) = run_autolink(&config_path, &["link", "Nope.md"]);
    assert!(!success);
}

#[test]
fn test_incremental_then_stats() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_autolink(&config_path, &["incremental"]);
    assert!(success);
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["processed"], 3);
    assert!(read_note(&tmp, "Journal.md").contains("[[Rust]]"));

    let (stdout, _, success) = run_autolink(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Links created:   3"), "stats: {}", stdout);
    assert!(stdout.contains("Rust"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, _, success) = run_autolink(&tmp.path().join("nope.toml"), &["index"]);
    assert!(!success);
}
