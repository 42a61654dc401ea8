// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

#![cfg(feature = "tool")]

//! Integration tests for the `modinfo` CLI tool binary.
//!
//! These tests run the actual binary and verify its behavior.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Get the path to the modinfo binary
fn modinfo_binary() -> std::path::PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps
    path.push("modinfo");
    path
}

/// Run the modinfo binary against a database, with CLI arguments
fn run_cli(db_path: &Path, args: &[&str]) -> (String, String, bool) {
    run_cli_with_input(db_path, args, "")
}

/// Run the modinfo binary with piped input
fn run_cli_with_input(db_path: &Path, args: &[&str], input: &str) -> (String, String, bool) {
    let mut child = Command::new(modinfo_binary())
        .arg("--db")
        .arg(db_path)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn modinfo binary");

    {
        let stdin = child.stdin.as_mut().expect("Failed to open stdin");
        stdin
            .write_all(input.as_bytes())
            .expect("Failed to write to stdin");
    }

    let output = child.wait_with_output().expect("Failed to read output");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Create a temporary directory holding a module file
fn temp_dir_with_module(content: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let module = dir.path().join("song.mod");
    std::fs::write(&module, content).expect("Failed to write module");
    (dir, module)
}

// ============================================================================
// CLI Command Tests
// ============================================================================

#[test]
fn test_cli_add_and_resolve() {
    let (dir, module) = temp_dir_with_module(b"123456789");
    let db = dir.path().join("modinfo.db");
    let module = module.to_str().unwrap();

    let (stdout, stderr, success) = run_cli(
        &db,
        &["add", module, "--kind", "song-info", "--title", "Sample", "--author", "Tester"],
    );
    assert!(success, "add failed: {}", stderr);
    assert!(stdout.contains("OK (added bb3d:cbf43926)"), "Unexpected output: {}", stdout);

    let (stdout, stderr, success) = run_cli(&db, &["resolve", module]);
    assert!(success, "resolve failed: {}", stderr);
    assert!(stdout.contains("title: Sample"), "Expected title in output: {}", stdout);
    assert!(stdout.contains("author: Tester"), "Expected author in output: {}", stdout);

    let (stdout, _, success) = run_cli(&db, &["resolve", "--key", "bb3d:cbf43926"]);
    assert!(success);
    assert!(stdout.contains("title: Sample"), "Expected title in output: {}", stdout);
}

#[test]
fn test_cli_add_prompts_for_fields() {
    let (dir, module) = temp_dir_with_module(b"prompted module");
    let db = dir.path().join("modinfo.db");
    let module = module.to_str().unwrap();

    let (stdout, stderr, success) =
        run_cli_with_input(&db, &["add", module], "clock-speed\n1193180\n");
    assert!(success, "add failed: {}", stderr);
    assert!(stdout.contains("OK (added"), "Unexpected output: {}", stdout);

    let (stdout, _, success) = run_cli(&db, &["resolve", module]);
    assert!(success);
    assert!(stdout.contains("kind: clock-speed"), "Unexpected output: {}", stdout);
    assert!(stdout.contains("clock speed: 1193180.00"), "Unexpected output: {}", stdout);
}

#[test]
fn test_cli_add_keeps_prompted_text_verbatim() {
    let (dir, module) = temp_dir_with_module(b"spaced module");
    let db = dir.path().join("modinfo.db");
    let module = module.to_str().unwrap();

    let (_, stderr, success) =
        run_cli_with_input(&db, &["add", module], " song-info \n  Spaced Title  \n Someone\n");
    assert!(success, "add failed: {}", stderr);

    let (stdout, _, success) = run_cli(&db, &["resolve", module]);
    assert!(success);
    assert!(stdout.contains("title:   Spaced Title  \n"), "Unexpected output: {:?}", stdout);
    assert!(stdout.contains("author:  Someone\n"), "Unexpected output: {:?}", stdout);
}

#[test]
fn test_cli_add_rejects_fields_of_other_kinds() {
    let (dir, module) = temp_dir_with_module(b"mismatched module");
    let db = dir.path().join("modinfo.db");
    let module = module.to_str().unwrap();

    let (_, stderr, success) = run_cli(&db, &["add", module, "--kind", "plain", "--title", "X"]);
    assert!(!success);
    assert!(stderr.contains("only apply to song-info"), "Unexpected error: {}", stderr);

    let (_, stderr, success) =
        run_cli(&db, &["add", module, "--kind", "song-info", "--clock", "50"]);
    assert!(!success);
    assert!(stderr.contains("only applies to clock-speed"), "Unexpected error: {}", stderr);

    assert!(!db.exists());
}

#[test]
fn test_cli_lists_non_utf8_titles() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("modinfo.db");

    let mut bytes = modinfo_db::file::FILE_ID.to_vec();
    bytes.extend([0, 0, 0, 1]);
    #[rustfmt::skip]
    bytes.extend([
        1,
        0, 0, 0, 7,
        0x00, 0x02,
        0x00, 0x00, 0x00, 0x02,
        0, 0,
        b'C', b'a', b'f', 0xE9, 0, b'X', 0,
    ]);
    std::fs::write(&db, &bytes).unwrap();

    let (stdout, stderr, success) = run_cli(&db, &["--byte-order", "big", "list"]);
    assert!(success, "list failed: {}", stderr);
    assert!(stdout.contains("title: Caf\u{FFFD}"), "Unexpected output: {}", stdout);
    assert!(stdout.contains("OK (1 records)"), "Unexpected output: {}", stdout);
}

#[test]
fn test_cli_add_duplicate_fails() {
    let (dir, module) = temp_dir_with_module(b"some module");
    let db = dir.path().join("modinfo.db");
    let module = module.to_str().unwrap();

    let (_, stderr, success) = run_cli(&db, &["add", module, "--kind", "plain"]);
    assert!(success, "add failed: {}", stderr);

    let (_, stderr, success) = run_cli(&db, &["add", module, "--kind", "plain"]);
    assert!(!success);
    assert!(stderr.contains("already in the database"), "Unexpected error: {}", stderr);
}

#[test]
fn test_cli_add_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("modinfo.db");
    let missing = dir.path().join("missing.mod");

    let (_, stderr, success) = run_cli(&db, &["add", missing.to_str().unwrap(), "--kind", "plain"]);
    assert!(!success);
    assert!(stderr.contains("can't open"), "Unexpected error: {}", stderr);
    assert!(!db.exists());
}

#[test]
fn test_cli_missing_arguments_fail() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("modinfo.db");

    let (_, _, success) = run_cli(&db, &[]);
    assert!(!success);

    let (_, _, success) = run_cli(&db, &["add"]);
    assert!(!success);

    let (_, _, success) = run_cli(&db, &["resolve"]);
    assert!(!success);

    let (_, _, success) = run_cli(&db, &["frobnicate"]);
    assert!(!success);
}

#[test]
fn test_cli_resolve_unknown() {
    let (dir, module) = temp_dir_with_module(b"unknown module");
    let db = dir.path().join("modinfo.db");

    let (stdout, stderr, success) = run_cli(&db, &["resolve", module.to_str().unwrap()]);
    assert!(success, "resolve failed: {}", stderr);
    assert!(stdout.contains("no information"), "Unexpected output: {}", stdout);
}

#[test]
fn test_cli_list_and_wipe() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("modinfo.db");

    for (name, title) in [("a.mod", "First"), ("b.mod", "Second"), ("c.mod", "Third")] {
        let module = dir.path().join(name);
        std::fs::write(&module, name).unwrap();

        let (_, stderr, success) = run_cli(
            &db,
            &["add", module.to_str().unwrap(), "--kind", "song-info", "--title", title, "--author", "X"],
        );
        assert!(success, "add failed: {}", stderr);
    }

    let (stdout, _, success) = run_cli(&db, &["list"]);
    assert!(success);
    assert!(stdout.contains("OK (3 records)"), "Unexpected output: {}", stdout);
    let first = stdout.find("First").unwrap();
    let third = stdout.find("Third").unwrap();
    assert!(first < third);

    let b = dir.path().join("b.mod");
    let (stdout, stderr, success) = run_cli(&db, &["wipe", b.to_str().unwrap()]);
    assert!(success, "wipe failed: {}", stderr);
    assert!(stdout.contains("OK (wiped"), "Unexpected output: {}", stdout);

    let (_, _, success) = run_cli(&db, &["wipe", b.to_str().unwrap()]);
    assert!(!success);

    let (stdout, _, success) = run_cli(&db, &["list"]);
    assert!(success);
    assert!(stdout.contains("OK (2 records)"), "Unexpected output: {}", stdout);
    assert!(!stdout.contains("Second"), "Unexpected output: {}", stdout);
}

#[test]
fn test_cli_info() {
    let (dir, module) = temp_dir_with_module(b"info module");
    let db = dir.path().join("modinfo.db");

    let (_, _, success) = run_cli(&db, &["add", module.to_str().unwrap(), "--kind", "plain"]);
    assert!(success);

    let (stdout, _, success) = run_cli(&db, &["info"]);
    assert!(success);
    assert!(stdout.contains("Records: 1"), "Unexpected output: {}", stdout);
    assert!(stdout.contains("Slots used: 1 / 65521"), "Unexpected output: {}", stdout);
}

// ============================================================================
// Shell Tests
// ============================================================================

#[test]
fn test_shell_session() {
    let (dir, module) = temp_dir_with_module(b"shell module");
    let db = dir.path().join("modinfo.db");
    let module = module.to_str().unwrap();

    let input = format!(
        "add {module} --kind song-info --title \"Shell Song\" --author Someone\n\
         list --all\n\
         wipe {module}\n\
         list --all\n\
         exit\n"
    );

    let (stdout, stderr, success) = run_cli_with_input(&db, &["shell"], &input);
    assert!(success, "shell failed: {}", stderr);
    assert!(stdout.contains("title: Shell Song"), "Unexpected output: {}", stdout);
    assert!(stdout.contains("OK (0 records, 1 wiped)"), "Unexpected output: {}", stdout);

    let (stdout, _, success) = run_cli(&db, &["list"]);
    assert!(success);
    assert!(stdout.contains("OK (0 records)"), "Unexpected output: {}", stdout);
}

#[test]
fn test_shell_abort_discards_changes() {
    let (dir, module) = temp_dir_with_module(b"aborted module");
    let db = dir.path().join("modinfo.db");
    let module = module.to_str().unwrap();

    let input = format!("add {module} --kind plain\nabort\n");

    let (_, stderr, success) = run_cli_with_input(&db, &["shell"], &input);
    assert!(success, "shell failed: {}", stderr);
    assert!(stderr.contains("discarding unsaved changes"), "Unexpected error: {}", stderr);
    assert!(!db.exists());
}

#[test]
fn test_shell_saves_on_eof() {
    let (dir, module) = temp_dir_with_module(b"eof module");
    let db = dir.path().join("modinfo.db");
    let module = module.to_str().unwrap();

    let input = format!("add {module} --kind plain\n");

    let (_, stderr, success) = run_cli_with_input(&db, &["shell"], &input);
    assert!(success, "shell failed: {}", stderr);

    let (stdout, _, success) = run_cli(&db, &["resolve", module]);
    assert!(success);
    assert!(stdout.contains("kind: plain"), "Unexpected output: {}", stdout);
}
