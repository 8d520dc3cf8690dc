use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

fn run_cli(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_reclink"))
        .current_dir(dir)
        .env("HOME", dir.join("home"))
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("command runs")
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    let output = run_cli(dir, args);
    assert!(
        output.status.success(),
        "command failed: args={args:?}\nstdout={}\nstderr={}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json stdout")
}

fn run_error(dir: &Path, args: &[&str]) -> Value {
    let output = run_cli(dir, args);
    assert!(!output.status.success(), "command unexpectedly succeeded: {args:?}");
    serde_json::from_slice(&output.stderr).expect("json stderr")
}

#[test]
fn init_assert_query_and_clear_roundtrip() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path();

    let init = run_json(dir, &["init"]);
    assert_eq!(init["status"], "ok");
    assert!(dir.join(".reclink/links.sqlite").exists());
    assert!(dir.join(".reclink/config.yml").exists());

    let first = run_json(dir, &["assert", "r1", "r2", "--kind", "same", "--status", "inferred"]);
    assert_eq!(first["outcome"], "inserted");
    assert_eq!(first["link"]["kind"], "same");
    assert_eq!(first["link"]["status"], "inferred");

    let human = run_json(dir, &["assert", "r1", "r2", "--kind", "different"]);
    assert_eq!(human["outcome"], "updated");
    assert_eq!(human["link"]["status"], "asserted");

    let stale = run_json(dir, &["assert", "r1", "r2", "--kind", "same", "--status", "inferred"]);
    assert_eq!(stale["outcome"], "kept");
    assert_eq!(stale["link"]["kind"], "different");

    run_json(dir, &["assert", "r3", "r1", "--kind", "maybe-same"]);
    run_json(dir, &["assert", "r4", "r5", "--kind", "same"]);

    let all = run_json(dir, &["links"]);
    assert_eq!(all["count"], 3);

    let limited = run_json(dir, &["links", "--limit", "1"]);
    assert_eq!(limited["count"], 1);

    let future = run_json(dir, &["links", "--since", "2999-01-01T00:00:00Z"]);
    assert_eq!(future["count"], 0);

    let for_r1 = run_json(dir, &["links-for", "r1"]);
    assert_eq!(for_r1["count"], 2);

    let cleared = run_json(dir, &["clear"]);
    assert_eq!(cleared["removed"], 3);
    assert_eq!(run_json(dir, &["links"])["count"], 0);
}

#[test]
fn db_flag_overrides_configured_database() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path();

    run_json(dir, &["--db", "alt.sqlite", "init"]);
    assert!(dir.join("alt.sqlite").exists());
    run_json(dir, &["--db", "alt.sqlite", "assert", "a", "b", "--kind", "same"]);
    assert_eq!(run_json(dir, &["--db", "alt.sqlite", "links"])["count"], 1);
}

#[test]
fn commands_before_init_report_not_initialized() {
    let temp = tempfile::tempdir().expect("tempdir");
    let err = run_error(temp.path(), &["links"]);
    assert_eq!(err["error"]["code"], "not_initialized");
}

#[test]
fn compare_needs_no_database() {
    let temp = tempfile::tempdir().expect("tempdir");
    let result = run_json(temp.path(), &["compare", "kitten", "sitting"]);
    assert_eq!(result["similarity"], 0.5);
    assert_eq!(result["distance"], 3);
    assert_eq!(result["tokenized"], true);
}
