//! End-to-end runs of the `lockstep` binary against the in-memory backend.

use std::process::Command;

fn lockstep(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_lockstep"))
        .args(args)
        .env("RUST_LOG", "debug")
        .env_remove("LOCKSTEP_BACKEND")
        .output()
        .expect("failed to run lockstep")
}

#[test]
fn stdout_carries_only_the_document_and_count() {
    for format in ["pretty", "json"] {
        let output = lockstep(&["--to", "5", "--log-format", format]);
        assert_eq!(output.status.code(), Some(0), "log format {format}");

        let stdout = String::from_utf8(output.stdout).unwrap();
        let lines: Vec<&str> = stdout.lines().collect();
        assert_eq!(lines.len(), 2, "unexpected stdout: {stdout}");

        let document: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(document["data"].as_object().map(|data| data.len()), Some(5));
        assert_eq!(lines[1], "entries: 5");

        // logs still go out, on stderr
        assert!(!output.stderr.is_empty());
    }
}

#[test]
fn inverted_range_exits_with_fatal_code() {
    let output = lockstep(&["--from", "9", "--to", "3"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}
