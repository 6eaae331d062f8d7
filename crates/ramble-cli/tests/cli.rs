//! CLI command integration tests.
//! Each test uses a temp directory via RAMBLE_DATA_DIR for full isolation.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ramble_cmd(data_dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("ramble").unwrap();
    cmd.env("RAMBLE_DATA_DIR", data_dir.path().join("archive"));
    cmd
}

#[test]
fn stats_fresh_archive() {
    let dir = TempDir::new().unwrap();
    ramble_cmd(&dir)
        .args(["stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tokens:         0"))
        .stdout(predicate::str::contains("order:          3"))
        .stdout(predicate::str::contains("blacklist:      0"));
}

#[test]
fn say_learns_and_echoes_single_line() {
    let dir = TempDir::new().unwrap();

    // A fresh model has nothing to reply with but still learns the message.
    ramble_cmd(&dir)
        .args(["say", "hello world"])
        .assert()
        .success()
        .stdout(predicate::str::contains("..."));

    // With exactly one line learned, the only derivable reply is that line.
    ramble_cmd(&dir)
        .args(["say", "hello world"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello world"));
}

#[test]
fn train_file_then_stats() {
    let dir = TempDir::new().unwrap();

    let input = dir.path().join("corpus.txt");
    std::fs::write(
        &input,
        "the quick brown fox jumps over the lazy dog\n\
         the lazy dog naps in the warm sun\n\
         \n\
         a quick nap suits the fox too\n",
    )
    .unwrap();

    ramble_cmd(&dir)
        .args(["train"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("trained on"))
        .stdout(predicate::str::contains("done. 3 lines"));

    let output = ramble_cmd(&dir).args(["stats"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let tokens: usize = extract_stat_value(&stdout, "tokens:").parse().unwrap();
    assert!(tokens > 0, "token table should be non-empty after train");
}

#[test]
fn train_then_say_replies_from_corpus() {
    let dir = TempDir::new().unwrap();

    let input = dir.path().join("line.txt");
    std::fs::write(&input, "rain falls on the quiet hills\n").unwrap();

    ramble_cmd(&dir).args(["train"]).arg(&input).assert().success();

    ramble_cmd(&dir)
        .args(["say", "what about rain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rain"));
}

#[test]
fn chat_reads_stdin_and_saves() {
    let dir = TempDir::new().unwrap();

    ramble_cmd(&dir)
        .args(["chat"])
        .write_stdin("hello world\n/quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("> "));

    // The session's messages must survive in the archive.
    let output = ramble_cmd(&dir).args(["stats"]).output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    let tokens: usize = extract_stat_value(&stdout, "tokens:").parse().unwrap();
    assert!(tokens > 0, "chat session should have trained the model");
}

#[test]
fn blacklist_add_show_remove() {
    let dir = TempDir::new().unwrap();

    ramble_cmd(&dir)
        .args(["blacklist", "add", "Voldemort"])
        .assert()
        .success()
        .stdout(predicate::str::contains("blacklisted 'voldemort'"));

    ramble_cmd(&dir)
        .args(["blacklist", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("voldemort"));

    ramble_cmd(&dir)
        .args(["blacklist", "remove", "voldemort"])
        .assert()
        .success();

    ramble_cmd(&dir)
        .args(["blacklist", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("voldemort").not());
}

#[test]
fn data_flag_overrides_env() {
    let dir = TempDir::new().unwrap();
    let other = dir.path().join("elsewhere");

    ramble_cmd(&dir)
        .args(["say", "hello world", "--data"])
        .arg(&other)
        .assert()
        .success();

    assert!(other.join("model.json").is_file());
    assert!(!dir.path().join("archive").exists());
}

#[test]
fn missing_required_args() {
    let dir = TempDir::new().unwrap();

    ramble_cmd(&dir)
        .args(["say"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));

    ramble_cmd(&dir)
        .args(["train"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));

    ramble_cmd(&dir)
        .args(["blacklist", "add"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

fn extract_stat_value(output: &str, prefix: &str) -> String {
    output
        .lines()
        .find(|l| l.starts_with(prefix))
        .unwrap_or_else(|| panic!("stat line containing '{prefix}' not found in output:\n{output}"))
        .split_whitespace()
        .last()
        .unwrap()
        .to_string()
}
