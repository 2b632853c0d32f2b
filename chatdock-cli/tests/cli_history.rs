use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn chatdock(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_chatdock"))
        .arg("--config-dir")
        .arg(home.join("config"))
        .args(args)
        .env("CHATDOCK__HISTORY__STORAGE_DIR", home.join("storage"))
        .env("CHATDOCK__LOGGING__DIR", home.join("logs"))
        .env_remove("RUST_LOG")
        .env_remove("LOG_FORMAT")
        .output()
        .expect("Failed to run chatdock")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_send_persists_across_runs() {
    let home = TempDir::new().unwrap();

    let output = chatdock(home.path(), &["new"]);
    assert!(output.status.success());
    let id = stdout(&output)
        .split_whitespace()
        .last()
        .unwrap()
        .to_string();
    assert!(id.starts_with("chat-"));

    let output = chatdock(home.path(), &["send", "Where is the onboarding guide?"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Thanks for your message!"));

    let output = chatdock(home.path(), &["list"]);
    let listing = stdout(&output);
    assert!(listing.contains(&id));
    assert!(listing.contains("Where is the onboarding guide?..."));
    assert!(listing.contains("Today"));

    let output = chatdock(home.path(), &["show"]);
    let transcript = stdout(&output);
    assert!(transcript.contains("bot: 👋 Hi! How can I help you today?"));
    assert!(transcript.contains("you: Where is the onboarding guide?"));
}

#[test]
fn test_select_unknown_chat_fails_without_switching() {
    let home = TempDir::new().unwrap();
    chatdock(home.path(), &["send", "first chat"]);

    let output = chatdock(home.path(), &["select", "chat-missing"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr)
        .contains("Not found: chat session chat-missing"));

    let output = chatdock(home.path(), &["show", "chat-missing"]);
    assert!(!output.status.success());

    let output = chatdock(home.path(), &["status"]);
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["active_id"], "default");
    assert_eq!(status["sessions"], 1);
    assert_eq!(status["durable"], true);
}

#[test]
fn test_delete_active_chat_starts_new_one() {
    let home = TempDir::new().unwrap();
    chatdock(home.path(), &["send", "to be removed"]);

    let output = chatdock(home.path(), &["delete", "default", "--yes"]);
    assert!(stdout(&output).contains("Deleted default"));

    let output = chatdock(home.path(), &["status"]);
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["sessions"], 0);
    assert_ne!(status["active_id"], "default");
}

#[test]
fn test_corrupted_history_is_discarded() {
    let home = TempDir::new().unwrap();
    std::fs::create_dir_all(home.path().join("storage")).unwrap();
    std::fs::write(home.path().join("storage").join("chat-history"), "[{oops").unwrap();

    let output = chatdock(home.path(), &["list"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No chat history yet"));
}

#[test]
fn test_json_logs_on_stderr() {
    let home = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_chatdock"))
        .arg("--config-dir")
        .arg(home.path().join("config"))
        .arg("status")
        .env("CHATDOCK__HISTORY__STORAGE_DIR", home.path().join("storage"))
        .env("CHATDOCK__LOGGING__DIR", home.path().join("logs"))
        .env("RUST_LOG", "chatdock_core=info")
        .env("LOG_FORMAT", "json")
        .output()
        .expect("Failed to run chatdock");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr
        .lines()
        .any(|line| line.trim().starts_with('{') && line.contains("Loaded chat history")));
}
