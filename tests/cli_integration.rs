//! End-to-end tests of the `pushmail` binary.
//!
//! Every test runs against a throwaway repository with the stdout mailer,
//! so the rendered messages can be checked without a mail transport. The
//! global configuration is pinned to an empty file so the user's own
//! settings never leak in.

use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct TestRepo {
    dir: TempDir,
    global_config: PathBuf,
}

impl TestRepo {
    /// A repository on `main` with two commits.
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let repo_dir = dir.path().join("widgets");
        std::fs::create_dir(&repo_dir).unwrap();

        run_git(&repo_dir, &["init", "-q"]);
        run_git(&repo_dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        run_git(&repo_dir, &["config", "user.email", "test@example.com"]);
        run_git(&repo_dir, &["config", "user.name", "Test User"]);

        let global_config = dir.path().join("global.toml");
        std::fs::write(&global_config, "").unwrap();

        let repo = Self { dir, global_config };
        repo.commit_file("README.md", "# Widgets\n", "Initial commit");
        repo.commit_file("lib.rs", "fn main() {}\n", "Add entry point");
        repo
    }

    fn path(&self) -> PathBuf {
        self.dir.path().join("widgets")
    }

    fn commit_file(&self, path: &str, content: &str, message: &str) {
        std::fs::write(self.path().join(path), content).unwrap();
        run_git(&self.path(), &["add", path]);
        run_git(&self.path(), &["commit", "-q", "-m", message]);
    }

    fn rev_parse(&self, rev: &str) -> String {
        let output = StdCommand::new("git")
            .args(["rev-parse", rev])
            .current_dir(self.path())
            .output()
            .expect("git rev-parse failed");
        String::from_utf8(output.stdout).unwrap().trim().to_string()
    }

    fn write_config(&self, contents: &str) {
        let dir = self.path().join(".git").join("pushmail");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), contents).unwrap();
    }

    fn pushmail(&self) -> Command {
        let mut cmd = Command::cargo_bin("pushmail").unwrap();
        cmd.current_dir(self.path())
            .env("PUSHMAIL_CONFIG", &self.global_config)
            .arg("--pusher")
            .arg("alice");
        cmd
    }
}

fn run_git(dir: &Path, args: &[&str]) {
    let output = StdCommand::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

// =============================================================================
// Input modes
// =============================================================================

#[test]
fn batch_mode_prints_messages() {
    let repo = TestRepo::new();
    let old = repo.rev_parse("HEAD~1");
    let new = repo.rev_parse("HEAD");

    repo.pushmail()
        .args(["--stdout", "--recipients", "dev@example.com"])
        .write_stdin(format!("{} {} refs/heads/main\n", old, new))
        .assert()
        .success()
        .stdout(predicate::str::contains("Subject: [widgets] branch main updated ("))
        .stdout(predicate::str::contains("Subject: [widgets] 01/01: Add entry point"))
        .stdout(predicate::str::contains("To: dev@example.com"))
        .stdout(predicate::str::contains(&"=".repeat(75)))
        .stdout(predicate::str::contains("alice pushed a change to branch main"))
        .stderr(predicate::str::contains("Sending notification emails to: dev@example.com"));
}

#[test]
fn single_mode_resolves_revisions() {
    let repo = TestRepo::new();

    repo.pushmail()
        .args(["--stdout", "--recipients", "dev@example.com"])
        .args(["refs/heads/main", "HEAD~1", "HEAD"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Subject: [widgets] 01/01: Add entry point"));
}

#[test]
fn empty_input_sends_nothing() {
    let repo = TestRepo::new();

    repo.pushmail()
        .args(["--stdout", "--recipients", "dev@example.com"])
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn missing_recipients_fail_before_sending() {
    let repo = TestRepo::new();
    let head = repo.rev_parse("HEAD");

    repo.pushmail()
        .arg("--stdout")
        .write_stdin(format!("{} {} refs/heads/main\n", "0".repeat(40), head))
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("mailinglist"));
}

#[test]
fn repository_config_selects_stdout_mailer() {
    let repo = TestRepo::new();
    repo.write_config(
        "reponame = \"gadgets\"\n\
         mailinglist = [\"list@example.com\"]\n\
         mailer = \"stdout\"\n",
    );

    repo.pushmail()
        .args(["refs/heads/main", "HEAD~1", "HEAD"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Subject: [gadgets] 01/01: Add entry point"))
        .stdout(predicate::str::contains("To: list@example.com"));
}

#[test]
fn unknown_config_key_is_rejected() {
    let repo = TestRepo::new();
    repo.write_config("mailinglist = \"a@example.com\"\nbogus = 1\n");

    repo.pushmail()
        .args(["--stdout", "refs/heads/main", "HEAD~1", "HEAD"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn empty_commit_list_suppresses_revision_emails() {
    let repo = TestRepo::new();
    repo.write_config("refchangelist = \"refs@example.com\"\ncommitlist = []\nannouncelist = []\n");

    repo.pushmail()
        .args(["--stdout", "refs/heads/main", "HEAD~1", "HEAD"])
        .assert()
        .success()
        .stdout(predicate::str::contains("branch main updated"))
        .stdout(predicate::str::contains("01/01").not());
}

// =============================================================================
// Failures and verbosity
// =============================================================================

#[test]
fn malformed_input_fails() {
    let repo = TestRepo::new();

    repo.pushmail()
        .args(["--stdout", "--recipients", "dev@example.com"])
        .write_stdin("this is not an update\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed update"));
}

#[test]
fn outside_a_repository_fails() {
    let dir = TempDir::new().unwrap();

    Command::cargo_bin("pushmail")
        .unwrap()
        .current_dir(dir.path())
        .args(["--stdout", "--recipients", "dev@example.com"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open repository"));
}

#[test]
fn quiet_suppresses_progress() {
    let repo = TestRepo::new();

    repo.pushmail()
        .args(["-q", "--stdout", "--recipients", "dev@example.com"])
        .args(["refs/heads/main", "HEAD~1", "HEAD"])
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}
