//! Integration Test Utilities and Common Code

#![allow(dead_code)]

pub use assert_cmd::prelude::*;
pub use assert_fs::prelude::*;
pub use assert_fs::TempDir;
pub use std::path::Path;
pub use std::process::Command;

/// Build a `Command` for the `repo-surveyor` crate binary with variadic
/// command-line arguments.
///
/// The arguments can be anything that is allowed by `Command::arg`.
#[macro_export]
macro_rules! surveyor {
    ( $( $arg:expr ),* ) => {
        {
            let mut cmd = common::surveyor_cmd();
            $(
                cmd.arg($arg);
            )*
            cmd
        }
    }
}

/// Get the command for the repo-surveyor binary under test.
pub fn surveyor_cmd() -> Command {
    Command::cargo_bin("repo-surveyor").expect("repo-surveyor should be executable")
}

/// Is a usable `git` binary on the PATH? Fixture-building tests skip
/// themselves when there is not.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A scratch Git repository built by shelling out to `git`, with pinned
/// author/committer identity and dates so surveys over it are reproducible.
pub struct RepoFixture {
    pub root: TempDir,
}

impl RepoFixture {
    pub fn new() -> Option<Self> {
        if !git_available() {
            eprintln!("git is not available; skipping test");
            return None;
        }
        let root = TempDir::new().expect("should be able to create tempdir");
        let fixture = RepoFixture { root };
        fixture.git(&["init", "-q"]);
        fixture.git(&["config", "user.name", "Test Author"]);
        fixture.git(&["config", "user.email", "test@example.com"]);
        fixture.git(&["config", "commit.gpgsign", "false"]);
        fixture.git(&["config", "tag.gpgsign", "false"]);
        Some(fixture)
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Run one git command in the fixture, isolated from host configuration.
    pub fn git(&self, args: &[&str]) {
        let output = Command::new("git")
            .current_dir(self.root.path())
            .env("GIT_CONFIG_GLOBAL", "/dev/null")
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_AUTHOR_DATE", "2005-04-07T22:13:13 +0200")
            .env("GIT_COMMITTER_DATE", "2005-04-07T22:13:13 +0200")
            .args(args)
            .output()
            .expect("git should be runnable");
        assert!(
            output.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    pub fn write_file(&self, name: &str, contents: &[u8]) {
        self.root
            .child(name)
            .write_binary(contents)
            .expect("should be able to write fixture file");
    }

    /// Stage everything and commit (empty commits allowed).
    pub fn commit(&self, message: &str) {
        self.git(&["add", "-A"]);
        self.git(&["commit", "-q", "--allow-empty", "-m", message]);
    }

    pub fn rev_parse(&self, spec: &str) -> String {
        let output = Command::new("git")
            .current_dir(self.root.path())
            .args(["rev-parse", spec])
            .output()
            .expect("git should be runnable");
        assert!(output.status.success(), "git rev-parse {spec} failed");
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// Delete one loose object from the store, simulating a partial clone
    /// where that object was never fetched.
    pub fn remove_loose_object(&self, oid: &str) {
        let path = self
            .root
            .path()
            .join(".git/objects")
            .join(&oid[..2])
            .join(&oid[2..]);
        std::fs::remove_file(&path)
            .unwrap_or_else(|e| panic!("loose object {oid} should be removable: {e}"));
    }

    pub fn current_branch(&self) -> String {
        let output = Command::new("git")
            .current_dir(self.root.path())
            .args(["symbolic-ref", "--short", "HEAD"])
            .output()
            .expect("git should be runnable");
        assert!(output.status.success(), "git symbolic-ref failed");
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// Survey this repository with `--json` plus any extra arguments and
    /// parse the report.
    pub fn survey_json(&self, extra_args: &[&str]) -> serde_json::Value {
        let output = surveyor_cmd()
            .arg(self.path())
            .arg("--json")
            .arg("--progress=never")
            .args(extra_args)
            .output()
            .expect("repo-surveyor should be runnable");
        assert!(
            output.status.success(),
            "repo-surveyor failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("report should be valid JSON")
    }

    /// Survey this repository and return raw stdout bytes.
    pub fn survey_raw(&self, extra_args: &[&str]) -> Vec<u8> {
        let output = surveyor_cmd()
            .arg(self.path())
            .arg("--progress=never")
            .args(extra_args)
            .output()
            .expect("repo-surveyor should be runnable");
        assert!(
            output.status.success(),
            "repo-surveyor failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        output.stdout
    }
}
