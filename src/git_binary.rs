use std::io::Write;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use gix::ObjectId;
use tracing::{debug, debug_span};

#[derive(Debug)]
pub enum GitError {
    IOError(std::io::Error),
    GitError {
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        status: ExitStatus,
    },
}

impl From<std::io::Error> for GitError {
    fn from(err: std::io::Error) -> GitError {
        GitError::IOError(err)
    }
}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitError::IOError(e) => write!(f, "git execution failed: {e}"),
            GitError::GitError {
                stdout,
                stderr,
                status,
            } => write!(
                f,
                "git execution failed\ncode={status}\nstdout=```\n{}```\nstderr=```\n{}```",
                String::from_utf8_lossy(stdout),
                String::from_utf8_lossy(stderr)
            ),
        }
    }
}

impl std::error::Error for GitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GitError::IOError(e) => Some(e),
            GitError::GitError { .. } => None,
        }
    }
}

/// Runs the `git` binary on the PATH, isolated from any system-wide or
/// user-specific configuration.
pub struct Git;

impl Git {
    pub fn new() -> Self {
        Self
    }

    fn git(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.env("GIT_CONFIG_GLOBAL", "/dev/null");
        cmd.env("GIT_CONFIG_NOSYSTEM", "1");
        cmd.env("GIT_CONFIG_SYSTEM", "/dev/null");
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Resolve a symbolic name for each of the given commits with one
    /// `git name-rev` run. The whole batch is written to the child before
    /// any output is read; the answer has one line per input OID, in order.
    pub fn name_revs(&self, git_dir: &Path, oids: &[ObjectId]) -> Result<Vec<String>, GitError> {
        let _span = debug_span!("git_name_rev", "{}", git_dir.display()).entered();
        debug!("Resolving names for {} commits", oids.len());

        // The stdin annotation mode is spelled --annotate-stdin since git 2.36
        // and --stdin before that. A pre-2.36 git can exit before reading its
        // input, so the first failure may be a broken pipe rather than a
        // nonzero status; retry on either.
        match self.run_name_rev(git_dir, oids, "--annotate-stdin") {
            Ok(names) => Ok(names),
            Err(e) => {
                debug!("name-rev --annotate-stdin failed ({e}); retrying with --stdin");
                self.run_name_rev(git_dir, oids, "--stdin")
            }
        }
    }

    fn run_name_rev(
        &self,
        git_dir: &Path,
        oids: &[ObjectId],
        stdin_flag: &str,
    ) -> Result<Vec<String>, GitError> {
        let mut cmd = self.git();
        cmd.arg("--git-dir")
            .arg(git_dir)
            .arg("name-rev")
            .arg("--name-only")
            .arg("--always")
            .arg(stdin_flag);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        debug!("{cmd:#?}");
        let mut child = cmd.spawn()?;
        {
            let mut stdin = child.stdin.take().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "child stdin unavailable")
            })?;
            let mut batch = String::with_capacity(oids.len() * 41);
            for oid in oids {
                batch.push_str(&oid.to_string());
                batch.push('\n');
            }
            stdin.write_all(batch.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(GitError::GitError {
                stdout: output.stdout,
                stderr: output.stderr,
                status: output.status,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|line| line.trim_end().to_string())
            .collect())
    }
}

impl Default for Git {
    /// Equivalent to `Git::new()`
    fn default() -> Self {
        Self::new()
    }
}
