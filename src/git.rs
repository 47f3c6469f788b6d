use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use thiserror::Error;
use which::which;

/// Checkout inspection and synchronization against a remote.
pub trait Repository {
    /// Whether `path` holds a usable checkout. Every failure reads as `false`.
    fn exists(&self, path: &Path) -> bool;
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError>;
    fn pull(&self, dest: &Path) -> Result<(), GitError>;
    /// Upstream commits not yet merged into HEAD, newest first.
    fn diff_commits(&self, dest: &Path) -> Result<Vec<String>, GitError>;
}

#[derive(Debug, Error)]
pub enum GitCommandError {
    #[error("couldn't launch git")]
    Spawn(#[from] io::Error),
    #[error("git exited with {}{}", describe_code(.code), stderr_suffix(.stderr))]
    Exit { code: Option<i32>, stderr: String },
}

#[derive(Debug, Error)]
pub enum GitError {
    #[error("couldn't locate git executable")]
    NotFound(#[from] which::Error),
    #[error("couldn't clone {url} into {}", .dest.display())]
    Clone {
        url: String,
        dest: PathBuf,
        #[source]
        source: GitCommandError,
    },
    #[error("couldn't pull changes in {}", .dest.display())]
    Pull {
        dest: PathBuf,
        #[source]
        source: GitCommandError,
    },
    #[error("couldn't fetch updates in {}", .dest.display())]
    Fetch {
        dest: PathBuf,
        #[source]
        source: GitCommandError,
    },
    #[error("couldn't list new commits in {}", .dest.display())]
    Log {
        dest: PathBuf,
        #[source]
        source: GitCommandError,
    },
}

pub(crate) fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Git's stderr folded onto one line.
fn stderr_suffix(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        String::new()
    } else {
        format!(": {}", lines.join("; "))
    }
}

/// The `git` command line tool.
#[derive(Debug, Clone)]
pub struct Git {
    program: PathBuf,
    envs: Vec<(OsString, OsString)>,
}

impl Git {
    /// Find `git` on `PATH`.
    pub fn locate() -> Result<Self, GitError> {
        Ok(Self::with_program(which("git")?))
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            envs: Vec::new(),
        }
    }

    /// Set an environment variable on every git invocation.
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    fn command(&self, dir: Option<&Path>, args: &[&str]) -> Command {
        tracing::debug!(program = %self.program.display(), ?dir, ?args, "running git");
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        cmd.envs(self.envs.iter().map(|(k, v)| (k, v)));
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn capture(&self, dir: &Path, args: &[&str]) -> Result<Output, GitCommandError> {
        let output = self.command(Some(dir), args).stdin(Stdio::null()).output()?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(GitCommandError::Exit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

impl Repository for Git {
    fn exists(&self, path: &Path) -> bool {
        if !path.exists() {
            return false;
        }

        match self.capture(path, &["status"]) {
            Ok(_) => true,
            Err(GitCommandError::Exit { code, stderr }) => {
                tracing::debug!(
                    path = %path.display(),
                    ?code,
                    stderr = %stderr.trim(),
                    "git status failed, treating as not installed"
                );
                false
            }
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "git status could not run");
                false
            }
        }
    }

    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        let dest_arg = dest.to_string_lossy();
        let wrap = |source: GitCommandError| GitError::Clone {
            url: url.to_string(),
            dest: dest.to_path_buf(),
            source,
        };

        // Progress goes straight to the terminal.
        let status = self
            .command(None, &["clone", url, &*dest_arg])
            .status()
            .map_err(|err| wrap(err.into()))?;

        if !status.success() {
            return Err(wrap(GitCommandError::Exit {
                code: status.code(),
                stderr: String::new(),
            }));
        }
        Ok(())
    }

    fn pull(&self, dest: &Path) -> Result<(), GitError> {
        self.capture(dest, &["pull"])
            .map(|_| ())
            .map_err(|source| GitError::Pull {
                dest: dest.to_path_buf(),
                source,
            })
    }

    fn diff_commits(&self, dest: &Path) -> Result<Vec<String>, GitError> {
        self.capture(dest, &["fetch", "--all"])
            .map_err(|source| GitError::Fetch {
                dest: dest.to_path_buf(),
                source,
            })?;

        let output = self
            .capture(dest, &["log", "HEAD..origin", "--oneline"])
            .map_err(|source| GitError::Log {
                dest: dest.to_path_buf(),
                source,
            })?;

        Ok(commit_lines(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Split `git log --oneline` output into entries, dropping trailing blank lines.
pub fn commit_lines(stdout: &str) -> Vec<String> {
    let mut lines: Vec<String> = stdout
        .split('\n')
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}
