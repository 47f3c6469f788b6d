use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{App, AppNotFound, Config};
use crate::executor::{ExecutionError, InstructionRunner};
use crate::git::{GitError, Repository};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    AppNotFound(#[from] AppNotFound),
    #[error("{app} isn't installed at {}, install it first", .dest.display())]
    RepoNotInstalled { app: String, dest: PathBuf },
    #[error("couldn't clone {0}: no url in config")]
    MissingUrl(String),
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error("couldn't write output")]
    Output(#[from] io::Error),
}

/// Result of a successful `check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub app: String,
    pub commits: Vec<String>,
}

impl CheckReport {
    pub fn is_up_to_date(&self) -> bool {
        self.commits.is_empty()
    }

    fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        if self.is_up_to_date() {
            writeln!(out, "{} has no new commits", self.app)
        } else {
            writeln!(out, "{} has new commits", self.app)?;
            for commit in &self.commits {
                writeln!(out, "{commit}")?;
            }
            Ok(())
        }
    }
}

/// Drives install, update and check for configured apps.
///
/// Each operation resolves the app, inspects its destination, synchronizes it
/// with the remote and (for install and update) runs its build instructions.
/// Nothing is retried and the first failure ends the operation.
pub struct Lifecycle<'a, G, R> {
    git: &'a G,
    runner: &'a R,
    config_dir: &'a Path,
}

impl<'a, G: Repository, R: InstructionRunner> Lifecycle<'a, G, R> {
    pub fn new(git: &'a G, runner: &'a R, config_dir: &'a Path) -> Self {
        Self {
            git,
            runner,
            config_dir,
        }
    }

    fn locate<'c>(
        &self,
        config: &'c Config,
        name: &str,
    ) -> Result<(&'c App, PathBuf), LifecycleError> {
        let app = config.resolve(name)?;
        let dest = app.destination(self.config_dir);
        tracing::debug!(app = %app.name, dest = %dest.display(), "resolved app");
        Ok((app, dest))
    }

    fn require_installed(&self, app: &App, dest: &Path) -> Result<(), LifecycleError> {
        if self.git.exists(dest) {
            Ok(())
        } else {
            Err(LifecycleError::RepoNotInstalled {
                app: app.name.clone(),
                dest: dest.to_path_buf(),
            })
        }
    }

    /// Clone the app unless a checkout already exists, then build it.
    pub fn install(
        &self,
        config: &Config,
        name: &str,
        out: &mut dyn Write,
    ) -> Result<(), LifecycleError> {
        let (app, dest) = self.locate(config, name)?;

        if self.git.exists(&dest) {
            writeln!(out, "{} already exists, skipping cloning", dest.display())?;
        } else {
            if app.url.is_empty() {
                return Err(LifecycleError::MissingUrl(app.name.clone()));
            }
            self.git.clone_repo(&app.url, &dest)?;
        }

        self.runner.run(&dest, &app.build)?;
        writeln!(out, "{} installed in {}", app.name, dest.display())?;
        Ok(())
    }

    /// Pull the latest changes into an existing checkout, then rebuild.
    pub fn update(
        &self,
        config: &Config,
        name: &str,
        out: &mut dyn Write,
    ) -> Result<(), LifecycleError> {
        let (app, dest) = self.locate(config, name)?;
        self.require_installed(app, &dest)?;

        self.git.pull(&dest)?;
        self.runner.run(&dest, &app.build)?;
        writeln!(out, "{} updated in {}", app.name, dest.display())?;
        Ok(())
    }

    /// Report upstream commits that are not merged yet. Never touches the
    /// working tree and never builds.
    pub fn check(
        &self,
        config: &Config,
        name: &str,
        out: &mut dyn Write,
    ) -> Result<CheckReport, LifecycleError> {
        let (app, dest) = self.locate(config, name)?;
        self.require_installed(app, &dest)?;

        let report = CheckReport {
            app: app.name.clone(),
            commits: self.git.diff_commits(&dest)?,
        };
        report.write_to(out)?;
        Ok(report)
    }
}
