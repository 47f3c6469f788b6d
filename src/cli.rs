use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, ConfigPaths, load_config};
use crate::editor::open_in_editor;
use crate::executor::ProcessRunner;
use crate::git::Git;
use crate::lifecycle::Lifecycle;

#[derive(Debug, Parser)]
#[command(
    name = "dl",
    version,
    about = "Install, update and check apps built from git repositories"
)]
pub struct Cli {
    /// Directory holding config.yml and default checkouts
    #[arg(long, global = true, env = "DL_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum Commands {
    /// Edit the dl config in $EDITOR
    Edit,
    /// List all apps
    #[command(visible_alias = "ls")]
    List,
    /// Clone an app defined in the config and run its build instructions
    Install {
        /// App name as written in the config
        name: String,
    },
    /// Pull an installed app and rerun its build instructions
    Update {
        /// App name as written in the config
        name: String,
    },
    /// Fetch upstream and print commits not merged yet
    Check {
        /// App name as written in the config
        name: String,
    },
}

/// Parse arguments, run the command and map failures to an exit code.
pub fn run() -> i32 {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dispatch(cli) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{err:#}");
            1
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "dl=debug" } else { "dl=warn" };
    let filter = EnvFilter::try_from_env("DL_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .try_init();
}

fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let paths = ConfigPaths::resolve(cli.config_dir)?;
    paths.ensure()?;

    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Edit => open_in_editor(&paths.file)?,
        Commands::List => {
            for name in load_config(&paths.file)?.names() {
                writeln!(stdout, "{name}")?;
            }
        }
        Commands::Install { name } => {
            let name = require_name(&name)?;
            let (config, git) = prepare(&paths, name)?;
            Lifecycle::new(&git, &ProcessRunner, &paths.dir)
                .install(&config, name, &mut stdout)
                .with_context(|| format!("installing {name}"))?;
        }
        Commands::Update { name } => {
            let name = require_name(&name)?;
            let (config, git) = prepare(&paths, name)?;
            Lifecycle::new(&git, &ProcessRunner, &paths.dir)
                .update(&config, name, &mut stdout)
                .with_context(|| format!("updating {name}"))?;
        }
        Commands::Check { name } => {
            let name = require_name(&name)?;
            let (config, git) = prepare(&paths, name)?;
            Lifecycle::new(&git, &ProcessRunner, &paths.dir)
                .check(&config, name, &mut stdout)
                .with_context(|| format!("checking {name}"))?;
        }
    }

    Ok(())
}

/// Load the config and make sure `name` is in it before looking for git.
fn prepare(paths: &ConfigPaths, name: &str) -> anyhow::Result<(Config, Git)> {
    let config = load_config(&paths.file)?;
    config.resolve(name)?;
    let git = Git::locate()?;
    Ok((config, git))
}

fn require_name(name: &str) -> anyhow::Result<&str> {
    if name.is_empty() {
        bail!("couldn't run command: app name is required");
    }
    Ok(name)
}
