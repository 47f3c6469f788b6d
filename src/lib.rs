pub mod cli;
pub mod config;
pub mod editor;
pub mod executor;
pub mod git;
pub mod lifecycle;

/// Run the command line interface and return an exit code.
pub fn run_cli() -> i32 {
    cli::run()
}
