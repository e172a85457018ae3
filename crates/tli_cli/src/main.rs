//! `tli` command-line entry point.
//!
//! # Responsibility
//! - Parse arguments and dispatch to `init`, `log` and `todo`.
//! - Resolve per-user paths and bootstrap logging before any command runs.
//! - Map fatal errors to a diagnostic and a non-zero exit status.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tli_core::{init_logging, AppPaths, LogSettings};

/// A Things CLI for Linux.
///
/// Sends items to the Things inbox by email and keeps a local log of every
/// item so nothing is lost when delivery fails. Long items are split so
/// that Things does not silently truncate them.
#[derive(Debug, Parser)]
#[command(name = "tli", version = tli_core::core_version())]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Initialize tli settings interactively.
    Init,
    /// Print the most recent items (all when omitted or 0).
    Log {
        #[arg(value_name = "NUMBER", default_value_t = 0)]
        number: usize,
    },
    /// Create a todo and send it to the Things inbox.
    Todo {
        #[arg(value_name = "TITLE", required = true, num_args = 1..)]
        title: Vec<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("tli: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let paths = AppPaths::from_home_dir()?;
    let logging =
        LogSettings::from_env(&paths.log_dir).and_then(|settings| init_logging(&settings));
    if let Err(err) = &logging {
        eprintln!("tli: logging disabled: {err}");
    }

    match cli.command {
        Command::Init => commands::init(&paths),
        Command::Log { number } => commands::log(&paths, number),
        Command::Todo { title } => {
            // Without a logger, retry warnings never reach stderr.
            commands::todo(&paths, &title.join(" "), logging.is_err()).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn todo_joins_title_words() {
        let cli = Cli::try_parse_from(["tli", "todo", "Buy", "milk,", "eggs"]).unwrap();
        match cli.command {
            Command::Todo { title } => assert_eq!(title.join(" "), "Buy milk, eggs"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn todo_requires_a_title() {
        assert!(Cli::try_parse_from(["tli", "todo"]).is_err());
    }

    #[test]
    fn log_defaults_to_all_and_rejects_non_numbers() {
        let cli = Cli::try_parse_from(["tli", "log"]).unwrap();
        assert!(matches!(cli.command, Command::Log { number: 0 }));
        let cli = Cli::try_parse_from(["tli", "log", "3"]).unwrap();
        assert!(matches!(cli.command, Command::Log { number: 3 }));
        assert!(Cli::try_parse_from(["tli", "log", "three"]).is_err());
    }
}
