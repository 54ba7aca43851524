//! haltctl: inspect and drive the database write halt.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use halt_runtime::{commands, logging};

/// haltctl: pause and resume writes on a replicated database
#[derive(Parser, Debug)]
#[command(name = "haltctl")]
#[command(about = "Inspect and hold the write halt lock of a replicated database")]
struct Args {
    /// Enable debug logging (overrides HALT_LOG_LEVEL)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print whether writes are currently halted
    Status {
        /// Database path (defaults to HALT_DATABASE_PATH)
        database: Option<PathBuf>,
    },
    /// Check that the lock file excludes independent handles
    Probe {
        /// Database path (defaults to HALT_DATABASE_PATH)
        database: Option<PathBuf>,
    },
    /// Halt writes until interrupted
    Hold {
        /// Database path (defaults to HALT_DATABASE_PATH)
        database: Option<PathBuf>,

        /// Give up waiting for the halt after this many milliseconds (0 waits forever)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Run a command with writes halted
    Exec {
        /// Database path
        database: PathBuf,

        /// Give up waiting for the halt after this many milliseconds (0 waits forever)
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Program to run
        program: String,

        /// Program arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = logging::init(args.verbose) {
        eprintln!("haltctl: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(args.command).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("haltctl: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<u8> {
    match command {
        Command::Status { database } => {
            let config = commands::resolve_config(database, None)?;
            let state = commands::status(&config)?;
            println!("{}", state);
            Ok(0)
        }
        Command::Probe { database } => {
            let config = commands::resolve_config(database, None)?;
            let capability = commands::probe(&config)?;
            println!("{:?}", capability);
            Ok(0)
        }
        Command::Hold {
            database,
            timeout_ms,
        } => {
            let config = commands::resolve_config(database, timeout_ms)?;
            commands::hold(config, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for ctrl-c; releasing halt");
                }
            })
            .await?;
            info!("Writes resumed");
            Ok(0)
        }
        Command::Exec {
            database,
            timeout_ms,
            program,
            args,
        } => {
            let config = commands::resolve_config(Some(database), timeout_ms)?;
            let code = commands::exec(config, &program, &args)
                .await
                .with_context(|| format!("haltctl exec {}", program))?;
            // Exit codes outside 0..=255 are not representable on Unix.
            Ok(u8::try_from(code).unwrap_or(1))
        }
    }
}
