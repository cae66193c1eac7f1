//! chartmq - message-driven Helm release orchestrator

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod error;
mod exit_codes;
mod http;
mod logging;

use crate::config::Settings;
use crate::error::Result;

#[derive(Parser)]
#[command(name = "chartmq")]
#[command(version)]
#[command(about = "Message-driven Helm release orchestrator", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: ./chartmq.yaml when present)
    #[arg(short, long, global = true, env = "CHARTMQ_CONFIG")]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Reconcile repositories, then consume broker queues and serve HTTP (default)
    Serve,

    /// Register every stored repository with helm once and exit
    Reconcile,

    /// Encrypt a password read from stdin for the repository store
    Seal,
}

fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            let code = e.exit_code();
            eprintln!("{:?}", miette::Report::new(e));
            code
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    logging::init(&settings.log, cli.verbose)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Seal => commands::seal::run(&settings),
        command => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(async {
                match command {
                    Commands::Reconcile => commands::reconcile::run(&settings).await,
                    _ => commands::serve::run(&settings).await,
                }
            })
        }
    }
}
