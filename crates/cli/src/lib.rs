pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use expensey_core::config::LoadOptions;

#[derive(Debug, Parser)]
#[command(
    name = "expensey",
    about = "Expensey operator CLI",
    long_about = "Apply database migrations, inspect effective configuration, and preview approval links.",
    after_help = "Examples:\n  expensey migrate\n  expensey config\n  expensey links 42"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Read configuration from this file (must exist)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Print the approve and reject links an approver would receive for an expense")]
    Links {
        #[arg(help = "Expense id")]
        id: i64,
    },
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        match &self.config {
            Some(path) => LoadOptions {
                config_path: Some(path.clone()),
                require_file: true,
                ..LoadOptions::default()
            },
            None => LoadOptions::default(),
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run_with(options),
        Command::Config => commands::config::run_with(options),
        Command::Links { id } => commands::links::run_with(options, id),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
