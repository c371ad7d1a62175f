pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "opsdesk",
    about = "Opsdesk operator CLI",
    long_about = "Apply migrations, check runtime readiness, and inspect approval routing \
                  for accounting requests.",
    after_help = "Examples:\n  opsdesk migrate\n  opsdesk doctor --json\n  \
                  opsdesk approval-route --amount 3000000"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Validate config, approval policy, DB connectivity, and schema presence")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Resolve the approval track and eligible roles for an amount")]
    ApprovalRoute {
        #[arg(long, help = "Request amount as a decimal, e.g. 3000000 or 1250.50")]
        amount: Option<String>,
        #[arg(long, default_value = "payment", help = "reconciliation | payment | confirmation")]
        request_type: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::ApprovalRoute { amount, request_type } => {
            commands::approval_route::run(&request_type, amount.as_deref())
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
