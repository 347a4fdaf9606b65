pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "leadflow",
    about = "Leadflow operator CLI",
    long_about = "Operate Leadflow migrations, config inspection, readiness checks, campaigns, and funnel stats.",
    after_help = "Examples:\n  leadflow doctor --json\n  leadflow config\n  leadflow campaign --phone 5547999990000 --name \"Maria Souza\"\n  leadflow stats"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect effective configuration values with secrets redacted")]
    Config,
    #[command(about = "Validate config, credentials, and database connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Open the funnel for one lead with the feedback question")]
    Campaign {
        #[arg(long, help = "Lead phone number (digits are extracted)")]
        phone: String,
        #[arg(long, help = "Lead display name")]
        name: String,
        #[arg(long, help = "Seminar topic mentioned in the opening message")]
        topic: Option<String>,
    },
    #[command(about = "Print funnel conversion totals")]
    Stats,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Campaign { phone, name, topic } => {
            commands::campaign::run(&phone, &name, topic.as_deref())
        }
        Command::Stats => commands::stats::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
