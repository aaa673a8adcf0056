pub mod commands;

use clap::{Parser, Subcommand};
use quotedesk_core::config::{AppConfig, LoadOptions, LogFormat};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "quotedesk",
    about = "Quotedesk operator CLI",
    long_about = "Price, record and report on import quotes: migrations, demo data, config inspection, quoting and reporting.",
    after_help = "Examples:\n  quotedesk migrate\n  quotedesk seed\n  quotedesk price --input quote.json --save\n  quotedesk transition 3 send\n  quotedesk report --window year"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo catalog and quote history into an empty database")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, pricing policy, DB connectivity and schema state")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Price a quote request read from a JSON file")]
    Price {
        #[arg(long, help = "Path to the quote request JSON")]
        input: PathBuf,
        #[arg(long, help = "Persist the priced quote as a draft")]
        save: bool,
    },
    #[command(about = "Transition a quote: send, accept or reject")]
    Transition {
        quote_id: i64,
        action: String,
    },
    #[command(about = "Summarize quote activity over a reporting window")]
    Report {
        #[arg(long, default_value = "month", help = "week | month | year | all")]
        window: String,
    },
    #[command(about = "List catalog products redacted for a role")]
    Products {
        #[arg(long, default_value = "agent", help = "agent | customer")]
        role: String,
        #[arg(long, help = "Case-insensitive name filter")]
        search: Option<String>,
    },
    #[command(about = "List the quotes a role may see")]
    Quotes {
        #[arg(long, default_value = "agent", help = "agent | customer")]
        role: String,
    },
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // stdout carries the command payload; a second init (tests) is ignored.
    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Price { input, save } => commands::price::run(&input, save),
        Command::Transition { quote_id, action } => commands::transition::run(quote_id, &action),
        Command::Report { window } => commands::report::run(&window),
        Command::Products { role, search } => commands::products::run(&role, search),
        Command::Quotes { role } => commands::quotes::run(&role),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
