mod commands;
mod config;
mod openai;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::process;

use crate::commands::{
    cmd_advice, cmd_aggregate, cmd_chat, cmd_import, cmd_key_clear, cmd_key_set, cmd_merge,
    cmd_report, cmd_reset, cmd_show, cmd_status, cmd_window, parse_fields,
};
use crate::config::Config;
use crate::openai::OpenAiClient;
use healthlens_core::merge::{DateColumn, MergeOptions};
use healthlens_core::models::DatasetKind;
use healthlens_core::service::HealthService;
use healthlens_core::summary::DEFAULT_CALORIE_GOAL;
use healthlens_core::window::ADVICE_WINDOW_DAYS;

#[derive(Parser)]
#[command(
    name = "healthlens",
    version,
    about = "Merge, summarize and get advice on your nutrition, measurement and exercise exports"
)]
struct Cli {
    /// Enable debug logging (RUST_LOG is honored too)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a CSV export, replacing the stored dataset
    Import {
        /// Dataset: nutrition, measurement or exercise
        kind: String,
        /// Path to the CSV file
        file: std::path::PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the rows of a stored dataset
    Show {
        /// Dataset: nutrition, measurement or exercise
        kind: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored datasets
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clear one dataset, or everything including cached advice
    Reset {
        /// Dataset to clear (default: all data and advice)
        kind: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show per-day totals of a dataset
    Aggregate {
        /// Dataset: nutrition, measurement or exercise
        kind: String,
        /// Show average daily fat, carbohydrate and protein instead (nutrition only)
        #[arg(long)]
        averages: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Join the datasets on measurement dates
    Merge {
        /// Only days where these fields are present (e.g. "weight,steps")
        #[arg(long)]
        complete: Option<String>,
        /// Nutrition date column: a column name, or "first" for the first column
        #[arg(long, default_value = "Date")]
        nutrition_date: String,
        /// Count usable days for each standard comparison instead
        #[arg(long)]
        groups: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the rows of the most recent distinct days
    Window {
        /// Dataset: nutrition, measurement or exercise
        kind: String,
        /// Number of distinct days
        #[arg(short, long, default_value_t = ADVICE_WINDOW_DAYS)]
        days: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the summary report cards
    Report {
        /// Daily calorie goal
        #[arg(long, default_value_t = DEFAULT_CALORIE_GOAL)]
        goal: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Get nutrition, measurement and exercise advice
    Advice {
        /// Request fresh advice instead of the cached one
        #[arg(long)]
        regenerate: bool,
        /// Only one section: nutrition, weight or activity
        #[arg(short, long)]
        section: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ask questions about one dataset
    Chat {
        /// Dataset: nutrition, measurement or exercise
        kind: String,
        /// Question to ask (omit for an interactive session)
        question: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the stored OpenAI API key
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Store an API key (OPENAI_API_KEY takes precedence)
    Set {
        /// The API key
        key: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove the stored API key
    Clear {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Completion requests block on the runtime, so commands run off the async workers.
    let result = tokio::task::spawn_blocking(move || run(cli))
        .await
        .context("Command panicked")
        .and_then(|r| r);

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let service = HealthService::new(&config.db_path)?;

    match cli.command {
        Commands::Import { kind, file, json } => cmd_import(&service, kind.parse()?, &file, json),
        Commands::Show { kind, json } => cmd_show(&service, kind.parse()?, json),
        Commands::Status { json } => cmd_status(&service, json),
        Commands::Reset { kind, json } => {
            let kind = kind.as_deref().map(str::parse::<DatasetKind>).transpose()?;
            cmd_reset(&service, kind, json)
        }
        Commands::Aggregate { kind, averages, json } => {
            cmd_aggregate(&service, kind.parse()?, averages, json)
        }
        Commands::Merge {
            complete,
            nutrition_date,
            groups,
            json,
        } => {
            let fields = parse_fields(complete.as_deref().unwrap_or_default())?;
            let nutrition_date = if nutrition_date.eq_ignore_ascii_case("first") {
                DateColumn::FirstColumn
            } else {
                DateColumn::Named(nutrition_date)
            };
            let service = service.with_merge_options(MergeOptions { nutrition_date });
            cmd_merge(&service, &fields, groups, json)
        }
        Commands::Window { kind, days, json } => cmd_window(&service, kind.parse()?, days, json),
        Commands::Report { goal, json } => cmd_report(&service.with_calorie_goal(goal), json),
        Commands::Advice {
            regenerate,
            section,
            json,
        } => {
            let provider = OpenAiClient::new(Config::api_key(service.database())?)?;
            cmd_advice(
                &service,
                &provider,
                &Config::model(),
                regenerate,
                section.as_deref(),
                json,
            )
        }
        Commands::Chat {
            kind,
            question,
            json,
        } => {
            let provider = OpenAiClient::new(Config::api_key(service.database())?)?;
            cmd_chat(
                &service,
                &provider,
                &Config::model(),
                kind.parse()?,
                question.as_deref(),
                json,
            )
        }
        Commands::Key { command } => match command {
            KeyCommands::Set { key, json } => cmd_key_set(service.database(), &key, json),
            KeyCommands::Clear { json } => cmd_key_clear(service.database(), json),
        },
    }
}
