use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;

use portfolio_analytics::analytics::export::{self, ExportFormat};
use portfolio_analytics::analytics::{local_today, Reporter, Timeframe};
use portfolio_analytics::config::Config;
use portfolio_analytics::storage;

#[derive(Parser)]
#[command(name = "analytics-admin")]
#[command(about = "Portfolio analytics reporting CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print dashboard statistics
    Stats {
        /// 1d, 7d, 30d or 90d
        #[arg(long, default_value = "7d")]
        timeframe: String,
    },
    /// List sessions by most recent activity
    Visitors {
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        offset: Option<i64>,
    },
    /// List recent events
    Events {
        /// Only events of this type
        #[arg(long = "type")]
        event_type: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Dump raw events for a date range
    Export {
        /// json or csv
        #[arg(long, default_value = "json")]
        format: String,
        /// First day, YYYY-MM-DD
        #[arg(long)]
        start: Option<String>,
        /// Last day, YYYY-MM-DD
        #[arg(long)]
        end: Option<String>,
    },
    /// Show the daily rollup for one date
    Day {
        /// Defaults to today
        date: Option<NaiveDate>,
    },
    /// Show the rollup for one session
    Session { session_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage = storage::connect(&config.database)
        .await
        .context("failed to open analytics storage")?;
    let reporter = Reporter::new(storage.clone());
    let today = local_today();

    match cli.command {
        Commands::Stats { timeframe } => {
            let stats = reporter
                .stats(Timeframe::parse(Some(&timeframe)), today)
                .await?;
            print_json(&stats)?;
        }
        Commands::Visitors { limit, offset } => {
            print_json(&reporter.visitors(limit, offset).await?)?;
        }
        Commands::Events { event_type, limit } => {
            print_json(&reporter.events(event_type.as_deref(), limit).await?)?;
        }
        Commands::Export { format, start, end } => {
            let format = ExportFormat::parse(Some(&format))?;
            let range = export::parse_export_range(start.as_deref(), end.as_deref(), today)?;
            let events = reporter.export(range).await?;
            match format {
                ExportFormat::Json => print_json(&events)?,
                ExportFormat::Csv => print!("{}", export::render_csv(&events)),
            }
        }
        Commands::Day { date } => {
            let date = date.unwrap_or(today);
            match storage.daily_aggregate(date).await? {
                Some(day) => print_json(&day)?,
                None => println!("No events recorded on {}", date),
            }
        }
        Commands::Session { session_id } => match storage.session(&session_id).await? {
            Some(session) => print_json(&session)?,
            None => println!("⚠ Session '{}' not found", session_id),
        },
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
