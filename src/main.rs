use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use conflict_etl::loader::{PgSink, TableRef};
use conflict_etl::record::Record;
use conflict_etl::settings::{self, KoboSettings, PgSettings};
use conflict_etl::{pipeline, transform::ParseOutcome};

#[derive(Parser)]
#[command(
    name = "conflict_etl",
    about = "Load the KoboToolbox conflict-event export into Postgres"
)]
struct Cli {
    /// dotenv file to read credentials from (default: ./.env if present)
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the export and replace the target table (default)
    Run,
    /// Fetch and parse only; nothing is written to Postgres
    Preview {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
        /// Print every parsed record as a JSON line instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print the statements that reset the target table
    Schema,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    settings::load_dotenv(cli.env_file.as_deref())
        .with_context(|| format!("Failed to read env file {:?}", cli.env_file))?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let kobo: KoboSettings = settings::from_env()?;
            let pg: PgSettings = settings::from_env()?;
            info!(?kobo, ?pg, "Starting conflict data load");

            let source = kobo.source();
            let mut sink = PgSink::new(pg.connect_options(), TableRef::default());
            let table = sink.table().to_string();
            let summary = pipeline::run(&source, &mut sink)
                .await
                .with_context(|| format!("Load into {} failed", table))?;
            info!(
                bytes = summary.fetched_bytes,
                records = summary.records,
                skipped = summary.skipped,
                inserted = summary.inserted,
                "Run complete"
            );
        }
        Commands::Preview { limit, json } => {
            let kobo: KoboSettings = settings::from_env()?;
            let outcome = pipeline::preview(&kobo.source()).await?;
            if json {
                for record in &outcome.records {
                    println!("{}", serde_json::to_string(record)?);
                }
            } else {
                print_table(&outcome, limit);
            }
        }
        Commands::Schema => {
            for (_, sql) in TableRef::default().reset_statements() {
                println!("{};\n", sql);
            }
            println!("{};", TableRef::default().insert_sql());
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }
    Ok(())
}

fn print_table(outcome: &ParseOutcome, limit: usize) {
    if outcome.records.is_empty() {
        println!("No records parsed ({} rows skipped).", outcome.skipped);
        return;
    }

    println!(
        "{:>3} | {:<10} | {:<10} | {:<16} | {:<14} | {:>5} | {:>5} | {:>5} | {:>5}",
        "#", "Date", "Country", "Event", "Oblast", "Cas", "Inj", "Cap", "Total"
    );
    println!("{}", "-".repeat(96));

    for (i, r) in outcome.records.iter().take(limit).enumerate() {
        println!(
            "{:>3} | {:<10} | {:<10} | {:<16} | {:<14} | {:>5} | {:>5} | {:>5} | {:>5}",
            i + 1,
            r.entry_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
            cell(&r.country, 10),
            cell(&r.event, 16),
            cell(&r.oblast, 14),
            r.casualties,
            r.injured,
            r.captured,
            r.total_soldiers_casualties,
        );
    }

    let total: i64 = outcome
        .records
        .iter()
        .map(|r: &Record| i64::from(r.total_soldiers_casualties))
        .sum();
    println!(
        "\n{} records | {} skipped | {} soldier casualties",
        outcome.records.len(),
        outcome.skipped,
        total
    );
}

/// Fit an optional text field into a table column of `width` chars.
fn cell(value: &Option<String>, width: usize) -> String {
    match value.as_deref() {
        None => "-".into(),
        Some(s) if s.chars().count() <= width => s.to_string(),
        Some(s) => {
            let head: String = s.chars().take(width.saturating_sub(3)).collect();
            head + "..."
        }
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
