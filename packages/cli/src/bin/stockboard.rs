// ABOUTME: Command-line entry point for Stockboard
// ABOUTME: Serves the HTTP API, applies migrations and verifies the ledger

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use colored::*;
use comfy_table::{presets::UTF8_FULL, Table};

use stockboard_cli::{migrate, run_server, verify_ledger, Config};

#[derive(Parser)]
#[command(name = "stockboard")]
#[command(about = "Stockboard - warehouse stock movements and kanban workflow")]
#[command(version)]
struct Cli {
    /// SQLite database file (overrides STOCKBOARD_DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (overrides STOCKBOARD_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create the database and apply migrations
    Migrate,
    /// Check every product's stock level against its ledger
    VerifyLedger {
        /// Print consistent products too
        #[arg(long)]
        all: bool,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                if port == 0 {
                    anyhow::bail!("Port 0 is out of valid range (1-65535)");
                }
                config.port = port;
            }
            println!(
                "{} http://localhost:{}",
                "Starting Stockboard on".green().bold(),
                config.port
            );
            run_server(config).await
        }
        Commands::Migrate => {
            migrate(&config).await?;
            println!("{} {}", "Migrated".green().bold(), config.database_path.display());
            Ok(())
        }
        Commands::VerifyLedger { all } => {
            let results = verify_ledger(&config).await?;

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Product", "Recorded", "Replayed", "Entries", "Status"]);

            let mut drifted = 0;
            for result in &results {
                if !result.consistent {
                    drifted += 1;
                } else if !all {
                    continue;
                }
                table.add_row(vec![
                    result.product_id.clone(),
                    result.recorded.to_string(),
                    result.replayed.to_string(),
                    result.entries.to_string(),
                    if result.consistent { "ok" } else { "DRIFT" }.to_string(),
                ]);
            }

            if drifted > 0 || all {
                println!("{table}");
            }

            if drifted > 0 {
                anyhow::bail!("{} of {} products disagree with their ledger", drifted, results.len());
            }

            println!(
                "{} {} products match their ledger",
                "OK".green().bold(),
                results.len()
            );
            Ok(())
        }
    }
}
