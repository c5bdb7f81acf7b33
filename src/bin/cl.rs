use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};

use crosslist::cli::status::{self, SyncStatusConfig};
use crosslist::database_ops::catalog::PgCatalog;
use crosslist::database_ops::credentials::{CredentialStore, PgCredentialStore};
use crosslist::database_ops::db::Db;
use crosslist::marketplace::api::{MarketplaceClient, MarketplaceConfig};
use crosslist::orchestrator::SyncOrchestrator;
use crosslist::util::env as env_util;

#[derive(Parser, Debug)]
#[command(name = "cl", version, about = "crosslist admin CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Sync one listing to the marketplace
    Sync {
        listing_id: i64,
        /// Validate only; make no marketplace calls
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Sync a batch of listings with bounded concurrency
    BulkSync {
        /// Comma-separated listing ids
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<i64>,
        /// Listings synced concurrently per batch (max 25)
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Print per-status listing counts and recent sync errors
    Status {
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
        /// Override the recent-errors limit (defaults to env/20)
        #[arg(long)]
        recent_errors_limit: Option<i64>,
    },
    /// Store marketplace tokens for a seller (links the account)
    Connect {
        #[arg(long)]
        seller_id: i64,
        #[arg(long)]
        access_token: String,
        #[arg(long)]
        refresh_token: String,
        /// Access token lifetime in seconds
        #[arg(long, default_value_t = 7200)]
        expires_in: i64,
    },
    /// Create the tables this crate owns (idempotent)
    Migrate {
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
}

async fn connect_db(db_url_override: Option<String>) -> Result<Db> {
    let url = match db_url_override {
        Some(url) => url,
        None => env_util::db_url()?,
    };
    let max_connections: u32 = env_util::env_parse("DB_MAX_CONNS", 5u32);
    Db::connect(&url, max_connections).await
}

fn build_orchestrator(db: Db) -> Result<SyncOrchestrator> {
    let config = MarketplaceConfig::from_env()?;
    let client = MarketplaceClient::new(&config)?;
    let marketplace_id = client.marketplace_id().to_string();
    Ok(SyncOrchestrator::new(
        Arc::new(PgCatalog::new(db.clone())),
        Arc::new(PgCredentialStore::new(db, marketplace_id.clone())),
        Arc::new(client),
        marketplace_id,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    crosslist::tracing::init_tracing("info,sqlx=warn")?;
    env_util::init_env();

    let cli = Cli::parse();
    match cli.command {
        Commands::Sync {
            listing_id,
            dry_run,
        } => {
            let db = connect_db(None).await?;
            let orchestrator = build_orchestrator(db)?;
            let report = orchestrator.sync_report(listing_id, dry_run).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.status == "error" {
                std::process::exit(1);
            }
        }
        Commands::BulkSync { ids, batch_size } => {
            let db = connect_db(None).await?;
            let orchestrator = build_orchestrator(db)?;
            let summary = orchestrator.bulk_sync(&ids, batch_size).await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if summary.error_count > 0 {
                std::process::exit(1);
            }
        }
        Commands::Status {
            db_url,
            recent_errors_limit,
        } => {
            status::run(SyncStatusConfig {
                database_url: db_url,
                recent_errors_limit,
            })
            .await?;
        }
        Commands::Connect {
            seller_id,
            access_token,
            refresh_token,
            expires_in,
        } => {
            let db = connect_db(None).await?;
            let config = MarketplaceConfig::from_env()?;
            let store = PgCredentialStore::new(db, config.marketplace_id.clone());
            let expires_at = Utc::now() + Duration::seconds(expires_in);
            store
                .connect(seller_id, &access_token, &refresh_token, expires_at)
                .await
                .context("storing seller credentials")?;
            println!(
                "seller {seller_id} connected to {} (token expires {expires_at})",
                config.marketplace_id
            );
        }
        Commands::Migrate { db_url } => {
            let db = connect_db(db_url).await?;
            Db::ensure_schema(&db.pool).await?;
            println!("schema bootstrap complete");
        }
    }
    Ok(())
}
