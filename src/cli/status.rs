use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::Row;
use std::str::FromStr;

use crate::util::env as env_util;

#[derive(Debug, Clone, Default)]
pub struct SyncStatusConfig {
    /// Optional override for the Postgres connection string.
    pub database_url: Option<String>,
    /// Override the recent-errors LIMIT (defaults to env SYNC_ERRORS_LIMIT or 20).
    pub recent_errors_limit: Option<i64>,
}

/// Print per-status listing counts and the most recent sync failures.
pub async fn run(cfg: SyncStatusConfig) -> Result<()> {
    env_util::init_env();
    let db_url = if let Some(url) = cfg.database_url.clone() {
        url
    } else {
        env_util::db_url()?
    };
    let mut connect_options = PgConnectOptions::from_str(&db_url)?.statement_cache_capacity(0);

    // Ensure TLS is enabled when DSN contains sslmode=require
    if db_url.contains("sslmode=require") && !db_url.contains("sslmode=disable") {
        connect_options = connect_options.ssl_mode(PgSslMode::Require);
    }

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;

    fn is_undefined_table_error(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("42P01"),
            _ => false,
        }
    }

    let mut out = String::new();
    out.push_str("listing sync status\n");

    let counts = match sqlx::query(
        "SELECT sync_status, COUNT(*) AS n FROM listings GROUP BY sync_status ORDER BY n DESC",
    )
    .persistent(false)
    .fetch_all(&pool)
    .await
    {
        Ok(rows) => rows,
        Err(e) if is_undefined_table_error(&e) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    if counts.is_empty() {
        out.push_str("  (no listings table or no rows)\n");
    }
    for row in &counts {
        let status: String = row.get("sync_status");
        let n: i64 = row.get("n");
        out.push_str(&format!("  {status:<12} {n}\n"));
    }

    let connected: i64 = match sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM seller_credentials WHERE connected",
    )
    .persistent(false)
    .fetch_one(&pool)
    .await
    {
        Ok(val) => val,
        Err(e) if is_undefined_table_error(&e) => 0,
        Err(e) => return Err(e.into()),
    };
    out.push_str(&format!("connected sellers: {connected}\n"));

    let limit = cfg
        .recent_errors_limit
        .unwrap_or_else(|| env_util::env_parse("SYNC_ERRORS_LIMIT", 20i64));
    let errors = match sqlx::query(
        "SELECT id, sku, sync_error, last_synced_at FROM listings \
         WHERE sync_status = 'error' ORDER BY id DESC LIMIT $1",
    )
    .persistent(false)
    .bind(limit)
    .fetch_all(&pool)
    .await
    {
        Ok(rows) => rows,
        Err(e) if is_undefined_table_error(&e) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    if !errors.is_empty() {
        out.push_str(&format!("recent sync errors (limit {limit}):\n"));
        for row in &errors {
            let id: i64 = row.get("id");
            let sku: String = row.get("sku");
            let err: Option<String> = row.get("sync_error");
            let at: Option<DateTime<Utc>> = row.get("last_synced_at");
            out.push_str(&format!(
                "  #{id} {sku} ({}) {}\n",
                at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "never synced".to_string()),
                err.unwrap_or_default()
            ));
        }
    }

    println!("{out}");
    Ok(())
}
