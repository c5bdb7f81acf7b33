use anyhow::Result;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let use_prepared = crate::util::env::env_flag("USE_PREPARED", false);
        let mut connect_options = PgConnectOptions::from_str(database_url)?;

        // Ensure TLS is enabled when the DSN asks for it. sqlx with
        // runtime-tokio-rustls handles this via the DSN, but be explicit.
        if database_url.contains("sslmode=require") && !database_url.contains("sslmode=disable") {
            connect_options = connect_options.ssl_mode(PgSslMode::Require);
        }

        if !use_prepared {
            // PgBouncer txn mode safe
            connect_options = connect_options.statement_cache_capacity(0);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await?;
        info!("connected to db");

        // Optional auto-migrate gate (default: OFF) so the service can run
        // against databases managed elsewhere. Enable with AUTO_MIGRATE=1.
        if crate::util::env::env_flag("AUTO_MIGRATE", false) {
            info!("running schema bootstrap (AUTO_MIGRATE=on)");
            Self::ensure_schema(&pool).await?;
        } else {
            info!("AUTO_MIGRATE disabled; skipping schema bootstrap");
        }
        Ok(Self { pool })
    }

    /// Create the tables this crate owns if they do not already exist.
    ///
    /// Uses raw_sql so the bootstrap stays prepared-statement-free and works
    /// behind PgBouncer in transaction mode.
    pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
        Ok(())
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS listings (
    id                BIGSERIAL PRIMARY KEY,
    seller_id         BIGINT NOT NULL,
    sku               TEXT NOT NULL UNIQUE,
    title             TEXT NOT NULL,
    description       TEXT,
    price             NUMERIC(12,2) NOT NULL DEFAULT 0,
    condition         TEXT,
    quantity          INTEGER NOT NULL DEFAULT 1,
    shipping_cost     NUMERIC(12,2),
    handling_days     INTEGER,
    category_id       TEXT,
    image_urls        TEXT[] NOT NULL DEFAULT '{}',
    remote_listing_id TEXT,
    last_synced_at    TIMESTAMPTZ,
    sync_status       TEXT NOT NULL DEFAULT 'unsynced',
    sync_error        TEXT
);

CREATE INDEX IF NOT EXISTS idx_listings_seller ON listings (seller_id);
CREATE INDEX IF NOT EXISTS idx_listings_sync_status ON listings (sync_status);

CREATE TABLE IF NOT EXISTS seller_credentials (
    seller_id      BIGINT NOT NULL,
    marketplace_id TEXT NOT NULL,
    access_token   TEXT NOT NULL,
    refresh_token  TEXT NOT NULL,
    expires_at     TIMESTAMPTZ NOT NULL,
    connected      BOOLEAN NOT NULL DEFAULT TRUE,
    updated_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (seller_id, marketplace_id)
);

CREATE TABLE IF NOT EXISTS seller_profiles (
    seller_id                  BIGINT PRIMARY KEY,
    marketplace_id             TEXT NOT NULL DEFAULT 'EBAY_US',
    handling_days              INTEGER NOT NULL DEFAULT 2,
    domestic_shipping_cost     NUMERIC(12,2),
    preferred_shipping_service TEXT,
    free_shipping              BOOLEAN NOT NULL DEFAULT FALSE,
    returns_accepted           BOOLEAN NOT NULL DEFAULT TRUE,
    return_window_days         INTEGER NOT NULL DEFAULT 30,
    fulfillment_policy_id      TEXT,
    payment_policy_id          TEXT,
    return_policy_id           TEXT,
    country                    TEXT NOT NULL DEFAULT 'US',
    postal_code                TEXT,
    currency                   TEXT NOT NULL DEFAULT 'USD'
);

CREATE TABLE IF NOT EXISTS platform_listings (
    id                BIGSERIAL PRIMARY KEY,
    listing_id        BIGINT NOT NULL REFERENCES listings (id) ON DELETE CASCADE,
    marketplace_id    TEXT NOT NULL,
    remote_listing_id TEXT NOT NULL,
    offer_id          TEXT,
    created_at        TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (listing_id, marketplace_id)
);
"#;
