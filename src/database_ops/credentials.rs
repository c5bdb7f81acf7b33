use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::database_ops::db::Db;

/// One marketplace connection per seller. Token fields are mutated
/// exclusively by the TokenManager.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SellerAccountCredential {
    pub seller_id: i64,
    pub marketplace_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub connected: bool,
    pub updated_at: DateTime<Utc>,
}

/// Persistence seam for seller credentials, so the token manager can be
/// exercised against an in-memory store in tests.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn fetch(&self, seller_id: i64) -> Result<Option<SellerAccountCredential>>;

    /// Persist a rotated token pair and its new expiry.
    async fn store_tokens(
        &self,
        seller_id: i64,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Clear the connection flag so later calls fail fast as not-connected.
    async fn mark_disconnected(&self, seller_id: i64) -> Result<()>;

    /// Upsert a fresh connection (used when a seller links their account).
    async fn connect(
        &self,
        seller_id: i64,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;
}

pub struct PgCredentialStore {
    db: Db,
    marketplace_id: String,
}

impl PgCredentialStore {
    pub fn new(db: Db, marketplace_id: impl Into<String>) -> Self {
        Self {
            db,
            marketplace_id: marketplace_id.into(),
        }
    }
}

#[async_trait::async_trait]
impl CredentialStore for PgCredentialStore {
    async fn fetch(&self, seller_id: i64) -> Result<Option<SellerAccountCredential>> {
        let row = sqlx::query_as::<_, SellerAccountCredential>(
            "SELECT seller_id, marketplace_id, access_token, refresh_token, expires_at, connected, updated_at
             FROM seller_credentials
             WHERE seller_id = $1 AND marketplace_id = $2",
        )
        .bind(seller_id)
        .bind(&self.marketplace_id)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(row)
    }

    async fn store_tokens(
        &self,
        seller_id: i64,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE seller_credentials
             SET access_token = $3, refresh_token = $4, expires_at = $5, updated_at = now()
             WHERE seller_id = $1 AND marketplace_id = $2",
        )
        .bind(seller_id)
        .bind(&self.marketplace_id)
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    async fn mark_disconnected(&self, seller_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE seller_credentials
             SET connected = FALSE, updated_at = now()
             WHERE seller_id = $1 AND marketplace_id = $2",
        )
        .bind(seller_id)
        .bind(&self.marketplace_id)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    async fn connect(
        &self,
        seller_id: i64,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO seller_credentials
                 (seller_id, marketplace_id, access_token, refresh_token, expires_at, connected)
             VALUES ($1, $2, $3, $4, $5, TRUE)
             ON CONFLICT (seller_id, marketplace_id) DO UPDATE
             SET access_token = EXCLUDED.access_token,
                 refresh_token = EXCLUDED.refresh_token,
                 expires_at = EXCLUDED.expires_at,
                 connected = TRUE,
                 updated_at = now()",
        )
        .bind(seller_id)
        .bind(&self.marketplace_id)
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }
}
