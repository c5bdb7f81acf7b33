use anyhow::Result;

use crate::database_ops::db::Db;
use crate::database_ops::models::{Listing, SellerBusinessProfile, SyncStatus};

/// Resolved policy identifiers written back to the seller profile.
/// The resolver touches exactly these three fields and nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyIds {
    pub fulfillment_policy_id: String,
    pub payment_policy_id: String,
    pub return_policy_id: String,
}

/// Read/write seam over the application catalog. The orchestrator only ever
/// goes through this trait; `PgCatalog` is the production implementation and
/// the tests run an in-memory one.
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    async fn fetch_listing(&self, listing_id: i64) -> Result<Option<Listing>>;

    async fn fetch_profile(&self, seller_id: i64) -> Result<Option<SellerBusinessProfile>>;

    async fn save_policy_ids(&self, seller_id: i64, ids: &PolicyIds) -> Result<()>;

    /// Persist a successful run: sync-outcome fields on the listing plus the
    /// platform-listing link row.
    async fn record_sync_success(
        &self,
        listing_id: i64,
        marketplace_id: &str,
        remote_listing_id: &str,
        offer_id: Option<&str>,
    ) -> Result<()>;

    async fn record_sync_error(&self, listing_id: i64, message: &str) -> Result<()>;
}

pub struct PgCatalog {
    db: Db,
}

impl PgCatalog {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl CatalogStore for PgCatalog {
    async fn fetch_listing(&self, listing_id: i64) -> Result<Option<Listing>> {
        let row = sqlx::query_as::<_, Listing>(
            "SELECT id, seller_id, sku, title, description, price, condition, quantity,
                    shipping_cost, handling_days, category_id, image_urls,
                    remote_listing_id, last_synced_at, sync_status, sync_error
             FROM listings WHERE id = $1",
        )
        .bind(listing_id)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(row)
    }

    async fn fetch_profile(&self, seller_id: i64) -> Result<Option<SellerBusinessProfile>> {
        let row = sqlx::query_as::<_, SellerBusinessProfile>(
            "SELECT seller_id, marketplace_id, handling_days, domestic_shipping_cost,
                    preferred_shipping_service, free_shipping, returns_accepted,
                    return_window_days, fulfillment_policy_id, payment_policy_id,
                    return_policy_id, country, postal_code, currency
             FROM seller_profiles WHERE seller_id = $1",
        )
        .bind(seller_id)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(row)
    }

    async fn save_policy_ids(&self, seller_id: i64, ids: &PolicyIds) -> Result<()> {
        sqlx::query(
            "UPDATE seller_profiles
             SET fulfillment_policy_id = $2, payment_policy_id = $3, return_policy_id = $4
             WHERE seller_id = $1",
        )
        .bind(seller_id)
        .bind(&ids.fulfillment_policy_id)
        .bind(&ids.payment_policy_id)
        .bind(&ids.return_policy_id)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    async fn record_sync_success(
        &self,
        listing_id: i64,
        marketplace_id: &str,
        remote_listing_id: &str,
        offer_id: Option<&str>,
    ) -> Result<()> {
        let mut tx = self.db.pool.begin().await?;
        sqlx::query(
            "UPDATE listings
             SET remote_listing_id = $2, last_synced_at = now(),
                 sync_status = $3, sync_error = NULL
             WHERE id = $1",
        )
        .bind(listing_id)
        .bind(remote_listing_id)
        .bind(SyncStatus::Active.as_str())
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO platform_listings (listing_id, marketplace_id, remote_listing_id, offer_id)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (listing_id, marketplace_id) DO UPDATE
             SET remote_listing_id = EXCLUDED.remote_listing_id,
                 offer_id = EXCLUDED.offer_id",
        )
        .bind(listing_id)
        .bind(marketplace_id)
        .bind(remote_listing_id)
        .bind(offer_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn record_sync_error(&self, listing_id: i64, message: &str) -> Result<()> {
        sqlx::query(
            "UPDATE listings
             SET sync_status = $2, sync_error = $3
             WHERE id = $1",
        )
        .bind(listing_id)
        .bind(SyncStatus::Error.as_str())
        .bind(message)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }
}
