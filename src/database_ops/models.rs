use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Local sync state of a listing. Stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Unsynced,
    Active,
    Ended,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Unsynced => "unsynced",
            SyncStatus::Active => "active",
            SyncStatus::Ended => "ended",
            SyncStatus::Error => "error",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "active" => SyncStatus::Active,
            "ended" => SyncStatus::Ended,
            "error" => SyncStatus::Error,
            _ => SyncStatus::Unsynced,
        }
    }
}

/// A sellable item in the local catalog. The orchestrator mutates only the
/// sync-outcome fields (remote_listing_id, last_synced_at, sync_status,
/// sync_error).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Listing {
    pub id: i64,
    pub seller_id: i64,
    pub sku: String,
    pub title: String,
    pub description: Option<String>,
    pub price: BigDecimal,
    pub condition: Option<String>,
    pub quantity: i32,
    pub shipping_cost: Option<BigDecimal>,
    pub handling_days: Option<i32>,
    pub category_id: Option<String>,
    pub image_urls: Vec<String>,
    pub remote_listing_id: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub sync_status: String,
    pub sync_error: Option<String>,
}

impl Listing {
    pub fn status(&self) -> SyncStatus {
        SyncStatus::parse(&self.sync_status)
    }
}

/// Declared shipping/return/handling defaults for a seller, plus the three
/// marketplace policy identifiers once resolved.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SellerBusinessProfile {
    pub seller_id: i64,
    pub marketplace_id: String,
    pub handling_days: i32,
    pub domestic_shipping_cost: Option<BigDecimal>,
    pub preferred_shipping_service: Option<String>,
    pub free_shipping: bool,
    pub returns_accepted: bool,
    pub return_window_days: i32,
    pub fulfillment_policy_id: Option<String>,
    pub payment_policy_id: Option<String>,
    pub return_policy_id: Option<String>,
    pub country: String,
    pub postal_code: Option<String>,
    pub currency: String,
}

/// Link record between a local listing and its remote identifiers.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlatformListingLink {
    pub id: i64,
    pub listing_id: i64,
    pub marketplace_id: String,
    pub remote_listing_id: String,
    pub offer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
