// API request/response models (DTOs)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: Some(Meta::now()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            meta: Some(Meta::now()),
        }
    }
}

/// Metadata included in all API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct Meta {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub version: String,
}

impl Meta {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: uuid::Uuid::new_v4().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub uptime_seconds: u64,
}

/// Body for POST /api/v1/listings/{id}/sync
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SyncTriggerRequest {
    /// Validate only; make no marketplace calls.
    #[serde(default)]
    pub dry_run: bool,
}

/// Body for POST /api/v1/listings/bulk-sync
#[derive(Debug, Serialize, Deserialize)]
pub struct BulkSyncRequest {
    pub listing_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}

/// Response for GET /api/v1/listings/{id}/status
#[derive(Debug, Serialize, Deserialize)]
pub struct ListingStatusResponse {
    pub listing_id: i64,
    pub sku: String,
    pub sync_status: String,
    pub remote_listing_id: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub sync_error: Option<String>,
}
