//! Drives one listing through the marketplace publish pipeline and fans out
//! over batches for bulk syncs. Constructed explicitly with its stores and
//! API client; holds no global state.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::database_ops::catalog::CatalogStore;
use crate::database_ops::credentials::CredentialStore;
use crate::database_ops::models::{Listing, SellerBusinessProfile};
use crate::marketplace::api::MarketplaceApi;
use crate::marketplace::error::SyncError;
use crate::marketplace::inventory::InventoryClient;
use crate::marketplace::offer_builder::OfferBuilder;
use crate::marketplace::offer_lifecycle::{OfferLifecycleManager, OfferSnapshot};
use crate::marketplace::policy::{AccountClassification, AccountPolicyResolver};
use crate::marketplace::token::TokenManager;
use crate::marketplace::types::{InventoryLocation, LocationAddress, LocationDetails};

const MAX_TITLE_LEN: usize = 80;
const DEFAULT_LOCATION_KEY: &str = "CROSSLIST_DEFAULT";

/// Bulk-sync backpressure: small fixed batches with a pause in between, so a
/// catalog-wide sync stays inside marketplace rate limits.
const DEFAULT_BATCH_SIZE: usize = 5;
const MAX_BATCH_SIZE: usize = 25;
const INTER_BATCH_PAUSE_MS: u64 = 1500;

/// Terminal states of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Published {
        remote_listing_id: String,
        offer_id: String,
    },
    AlreadySynced {
        remote_listing_id: String,
    },
    DryRunOk,
}

/// Caller-facing flattening of outcome-or-error, serializable for the API
/// and CLI surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub listing_id: i64,
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_listing_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkSyncSummary {
    pub reports: Vec<SyncReport>,
    pub success_count: usize,
    pub error_count: usize,
}

pub struct SyncOrchestrator {
    catalog: Arc<dyn CatalogStore>,
    credentials: Arc<dyn CredentialStore>,
    api: Arc<dyn MarketplaceApi>,
    marketplace_id: String,
}

impl SyncOrchestrator {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        credentials: Arc<dyn CredentialStore>,
        api: Arc<dyn MarketplaceApi>,
        marketplace_id: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            credentials,
            api,
            marketplace_id: marketplace_id.into(),
        }
    }

    /// Sync one listing. Any error marks the listing's sync status as
    /// `error` (best-effort) before propagating.
    pub async fn sync(&self, listing_id: i64, dry_run: bool) -> Result<SyncOutcome, SyncError> {
        match self.run(listing_id, dry_run).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if !matches!(e, SyncError::Store(_)) {
                    if let Err(persist) = self
                        .catalog
                        .record_sync_error(listing_id, &e.to_string())
                        .await
                    {
                        warn!(listing_id, error = %persist, "orchestrator: failed to persist sync error");
                    }
                }
                error!(listing_id, error = %e, "orchestrator: sync failed");
                Err(e)
            }
        }
    }

    async fn run(&self, listing_id: i64, dry_run: bool) -> Result<SyncOutcome, SyncError> {
        let listing = self
            .catalog
            .fetch_listing(listing_id)
            .await?
            .ok_or_else(|| SyncError::Store(anyhow::anyhow!("listing {listing_id} not found")))?;
        let seller_id = listing.seller_id;
        let profile = self
            .catalog
            .fetch_profile(seller_id)
            .await?
            .ok_or_else(|| {
                SyncError::Store(anyhow::anyhow!("seller {seller_id} has no profile"))
            })?;

        // Everything checkable without the network happens before any call.
        let missing = validate(&listing, &profile);
        if !missing.is_empty() {
            return Err(SyncError::ValidationFailed { missing });
        }
        if dry_run {
            info!(listing_id, seller_id, "orchestrator: dry run ok");
            return Ok(SyncOutcome::DryRunOk);
        }

        let token_manager = TokenManager::new(self.api.as_ref(), self.credentials.as_ref());
        let token = token_manager.ensure_valid_token(seller_id).await?;

        let resolver = AccountPolicyResolver::new(self.api.as_ref(), &self.marketplace_id);
        let account = resolver.resolve(&token, &profile).await?;
        if account.ids_changed {
            if let Some(ids) = &account.policy_ids {
                self.catalog.save_policy_ids(seller_id, ids).await?;
            }
        }
        if account.classification == AccountClassification::Individual {
            // Inline terms need concrete shipping settings.
            let missing = validate_inline_terms(&listing, &profile);
            if !missing.is_empty() {
                return Err(SyncError::ValidationFailed { missing });
            }
        }

        // Idempotence check comes before any mutating call, including the
        // inventory upsert.
        let lifecycle = OfferLifecycleManager::new(self.api.as_ref());
        let snapshot = lifecycle.inspect(&token, &listing.sku).await?;
        if let OfferSnapshot::HasPublished {
            offer_id,
            remote_listing_id,
        } = &snapshot
        {
            info!(listing_id, sku = %listing.sku, %remote_listing_id,
                "orchestrator: offer already published; short-circuiting");
            self.catalog
                .record_sync_success(
                    listing_id,
                    &self.marketplace_id,
                    remote_listing_id,
                    Some(offer_id),
                )
                .await?;
            return Ok(SyncOutcome::AlreadySynced {
                remote_listing_id: remote_listing_id.clone(),
            });
        }

        let location_key = self.resolve_location(&token, &profile).await?;

        let builder = OfferBuilder::new(&self.marketplace_id);
        let payload = builder.build(
            &listing,
            &profile,
            account.classification,
            account.policy_ids.as_ref(),
            &location_key,
        );
        let fallback = payload.fulfillment_details.as_ref().map(|f| {
            let rejected = f.primary_service_code().unwrap_or_default().to_string();
            builder.fallback_fulfillment(&listing, &profile, &rejected)
        });

        InventoryClient::new(self.api.as_ref())
            .upsert_item(&token, &listing)
            .await?;
        let published = lifecycle
            .publish_new(&token, &listing.sku, snapshot, payload, fallback)
            .await?;

        self.catalog
            .record_sync_success(
                listing_id,
                &self.marketplace_id,
                &published.remote_listing_id,
                Some(&published.offer_id),
            )
            .await?;
        info!(listing_id, sku = %listing.sku,
            remote_listing_id = %published.remote_listing_id,
            offer_id = %published.offer_id,
            "orchestrator: listing synced");
        Ok(SyncOutcome::Published {
            remote_listing_id: published.remote_listing_id,
            offer_id: published.offer_id,
        })
    }

    /// First existing inventory location wins; sellers with none get a
    /// default created from their profile address.
    async fn resolve_location(
        &self,
        token: &str,
        profile: &SellerBusinessProfile,
    ) -> Result<String, SyncError> {
        let locations = self.api.list_inventory_locations(token).await?;
        if let Some(first) = locations.first() {
            return Ok(first.merchant_location_key.clone());
        }
        info!(
            seller_id = profile.seller_id,
            "orchestrator: no inventory location on file; creating default"
        );
        let location = InventoryLocation {
            merchant_location_key: DEFAULT_LOCATION_KEY.to_string(),
            name: Some("Default ship-from location".to_string()),
            location: Some(LocationDetails {
                address: LocationAddress {
                    country: profile.country.clone(),
                    postal_code: profile.postal_code.clone(),
                },
            }),
        };
        self.api.create_inventory_location(token, &location).await?;
        Ok(DEFAULT_LOCATION_KEY.to_string())
    }

    /// Sync one listing and flatten the result for API/CLI callers.
    pub async fn sync_report(&self, listing_id: i64, dry_run: bool) -> SyncReport {
        match self.sync(listing_id, dry_run).await {
            Ok(SyncOutcome::Published {
                remote_listing_id,
                offer_id,
            }) => SyncReport {
                listing_id,
                status: "success".to_string(),
                message: format!("published as {remote_listing_id}"),
                remote_listing_id: Some(remote_listing_id),
                offer_id: Some(offer_id),
            },
            Ok(SyncOutcome::AlreadySynced { remote_listing_id }) => SyncReport {
                listing_id,
                status: "already_synced".to_string(),
                message: format!("already live as {remote_listing_id}"),
                remote_listing_id: Some(remote_listing_id),
                offer_id: None,
            },
            Ok(SyncOutcome::DryRunOk) => SyncReport {
                listing_id,
                status: "dry_run_success".to_string(),
                message: "listing passed validation".to_string(),
                remote_listing_id: None,
                offer_id: None,
            },
            Err(e) => SyncReport {
                listing_id,
                status: "error".to_string(),
                message: e.to_string(),
                remote_listing_id: None,
                offer_id: None,
            },
        }
    }

    /// Sync many listings with bounded concurrency: fixed-size batches run
    /// concurrently, with a pause between batches. One listing's failure
    /// never aborts the rest.
    pub async fn bulk_sync(
        &self,
        listing_ids: &[i64],
        batch_size: Option<usize>,
    ) -> BulkSyncSummary {
        let batch_size = batch_size
            .unwrap_or(DEFAULT_BATCH_SIZE)
            .clamp(1, MAX_BATCH_SIZE);
        let mut reports = Vec::with_capacity(listing_ids.len());
        let mut batches = listing_ids.chunks(batch_size).peekable();
        while let Some(batch) = batches.next() {
            let futures: Vec<_> = batch
                .iter()
                .map(|&id| self.sync_report(id, false))
                .collect();
            reports.extend(join_all(futures).await);
            if batches.peek().is_some() {
                sleep(Duration::from_millis(INTER_BATCH_PAUSE_MS)).await;
            }
        }
        let error_count = reports.iter().filter(|r| r.status == "error").count();
        let success_count = reports.len() - error_count;
        info!(
            total = reports.len(),
            success_count, error_count, "orchestrator: bulk sync finished"
        );
        BulkSyncSummary {
            reports,
            success_count,
            error_count,
        }
    }
}

/// Local validation, run before any marketplace call.
fn validate(listing: &Listing, profile: &SellerBusinessProfile) -> Vec<String> {
    let mut missing = Vec::new();
    let title = listing.title.trim();
    if title.is_empty() || title.len() > MAX_TITLE_LEN {
        missing.push("title".to_string());
    }
    if listing.price <= bigdecimal::BigDecimal::from(0) {
        missing.push("price".to_string());
    }
    if listing
        .condition
        .as_deref()
        .map(|c| c.trim().is_empty())
        .unwrap_or(true)
    {
        missing.push("condition".to_string());
    }
    if listing.image_urls.is_empty() {
        missing.push("images".to_string());
    }
    // Stored-profile heuristic only: dry runs must stay offline.
    if AccountPolicyResolver::classify_stored(profile) == AccountClassification::Individual {
        missing.extend(validate_inline_terms(listing, profile));
    }
    missing
}

fn validate_inline_terms(listing: &Listing, profile: &SellerBusinessProfile) -> Vec<String> {
    let mut missing = Vec::new();
    if listing.shipping_cost.is_none()
        && profile.domestic_shipping_cost.is_none()
        && !profile.free_shipping
    {
        missing.push("shipping_cost".to_string());
    }
    if listing.handling_days.unwrap_or(profile.handling_days) <= 0 {
        missing.push("handling_time".to_string());
    }
    missing
}
