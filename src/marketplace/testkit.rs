//! Shared test doubles: a scripted marketplace with per-endpoint call
//! counters and in-memory stores, so pipeline behavior (idempotence, call
//! counts, bounded retries) can be asserted without a network or a database.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use crate::database_ops::catalog::{CatalogStore, PolicyIds};
use crate::database_ops::credentials::{CredentialStore, SellerAccountCredential};
use crate::database_ops::models::{Listing, SellerBusinessProfile, SyncStatus};
use crate::marketplace::api::MarketplaceApi;
use crate::marketplace::error::{RefreshError, SyncError};
use crate::marketplace::types::*;

// ---------------------------------------------------------------------------
// Fixtures

pub fn sample_listing(id: i64, seller_id: i64) -> Listing {
    Listing {
        id,
        seller_id,
        sku: format!("LST-{:06}", id),
        title: "Vintage Canon AE-1 35mm Film Camera".to_string(),
        description: Some("Tested and working, light wear on the body.".to_string()),
        price: "129.99".parse::<BigDecimal>().unwrap(),
        condition: Some("used good".to_string()),
        quantity: 1,
        shipping_cost: Some("8.50".parse::<BigDecimal>().unwrap()),
        handling_days: None,
        category_id: Some("625".to_string()),
        image_urls: vec!["https://img.example/ae1-front.jpg".to_string()],
        remote_listing_id: None,
        last_synced_at: None,
        sync_status: SyncStatus::Unsynced.as_str().to_string(),
        sync_error: None,
    }
}

pub fn individual_profile(seller_id: i64) -> SellerBusinessProfile {
    SellerBusinessProfile {
        seller_id,
        marketplace_id: "EBAY_US".to_string(),
        handling_days: 2,
        domestic_shipping_cost: Some("7.00".parse::<BigDecimal>().unwrap()),
        preferred_shipping_service: None,
        free_shipping: false,
        returns_accepted: true,
        return_window_days: 30,
        fulfillment_policy_id: None,
        payment_policy_id: None,
        return_policy_id: None,
        country: "US".to_string(),
        postal_code: Some("55401".to_string()),
        currency: "USD".to_string(),
    }
}

pub fn business_profile(seller_id: i64) -> SellerBusinessProfile {
    SellerBusinessProfile {
        fulfillment_policy_id: Some("61969320011".to_string()),
        payment_policy_id: Some("61969330011".to_string()),
        return_policy_id: Some("61969340011".to_string()),
        ..individual_profile(seller_id)
    }
}

// ---------------------------------------------------------------------------
// Mock marketplace

#[derive(Debug, Clone, Default)]
pub struct CallCounts {
    pub token_refreshes: u32,
    pub inventory_upserts: u32,
    pub offer_queries: u32,
    pub offer_creates: u32,
    pub offer_deletes: u32,
    pub offer_publishes: u32,
    pub policy_lists: u32,
    pub policy_creates: u32,
    pub program_queries: u32,
    pub location_lists: u32,
    pub location_creates: u32,
}

#[derive(Debug, Clone)]
struct MockOffer {
    offer_id: String,
    status: OfferStatus,
    listing_id: Option<String>,
}

#[derive(Default)]
struct MockState {
    calls: CallCounts,
    offers: HashMap<String, Vec<MockOffer>>,
    next_seq: u64,
    programs: Vec<String>,
    programs_fail: bool,
    policies: HashMap<&'static str, Vec<String>>,
    policy_creates_fail: bool,
    refresh_invalid_grant: bool,
    inventory_fail: bool,
    deletes_fail: bool,
    publish_shipping_failures: u32,
    publish_other_fail: bool,
    locations: Vec<InventoryLocation>,
    last_created_service: Option<String>,
}

pub struct MockMarketplace {
    state: Mutex<MockState>,
}

impl MockMarketplace {
    pub const REFRESHED_ACCESS_TOKEN: &'static str = "tok-refreshed";

    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn reject_refresh_invalid_grant(&self) {
        self.state.lock().unwrap().refresh_invalid_grant = true;
    }

    pub fn set_programs(&self, programs: Vec<String>) {
        self.state.lock().unwrap().programs = programs;
    }

    pub fn fail_programs(&self) {
        self.state.lock().unwrap().programs_fail = true;
    }

    pub fn seed_policies(&self, policy_type: PolicyType, ids: &[&str]) {
        self.state
            .lock()
            .unwrap()
            .policies
            .entry(policy_type.label())
            .or_default()
            .extend(ids.iter().map(|s| s.to_string()));
    }

    pub fn fail_policy_creates(&self) {
        self.state.lock().unwrap().policy_creates_fail = true;
    }

    pub fn seed_published_offer(&self, sku: &str, offer_id: &str, listing_id: &str) {
        self.state
            .lock()
            .unwrap()
            .offers
            .entry(sku.to_string())
            .or_default()
            .push(MockOffer {
                offer_id: offer_id.to_string(),
                status: OfferStatus::Published,
                listing_id: Some(listing_id.to_string()),
            });
    }

    pub fn seed_unpublished_offers(&self, sku: &str, count: usize) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..count {
            state.next_seq += 1;
            let offer_id = format!("OFF-STALE-{}", state.next_seq);
            state
                .offers
                .entry(sku.to_string())
                .or_default()
                .push(MockOffer {
                    offer_id,
                    status: OfferStatus::Unpublished,
                    listing_id: None,
                });
        }
    }

    pub fn fail_inventory(&self) {
        self.state.lock().unwrap().inventory_fail = true;
    }

    pub fn fail_deletes(&self) {
        self.state.lock().unwrap().deletes_fail = true;
    }

    pub fn fail_publish_shipping(&self, times: u32) {
        self.state.lock().unwrap().publish_shipping_failures = times;
    }

    pub fn fail_publish_other(&self) {
        self.state.lock().unwrap().publish_other_fail = true;
    }

    pub fn seed_location(&self, key: &str) {
        self.state.lock().unwrap().locations.push(InventoryLocation {
            merchant_location_key: key.to_string(),
            name: None,
            location: None,
        });
    }

    /// (published, unpublished) counts for a SKU.
    pub fn offer_counts(&self, sku: &str) -> (usize, usize) {
        let state = self.state.lock().unwrap();
        let offers = state.offers.get(sku).map(Vec::as_slice).unwrap_or(&[]);
        let published = offers
            .iter()
            .filter(|o| o.status == OfferStatus::Published)
            .count();
        (published, offers.len() - published)
    }

    pub fn last_created_service_code(&self) -> Option<String> {
        self.state.lock().unwrap().last_created_service.clone()
    }
}

#[async_trait::async_trait]
impl MarketplaceApi for MockMarketplace {
    async fn refresh_access_token(&self, _refresh_token: &str) -> Result<TokenGrant, RefreshError> {
        let mut state = self.state.lock().unwrap();
        state.calls.token_refreshes += 1;
        if state.refresh_invalid_grant {
            return Err(RefreshError::Rejected {
                status: 400,
                body: json!({"error": "invalid_grant", "error_description": "refresh token expired"}),
            });
        }
        Ok(TokenGrant {
            access_token: Self::REFRESHED_ACCESS_TOKEN.to_string(),
            refresh_token: None,
            expires_in: 7200,
        })
    }

    async fn upsert_inventory_item(
        &self,
        _token: &str,
        _sku: &str,
        _item: &InventoryItemPayload,
    ) -> Result<(), SyncError> {
        let mut state = self.state.lock().unwrap();
        state.calls.inventory_upserts += 1;
        if state.inventory_fail {
            return Err(SyncError::InventoryRejected {
                status: 400,
                body: json!({"errors": [{"errorId": 25002, "message": "Invalid product data"}]}),
            });
        }
        Ok(())
    }

    async fn offers_for_sku(&self, _token: &str, sku: &str) -> Result<Vec<RemoteOffer>, SyncError> {
        let mut state = self.state.lock().unwrap();
        state.calls.offer_queries += 1;
        let offers = state
            .offers
            .get(sku)
            .map(|offers| {
                offers
                    .iter()
                    .map(|o| RemoteOffer {
                        offer_id: o.offer_id.clone(),
                        sku: sku.to_string(),
                        status: o.status,
                        listing: o.listing_id.clone().map(|listing_id| OfferListingRef {
                            listing_id,
                        }),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(offers)
    }

    async fn create_offer(&self, _token: &str, payload: &OfferPayload) -> Result<String, SyncError> {
        let mut state = self.state.lock().unwrap();
        state.calls.offer_creates += 1;
        state.next_seq += 1;
        let offer_id = format!("OFF-{}", state.next_seq);
        state.last_created_service = payload
            .fulfillment_details
            .as_ref()
            .and_then(|f| f.primary_service_code())
            .map(|s| s.to_string());
        state
            .offers
            .entry(payload.sku.clone())
            .or_default()
            .push(MockOffer {
                offer_id: offer_id.clone(),
                status: OfferStatus::Unpublished,
                listing_id: None,
            });
        Ok(offer_id)
    }

    async fn delete_offer(&self, _token: &str, offer_id: &str) -> Result<(), SyncError> {
        let mut state = self.state.lock().unwrap();
        state.calls.offer_deletes += 1;
        if state.deletes_fail {
            return Err(SyncError::OfferRejected {
                status: 500,
                body: json!({"errors": [{"errorId": 2003, "message": "Internal error"}]}),
            });
        }
        for offers in state.offers.values_mut() {
            offers.retain(|o| o.offer_id != offer_id);
        }
        Ok(())
    }

    async fn publish_offer(
        &self,
        _token: &str,
        offer_id: &str,
    ) -> Result<PublishResponse, SyncError> {
        let mut state = self.state.lock().unwrap();
        state.calls.offer_publishes += 1;
        if state.publish_other_fail {
            return Err(SyncError::PublishRejected {
                status: 400,
                body: json!({"errors": [{"errorId": 25002, "message": "Category is missing"}]}),
            });
        }
        if state.publish_shipping_failures > 0 {
            state.publish_shipping_failures -= 1;
            return Err(SyncError::PublishRejected {
                status: 400,
                body: json!({"errors": [{"errorId": 25007,
                    "message": "The shipping service is not valid for this marketplace"}]}),
            });
        }
        let listing_id = format!("RL-{offer_id}");
        for offers in state.offers.values_mut() {
            if let Some(offer) = offers.iter_mut().find(|o| o.offer_id == offer_id) {
                offer.status = OfferStatus::Published;
                offer.listing_id = Some(listing_id.clone());
            }
        }
        Ok(PublishResponse { listing_id })
    }

    async fn list_policies(
        &self,
        _token: &str,
        policy_type: PolicyType,
    ) -> Result<Vec<PolicyBrief>, SyncError> {
        let mut state = self.state.lock().unwrap();
        state.calls.policy_lists += 1;
        let briefs = state
            .policies
            .get(policy_type.label())
            .map(|ids| {
                ids.iter()
                    .map(|id| PolicyBrief {
                        policy_id: id.clone(),
                        name: None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(briefs)
    }

    async fn create_policy(
        &self,
        _token: &str,
        request: &CreatePolicyRequest,
    ) -> Result<String, SyncError> {
        let mut state = self.state.lock().unwrap();
        state.calls.policy_creates += 1;
        if state.policy_creates_fail {
            return Err(SyncError::PolicyResolutionFailed {
                detail: "HTTP 400: seller not eligible for business policies".to_string(),
            });
        }
        state.next_seq += 1;
        let label = request.policy_type().label();
        let policy_id = format!("POL-{}-{}", label, state.next_seq);
        state
            .policies
            .entry(request.policy_type().label())
            .or_default()
            .push(policy_id.clone());
        Ok(policy_id)
    }

    async fn opted_in_programs(&self, _token: &str) -> Result<Vec<String>, SyncError> {
        let mut state = self.state.lock().unwrap();
        state.calls.program_queries += 1;
        if state.programs_fail {
            return Err(SyncError::PolicyResolutionFailed {
                detail: "HTTP 500: program lookup unavailable".to_string(),
            });
        }
        Ok(state.programs.clone())
    }

    async fn list_inventory_locations(
        &self,
        _token: &str,
    ) -> Result<Vec<InventoryLocation>, SyncError> {
        let mut state = self.state.lock().unwrap();
        state.calls.location_lists += 1;
        Ok(state.locations.clone())
    }

    async fn create_inventory_location(
        &self,
        _token: &str,
        location: &InventoryLocation,
    ) -> Result<(), SyncError> {
        let mut state = self.state.lock().unwrap();
        state.calls.location_creates += 1;
        state.locations.push(location.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory stores

pub struct MemoryCredentials {
    rows: Mutex<HashMap<i64, SellerAccountCredential>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed(&self, seller_id: i64, access: &str, refresh: &str, expires_at: DateTime<Utc>) {
        self.rows.lock().unwrap().insert(
            seller_id,
            SellerAccountCredential {
                seller_id,
                marketplace_id: "EBAY_US".to_string(),
                access_token: access.to_string(),
                refresh_token: refresh.to_string(),
                expires_at,
                connected: true,
                updated_at: Utc::now(),
            },
        );
    }

    /// Seed a credential that will not need a refresh during the test.
    pub fn seed_fresh(&self, seller_id: i64) {
        self.seed(seller_id, "tok-fresh", "refresh-1", Utc::now() + Duration::hours(2));
    }

    pub fn get(&self, seller_id: i64) -> Option<SellerAccountCredential> {
        self.rows.lock().unwrap().get(&seller_id).cloned()
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentials {
    async fn fetch(&self, seller_id: i64) -> Result<Option<SellerAccountCredential>> {
        Ok(self.get(seller_id))
    }

    async fn store_tokens(
        &self,
        seller_id: i64,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(cred) = rows.get_mut(&seller_id) {
            cred.access_token = access_token.to_string();
            cred.refresh_token = refresh_token.to_string();
            cred.expires_at = expires_at;
            cred.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_disconnected(&self, seller_id: i64) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(cred) = rows.get_mut(&seller_id) {
            cred.connected = false;
        }
        Ok(())
    }

    async fn connect(
        &self,
        seller_id: i64,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.seed(seller_id, access_token, refresh_token, expires_at);
        Ok(())
    }
}

#[derive(Default)]
struct MemoryCatalogState {
    listings: HashMap<i64, Listing>,
    profiles: HashMap<i64, SellerBusinessProfile>,
    links: Vec<(i64, String, String, Option<String>)>,
}

pub struct MemoryCatalog {
    state: Mutex<MemoryCatalogState>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryCatalogState::default()),
        }
    }

    pub fn insert_listing(&self, listing: Listing) {
        self.state.lock().unwrap().listings.insert(listing.id, listing);
    }

    pub fn insert_profile(&self, profile: SellerBusinessProfile) {
        self.state
            .lock()
            .unwrap()
            .profiles
            .insert(profile.seller_id, profile);
    }

    pub fn listing(&self, listing_id: i64) -> Option<Listing> {
        self.state.lock().unwrap().listings.get(&listing_id).cloned()
    }

    pub fn saved_policy_ids(&self, seller_id: i64) -> Option<PolicyIds> {
        let state = self.state.lock().unwrap();
        let profile = state.profiles.get(&seller_id)?;
        Some(PolicyIds {
            fulfillment_policy_id: profile.fulfillment_policy_id.clone()?,
            payment_policy_id: profile.payment_policy_id.clone()?,
            return_policy_id: profile.return_policy_id.clone()?,
        })
    }

    pub fn link_count(&self) -> usize {
        self.state.lock().unwrap().links.len()
    }
}

#[async_trait::async_trait]
impl CatalogStore for MemoryCatalog {
    async fn fetch_listing(&self, listing_id: i64) -> Result<Option<Listing>> {
        Ok(self.listing(listing_id))
    }

    async fn fetch_profile(&self, seller_id: i64) -> Result<Option<SellerBusinessProfile>> {
        Ok(self.state.lock().unwrap().profiles.get(&seller_id).cloned())
    }

    async fn save_policy_ids(&self, seller_id: i64, ids: &PolicyIds) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(profile) = state.profiles.get_mut(&seller_id) {
            profile.fulfillment_policy_id = Some(ids.fulfillment_policy_id.clone());
            profile.payment_policy_id = Some(ids.payment_policy_id.clone());
            profile.return_policy_id = Some(ids.return_policy_id.clone());
        }
        Ok(())
    }

    async fn record_sync_success(
        &self,
        listing_id: i64,
        marketplace_id: &str,
        remote_listing_id: &str,
        offer_id: Option<&str>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(listing) = state.listings.get_mut(&listing_id) {
            listing.remote_listing_id = Some(remote_listing_id.to_string());
            listing.last_synced_at = Some(Utc::now());
            listing.sync_status = SyncStatus::Active.as_str().to_string();
            listing.sync_error = None;
        }
        state.links.retain(|(id, mkt, _, _)| {
            !(*id == listing_id && mkt == marketplace_id)
        });
        state.links.push((
            listing_id,
            marketplace_id.to_string(),
            remote_listing_id.to_string(),
            offer_id.map(|s| s.to_string()),
        ));
        Ok(())
    }

    async fn record_sync_error(&self, listing_id: i64, message: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(listing) = state.listings.get_mut(&listing_id) {
            listing.sync_status = SyncStatus::Error.as_str().to_string();
            listing.sync_error = Some(message.to_string());
        }
        Ok(())
    }
}
