use tracing::{info, warn};

use crate::marketplace::api::MarketplaceApi;
use crate::marketplace::error::SyncError;
use crate::marketplace::types::{FulfillmentDetails, OfferPayload};

/// What a fresh offer query found for a SKU at run start.
#[derive(Debug, Clone)]
pub enum OfferSnapshot {
    NoOffer,
    HasPublished {
        offer_id: String,
        remote_listing_id: String,
    },
    /// One or more stale drafts and nothing live. These are invalid by
    /// definition (this side, not the marketplace, enforces the
    /// at-most-one-live-draft rule) and get removed before a replacement is
    /// created.
    HasUnpublishedOnly { offer_ids: Vec<String> },
}

/// The result of driving a SKU to a published offer.
#[derive(Debug, Clone)]
pub struct PublishedOffer {
    pub offer_id: String,
    pub remote_listing_id: String,
}

/// Drives one SKU through offer create/publish, reconciling whatever offers
/// already exist remotely, with exactly one shipping-fallback retry.
pub struct OfferLifecycleManager<'a> {
    api: &'a dyn MarketplaceApi,
}

impl<'a> OfferLifecycleManager<'a> {
    pub fn new(api: &'a dyn MarketplaceApi) -> Self {
        Self { api }
    }

    /// Classify the SKU's remote offers. Always a fresh query.
    pub async fn inspect(&self, token: &str, sku: &str) -> Result<OfferSnapshot, SyncError> {
        let offers = self.api.offers_for_sku(token, sku).await?;
        if let Some(published) = offers
            .iter()
            .find(|o| o.status == crate::marketplace::types::OfferStatus::Published)
        {
            return Ok(OfferSnapshot::HasPublished {
                offer_id: published.offer_id.clone(),
                remote_listing_id: published.remote_listing_id().unwrap_or_default().to_string(),
            });
        }
        if offers.is_empty() {
            return Ok(OfferSnapshot::NoOffer);
        }
        Ok(OfferSnapshot::HasUnpublishedOnly {
            offer_ids: offers.into_iter().map(|o| o.offer_id).collect(),
        })
    }

    /// Create and publish a new offer for the SKU, after removing any stale
    /// unpublished offers found by `inspect`. `fallback_fulfillment` is the
    /// precomputed conservative shipping block used for the one permitted
    /// retry when the marketplace rejects the publish over shipping
    /// configuration; it is `None` for policy-referencing payloads, whose
    /// shipping terms cannot be fixed inline.
    pub async fn publish_new(
        &self,
        token: &str,
        sku: &str,
        snapshot: OfferSnapshot,
        payload: OfferPayload,
        fallback_fulfillment: Option<FulfillmentDetails>,
    ) -> Result<PublishedOffer, SyncError> {
        if let OfferSnapshot::HasUnpublishedOnly { offer_ids } = &snapshot {
            for offer_id in offer_ids {
                // Best-effort cleanup: a failed delete is logged, not fatal.
                if let Err(e) = self.api.delete_offer(token, offer_id).await {
                    warn!(
                        sku,
                        offer_id = %offer_id,
                        error = %e,
                        "marketplace::offer_lifecycle: failed to delete stale offer"
                    );
                }
            }
        }

        let offer_id = self.api.create_offer(token, &payload).await?;
        match self.api.publish_offer(token, &offer_id).await {
            Ok(published) => {
                info!(sku, offer_id = %offer_id, remote_listing_id = %published.listing_id,
                    "marketplace::offer_lifecycle: offer published");
                Ok(PublishedOffer {
                    offer_id,
                    remote_listing_id: published.listing_id,
                })
            }
            Err(e) if e.is_shipping_config_rejection() && fallback_fulfillment.is_some() => {
                warn!(
                    sku,
                    offer_id = %offer_id,
                    error = %e,
                    "marketplace::offer_lifecycle: publish rejected over shipping config; retrying once with fallback service"
                );
                if let Err(del) = self.api.delete_offer(token, &offer_id).await {
                    warn!(sku, offer_id = %offer_id, error = %del,
                        "marketplace::offer_lifecycle: failed to delete rejected offer before retry");
                }
                let mut retry_payload = payload;
                retry_payload.fulfillment_details = fallback_fulfillment;
                let retry_id = self.api.create_offer(token, &retry_payload).await?;
                // A second rejection, shipping or otherwise, is terminal.
                let published = self.api.publish_offer(token, &retry_id).await?;
                info!(sku, offer_id = %retry_id, remote_listing_id = %published.listing_id,
                    "marketplace::offer_lifecycle: offer published on fallback service");
                Ok(PublishedOffer {
                    offer_id: retry_id,
                    remote_listing_id: published.listing_id,
                })
            }
            Err(e) => Err(e),
        }
    }
}
