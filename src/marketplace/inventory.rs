use tracing::debug;

use crate::database_ops::models::Listing;
use crate::marketplace::api::MarketplaceApi;
use crate::marketplace::error::SyncError;
use crate::marketplace::types::*;

/// Upserts the marketplace-side inventory record for a listing. Rejections
/// surface as `InventoryRejected` with the marketplace payload intact.
pub struct InventoryClient<'a> {
    api: &'a dyn MarketplaceApi,
}

impl<'a> InventoryClient<'a> {
    pub fn new(api: &'a dyn MarketplaceApi) -> Self {
        Self { api }
    }

    pub async fn upsert_item(&self, token: &str, listing: &Listing) -> Result<(), SyncError> {
        let payload = inventory_payload(listing);
        debug!(sku = %listing.sku, "marketplace::inventory: upserting inventory item");
        self.api
            .upsert_inventory_item(token, &listing.sku, &payload)
            .await
    }
}

fn inventory_payload(listing: &Listing) -> InventoryItemPayload {
    InventoryItemPayload {
        product: ProductDetails {
            title: listing.title.clone(),
            description: listing.description.clone(),
            image_urls: listing.image_urls.clone(),
        },
        condition: condition_code(listing.condition.as_deref()),
        availability: Availability {
            ship_to_location_availability: ShipToLocationAvailability {
                quantity: listing.quantity.max(1),
            },
        },
    }
}

/// Normalize a free-form condition label to a marketplace condition enum
/// value ("like new" -> LIKE_NEW). Unset conditions get a conservative
/// default.
fn condition_code(condition: Option<&str>) -> String {
    match condition {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .to_ascii_uppercase()
            .replace([' ', '-'], "_"),
        _ => "USED_GOOD".to_string(),
    }
}
