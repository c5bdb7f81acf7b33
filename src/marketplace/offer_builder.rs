use bigdecimal::BigDecimal;

use crate::database_ops::catalog::PolicyIds;
use crate::database_ops::models::{Listing, SellerBusinessProfile};
use crate::marketplace::policy::AccountClassification;
use crate::marketplace::types::*;

/// Safe default when a seller's preferred service label is missing or not
/// recognized.
pub const DEFAULT_SHIPPING_SERVICE: &str = "USPSGroundAdvantage";

/// Conservative flat-rate service used for the one publish-failure retry.
pub const CONSERVATIVE_SHIPPING_SERVICE: &str = "USPSPriorityMailFlatRateBox";

/// Minimum price an offer is ever built with; a malformed listing never
/// fails purely on a missing price.
const MIN_PRICE: &str = "0.99";

/// Category used when the listing has none ("Everything Else").
const DEFAULT_CATEGORY_ID: &str = "99";

/// Map a seller's free-form preferred-service label onto a valid
/// marketplace shipping service code.
pub fn map_shipping_service(label: Option<&str>) -> &'static str {
    let Some(label) = label else {
        return DEFAULT_SHIPPING_SERVICE;
    };
    let normalized = label.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    match normalized.as_str() {
        "usps_ground" | "usps_ground_advantage" | "ground_advantage" => "USPSGroundAdvantage",
        "usps_priority" | "priority" | "priority_mail" => "USPSPriorityMail",
        "usps_first_class" | "first_class" => "USPSFirstClass",
        "ups_ground" | "ups" => "UPSGround",
        "fedex" | "fedex_home" | "fedex_home_delivery" => "FedExHomeDelivery",
        _ => DEFAULT_SHIPPING_SERVICE,
    }
}

/// Pick a different, more conservative service than the one the marketplace
/// just rejected.
pub fn fallback_shipping_service(rejected: &str) -> &'static str {
    if rejected == CONSERVATIVE_SHIPPING_SERVICE {
        DEFAULT_SHIPPING_SERVICE
    } else {
        CONSERVATIVE_SHIPPING_SERVICE
    }
}

/// Builds marketplace offer payloads, branching on the account
/// classification: business accounts reference reusable policy ids,
/// individual accounts embed inline fulfillment/payment/return terms.
pub struct OfferBuilder {
    marketplace_id: String,
}

impl OfferBuilder {
    pub fn new(marketplace_id: impl Into<String>) -> Self {
        Self {
            marketplace_id: marketplace_id.into(),
        }
    }

    pub fn build(
        &self,
        listing: &Listing,
        profile: &SellerBusinessProfile,
        classification: AccountClassification,
        policy_ids: Option<&PolicyIds>,
        location_key: &str,
    ) -> OfferPayload {
        let mut payload = OfferPayload {
            sku: listing.sku.clone(),
            marketplace_id: self.marketplace_id.clone(),
            format: "FIXED_PRICE".to_string(),
            available_quantity: listing.quantity.max(1),
            category_id: listing
                .category_id
                .clone()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY_ID.to_string()),
            listing_description: listing.description.clone(),
            pricing_summary: PricingSummary {
                price: Amount::new(safe_price(&listing.price), &profile.currency),
            },
            merchant_location_key: location_key.to_string(),
            listing_policies: None,
            fulfillment_details: None,
            payment_methods: None,
            return_terms: None,
        };

        match classification {
            AccountClassification::Business => {
                // Reusable policies carry all terms; nothing inline.
                let ids = policy_ids.expect("business classification requires resolved policies");
                payload.listing_policies = Some(ListingPolicies {
                    fulfillment_policy_id: ids.fulfillment_policy_id.clone(),
                    payment_policy_id: ids.payment_policy_id.clone(),
                    return_policy_id: ids.return_policy_id.clone(),
                });
            }
            AccountClassification::Individual => {
                let service =
                    map_shipping_service(profile.preferred_shipping_service.as_deref());
                payload.fulfillment_details =
                    Some(self.fulfillment_block(listing, profile, service));
                payload.payment_methods = Some(vec![
                    PaymentMethod {
                        payment_method_type: "PAYPAL".to_string(),
                    },
                    PaymentMethod {
                        payment_method_type: "CREDIT_CARD".to_string(),
                    },
                ]);
                payload.return_terms = Some(ReturnTerms {
                    returns_accepted: profile.returns_accepted,
                    return_period: profile
                        .returns_accepted
                        .then(|| TimeDuration::days(profile.return_window_days.max(1))),
                    return_shipping_cost_payer: Some("BUYER".to_string()),
                    restocking_fee_percentage: Some("0".to_string()),
                });
            }
        }
        payload
    }

    /// The inline fulfillment block used for publish recovery: same handling
    /// and cost, different (more conservative) shipping service.
    pub fn fallback_fulfillment(
        &self,
        listing: &Listing,
        profile: &SellerBusinessProfile,
        rejected_service: &str,
    ) -> FulfillmentDetails {
        self.fulfillment_block(listing, profile, fallback_shipping_service(rejected_service))
    }

    fn fulfillment_block(
        &self,
        listing: &Listing,
        profile: &SellerBusinessProfile,
        service_code: &str,
    ) -> FulfillmentDetails {
        let handling_days = listing.handling_days.unwrap_or(profile.handling_days).max(1);
        let cost = listing
            .shipping_cost
            .clone()
            .or_else(|| profile.domestic_shipping_cost.clone());
        let free = profile.free_shipping
            || cost
                .as_ref()
                .map(|c| c <= &BigDecimal::from(0))
                .unwrap_or(false);
        FulfillmentDetails {
            handling_time: TimeDuration::days(handling_days),
            shipping_options: vec![ShippingOption {
                cost_type: "FLAT_RATE".to_string(),
                shipping_services: vec![ShippingService {
                    shipping_service_code: service_code.to_string(),
                    shipping_cost: if free {
                        None
                    } else {
                        cost.map(|c| Amount::new(c.with_scale(2).to_string(), &profile.currency))
                    },
                    free_shipping: free,
                }],
            }],
        }
    }
}

fn safe_price(price: &BigDecimal) -> String {
    if price <= &BigDecimal::from(0) {
        MIN_PRICE.to_string()
    } else {
        price.with_scale(2).to_string()
    }
}
