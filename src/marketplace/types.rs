//! Typed request/response structures for the marketplace sell API.
//!
//! Every remote operation gets an explicit tagged struct validated at the
//! boundary; nothing downstream handles loose key-value bodies. Wire names
//! are camelCase; the OAuth token endpoint is snake_case per RFC 6749.

use serde::{Deserialize, Serialize};

/// Program identifier the marketplace reports for accounts opted into
/// reusable business policies.
pub const POLICY_MANAGEMENT_PROGRAM: &str = "SELLING_POLICY_MANAGEMENT";

// ---------------------------------------------------------------------------
// OAuth

#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Some grants rotate the refresh token, some return only a new access
    /// token. Callers keep the old refresh token when this is absent.
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

// ---------------------------------------------------------------------------
// Shared blocks

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    pub value: String,
    pub currency: String,
}

impl Amount {
    pub fn new(value: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            currency: currency.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeDuration {
    pub value: i32,
    pub unit: String,
}

impl TimeDuration {
    pub fn days(value: i32) -> Self {
        Self {
            value,
            unit: "DAY".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Inventory item

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItemPayload {
    pub product: ProductDetails,
    pub condition: String,
    pub availability: Availability,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image_urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub ship_to_location_availability: ShipToLocationAvailability,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipToLocationAvailability {
    pub quantity: i32,
}

// ---------------------------------------------------------------------------
// Offer

/// The offer create payload. Exactly one of the two account shapes is
/// present: `listing_policies` for business accounts, or the three inline
/// blocks (`fulfillment_details` / `payment_methods` / `return_terms`) for
/// individual accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferPayload {
    pub sku: String,
    pub marketplace_id: String,
    pub format: String,
    pub available_quantity: i32,
    pub category_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_description: Option<String>,
    pub pricing_summary: PricingSummary,
    pub merchant_location_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_policies: Option<ListingPolicies>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfillment_details: Option<FulfillmentDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_methods: Option<Vec<PaymentMethod>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_terms: Option<ReturnTerms>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingSummary {
    pub price: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPolicies {
    pub fulfillment_policy_id: String,
    pub payment_policy_id: String,
    pub return_policy_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentDetails {
    pub handling_time: TimeDuration,
    pub shipping_options: Vec<ShippingOption>,
}

impl FulfillmentDetails {
    /// The service code of the first configured shipping service, if any.
    pub fn primary_service_code(&self) -> Option<&str> {
        self.shipping_options
            .first()
            .and_then(|o| o.shipping_services.first())
            .map(|s| s.shipping_service_code.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingOption {
    pub cost_type: String,
    pub shipping_services: Vec<ShippingService>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingService {
    pub shipping_service_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_cost: Option<Amount>,
    pub free_shipping: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub payment_method_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnTerms {
    pub returns_accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_period: Option<TimeDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_shipping_cost_payer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restocking_fee_percentage: Option<String>,
}

// ---------------------------------------------------------------------------
// Offer query / mutation responses

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Published,
    Unpublished,
}

/// A marketplace-side offer as returned by the query-by-SKU endpoint.
/// Fetched fresh each run; never cached across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteOffer {
    pub offer_id: String,
    pub sku: String,
    pub status: OfferStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing: Option<OfferListingRef>,
}

impl RemoteOffer {
    pub fn remote_listing_id(&self) -> Option<&str> {
        self.listing.as_ref().map(|l| l.listing_id.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferListingRef {
    pub listing_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferPage {
    #[serde(default)]
    pub offers: Vec<RemoteOffer>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOfferResponse {
    pub offer_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub listing_id: String,
}

// ---------------------------------------------------------------------------
// Business policies

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyType {
    Fulfillment,
    Payment,
    Return,
}

impl PolicyType {
    pub fn api_path(&self) -> &'static str {
        match self {
            PolicyType::Fulfillment => "fulfillment_policy",
            PolicyType::Payment => "payment_policy",
            PolicyType::Return => "return_policy",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PolicyType::Fulfillment => "fulfillment",
            PolicyType::Payment => "payment",
            PolicyType::Return => "return",
        }
    }
}

/// One policy in a list response. The three list endpoints use different
/// field names for the identifier and the array; aliases normalize them.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyBrief {
    #[serde(
        alias = "fulfillmentPolicyId",
        alias = "paymentPolicyId",
        alias = "returnPolicyId"
    )]
    pub policy_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyPage {
    #[serde(
        default,
        alias = "fulfillmentPolicies",
        alias = "paymentPolicies",
        alias = "returnPolicies"
    )]
    pub policies: Vec<PolicyBrief>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePolicyResponse {
    #[serde(
        alias = "fulfillmentPolicyId",
        alias = "paymentPolicyId",
        alias = "returnPolicyId"
    )]
    pub policy_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryType {
    pub name: String,
}

impl CategoryType {
    pub fn all_excluding_vehicles() -> Vec<CategoryType> {
        vec![CategoryType {
            name: "ALL_EXCLUDING_MOTORS_VEHICLES".to_string(),
        }]
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFulfillmentPolicy {
    pub name: String,
    pub marketplace_id: String,
    pub category_types: Vec<CategoryType>,
    pub handling_time: TimeDuration,
    pub shipping_options: Vec<ShippingOption>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentPolicy {
    pub name: String,
    pub marketplace_id: String,
    pub category_types: Vec<CategoryType>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReturnPolicy {
    pub name: String,
    pub marketplace_id: String,
    pub category_types: Vec<CategoryType>,
    pub returns_accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_period: Option<TimeDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_shipping_cost_payer: Option<String>,
}

/// Tagged union over the three create-policy request bodies so the API seam
/// stays a single method.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CreatePolicyRequest {
    Fulfillment(CreateFulfillmentPolicy),
    Payment(CreatePaymentPolicy),
    Return(CreateReturnPolicy),
}

impl CreatePolicyRequest {
    pub fn policy_type(&self) -> PolicyType {
        match self {
            CreatePolicyRequest::Fulfillment(_) => PolicyType::Fulfillment,
            CreatePolicyRequest::Payment(_) => PolicyType::Payment,
            CreatePolicyRequest::Return(_) => PolicyType::Return,
        }
    }
}

// ---------------------------------------------------------------------------
// Seller programs / inventory locations

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptedInProgram {
    pub program_type: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramPage {
    #[serde(default)]
    pub programs: Vec<OptedInProgram>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLocation {
    pub merchant_location_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationDetails {
    pub address: LocationAddress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationAddress {
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPage {
    #[serde(default)]
    pub locations: Vec<InventoryLocation>,
}
