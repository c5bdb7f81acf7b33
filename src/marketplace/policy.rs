use tracing::{info, warn};

use crate::database_ops::catalog::PolicyIds;
use crate::database_ops::models::SellerBusinessProfile;
use crate::marketplace::api::MarketplaceApi;
use crate::marketplace::error::SyncError;
use crate::marketplace::offer_builder::map_shipping_service;
use crate::marketplace::types::*;

/// Real marketplace policy identifiers are long opaque numerics; anything
/// shorter than this is a leftover from a half-finished setup flow.
const MIN_POLICY_ID_LEN: usize = 8;

/// Sentinel values older app versions wrote into the three id fields.
const PLACEHOLDER_IDS: [&str; 4] = ["PLACEHOLDER", "NONE", "DEFAULT", "0"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountClassification {
    /// No reusable business policies; offers carry inline per-offer terms.
    Individual,
    /// Opted into reusable policies; offers reference policy ids.
    Business,
}

#[derive(Debug, Clone)]
pub struct ResolvedAccount {
    pub classification: AccountClassification,
    /// Present iff the classification is business.
    pub policy_ids: Option<PolicyIds>,
    /// True when the resolved ids differ from what the profile stored, i.e.
    /// the caller should write them back.
    pub ids_changed: bool,
}

/// Classifies a seller account and, for business accounts, guarantees all
/// three policy types exist on the marketplace (creating defaults from the
/// seller's stored settings where missing).
pub struct AccountPolicyResolver<'a> {
    api: &'a dyn MarketplaceApi,
    marketplace_id: &'a str,
}

impl<'a> AccountPolicyResolver<'a> {
    pub fn new(api: &'a dyn MarketplaceApi, marketplace_id: &'a str) -> Self {
        Self {
            api,
            marketplace_id,
        }
    }

    /// Offline heuristic over the stored profile: individual when any of the
    /// three identifiers is missing, implausibly short, or a placeholder.
    /// Used for dry-run validation, which must make zero network calls.
    pub fn classify_stored(profile: &SellerBusinessProfile) -> AccountClassification {
        let ids = [
            profile.fulfillment_policy_id.as_deref(),
            profile.payment_policy_id.as_deref(),
            profile.return_policy_id.as_deref(),
        ];
        if ids.iter().all(|id| plausible_policy_id(*id)) {
            AccountClassification::Business
        } else {
            AccountClassification::Individual
        }
    }

    pub async fn resolve(
        &self,
        token: &str,
        profile: &SellerBusinessProfile,
    ) -> Result<ResolvedAccount, SyncError> {
        let classification = self.classify(token, profile).await;
        if classification == AccountClassification::Individual {
            return Ok(ResolvedAccount {
                classification,
                policy_ids: None,
                ids_changed: false,
            });
        }

        let fulfillment = self
            .ensure_policy(token, profile, PolicyType::Fulfillment)
            .await?;
        let payment = self.ensure_policy(token, profile, PolicyType::Payment).await?;
        let ret = self.ensure_policy(token, profile, PolicyType::Return).await?;

        let ids = PolicyIds {
            fulfillment_policy_id: fulfillment,
            payment_policy_id: payment,
            return_policy_id: ret,
        };
        let ids_changed = profile.fulfillment_policy_id.as_deref()
            != Some(ids.fulfillment_policy_id.as_str())
            || profile.payment_policy_id.as_deref() != Some(ids.payment_policy_id.as_str())
            || profile.return_policy_id.as_deref() != Some(ids.return_policy_id.as_str());

        Ok(ResolvedAccount {
            classification,
            policy_ids: Some(ids),
            ids_changed,
        })
    }

    /// Prefer the marketplace's own account-capability signal over the
    /// stored-identifier heuristic; fall back to the heuristic only when the
    /// program query fails.
    async fn classify(&self, token: &str, profile: &SellerBusinessProfile) -> AccountClassification {
        match self.api.opted_in_programs(token).await {
            Ok(programs) => {
                if programs.iter().any(|p| p == POLICY_MANAGEMENT_PROGRAM) {
                    AccountClassification::Business
                } else {
                    AccountClassification::Individual
                }
            }
            Err(e) => {
                warn!(
                    seller_id = profile.seller_id,
                    error = %e,
                    "marketplace::policy: program query failed; falling back to stored-id heuristic"
                );
                Self::classify_stored(profile)
            }
        }
    }

    /// Use the stored id when the marketplace still knows it, adopt an
    /// existing policy of the right type otherwise, and create a default as
    /// the last resort.
    async fn ensure_policy(
        &self,
        token: &str,
        profile: &SellerBusinessProfile,
        policy_type: PolicyType,
    ) -> Result<String, SyncError> {
        let existing = self.api.list_policies(token, policy_type).await?;

        let stored = match policy_type {
            PolicyType::Fulfillment => profile.fulfillment_policy_id.as_deref(),
            PolicyType::Payment => profile.payment_policy_id.as_deref(),
            PolicyType::Return => profile.return_policy_id.as_deref(),
        };
        if let Some(stored) = stored.filter(|s| plausible_policy_id(Some(s))) {
            if existing.iter().any(|p| p.policy_id == stored) {
                return Ok(stored.to_string());
            }
        }
        if let Some(first) = existing.first() {
            info!(
                seller_id = profile.seller_id,
                policy_type = policy_type.label(),
                policy_id = %first.policy_id,
                "marketplace::policy: adopting existing policy"
            );
            return Ok(first.policy_id.clone());
        }

        info!(
            seller_id = profile.seller_id,
            policy_type = policy_type.label(),
            "marketplace::policy: no policy of this type exists; creating default"
        );
        let request = self.default_policy_request(profile, policy_type);
        self.api
            .create_policy(token, &request)
            .await
            .map_err(|e| match e {
                SyncError::PolicyResolutionFailed { detail } => SyncError::PolicyResolutionFailed {
                    detail: format!("creating default {} policy: {detail}", policy_type.label()),
                },
                other => other,
            })
    }

    fn default_policy_request(
        &self,
        profile: &SellerBusinessProfile,
        policy_type: PolicyType,
    ) -> CreatePolicyRequest {
        match policy_type {
            PolicyType::Fulfillment => {
                let service =
                    map_shipping_service(profile.preferred_shipping_service.as_deref());
                let cost = profile.domestic_shipping_cost.as_ref();
                let free = profile.free_shipping || cost.is_none();
                CreatePolicyRequest::Fulfillment(CreateFulfillmentPolicy {
                    name: "crosslist-default-fulfillment".to_string(),
                    marketplace_id: self.marketplace_id.to_string(),
                    category_types: CategoryType::all_excluding_vehicles(),
                    handling_time: TimeDuration::days(profile.handling_days.max(1)),
                    shipping_options: vec![ShippingOption {
                        cost_type: "FLAT_RATE".to_string(),
                        shipping_services: vec![ShippingService {
                            shipping_service_code: service.to_string(),
                            shipping_cost: if free {
                                None
                            } else {
                                cost.map(|c| {
                                    Amount::new(c.with_scale(2).to_string(), &profile.currency)
                                })
                            },
                            free_shipping: free,
                        }],
                    }],
                })
            }
            PolicyType::Payment => CreatePolicyRequest::Payment(CreatePaymentPolicy {
                name: "crosslist-default-payment".to_string(),
                marketplace_id: self.marketplace_id.to_string(),
                category_types: CategoryType::all_excluding_vehicles(),
            }),
            PolicyType::Return => CreatePolicyRequest::Return(CreateReturnPolicy {
                name: "crosslist-default-return".to_string(),
                marketplace_id: self.marketplace_id.to_string(),
                category_types: CategoryType::all_excluding_vehicles(),
                returns_accepted: profile.returns_accepted,
                return_period: profile
                    .returns_accepted
                    .then(|| TimeDuration::days(profile.return_window_days.max(1))),
                return_shipping_cost_payer: profile
                    .returns_accepted
                    .then(|| "BUYER".to_string()),
            }),
        }
    }
}

fn plausible_policy_id(id: Option<&str>) -> bool {
    match id {
        None => false,
        Some(raw) => {
            let trimmed = raw.trim();
            trimmed.len() >= MIN_POLICY_ID_LEN
                && !PLACEHOLDER_IDS
                    .iter()
                    .any(|p| trimmed.eq_ignore_ascii_case(p))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::testkit::{business_profile, individual_profile, MockMarketplace};

    #[test]
    fn stored_heuristic_flags_missing_short_and_sentinel_ids() {
        let mut profile = business_profile(7);
        assert_eq!(
            AccountPolicyResolver::classify_stored(&profile),
            AccountClassification::Business
        );

        profile.return_policy_id = None;
        assert_eq!(
            AccountPolicyResolver::classify_stored(&profile),
            AccountClassification::Individual
        );

        profile.return_policy_id = Some("123".to_string()); // too short
        assert_eq!(
            AccountPolicyResolver::classify_stored(&profile),
            AccountClassification::Individual
        );

        profile.return_policy_id = Some("PLACEHOLDER".to_string());
        assert_eq!(
            AccountPolicyResolver::classify_stored(&profile),
            AccountClassification::Individual
        );
    }

    #[tokio::test]
    async fn program_signal_wins_over_stored_ids() {
        // Profile looks individual (no ids) but the marketplace says the
        // account is opted into policy management.
        let api = MockMarketplace::new();
        api.set_programs(vec![POLICY_MANAGEMENT_PROGRAM.to_string()]);
        api.seed_policies(PolicyType::Fulfillment, &["90000000011"]);
        api.seed_policies(PolicyType::Payment, &["90000000012"]);
        api.seed_policies(PolicyType::Return, &["90000000013"]);
        let profile = individual_profile(7);
        let resolver = AccountPolicyResolver::new(&api, "EBAY_US");

        let resolved = resolver.resolve("tok", &profile).await.unwrap();
        assert_eq!(resolved.classification, AccountClassification::Business);
        assert!(resolved.ids_changed);
        assert_eq!(
            resolved.policy_ids.unwrap().fulfillment_policy_id,
            "90000000011"
        );
        assert_eq!(api.calls().policy_creates, 0);
    }

    #[tokio::test]
    async fn program_query_failure_falls_back_to_heuristic() {
        let api = MockMarketplace::new();
        api.fail_programs();
        let profile = individual_profile(7);
        let resolver = AccountPolicyResolver::new(&api, "EBAY_US");

        let resolved = resolver.resolve("tok", &profile).await.unwrap();
        assert_eq!(resolved.classification, AccountClassification::Individual);
        assert!(resolved.policy_ids.is_none());
    }

    #[tokio::test]
    async fn business_account_with_known_ids_creates_nothing() {
        let api = MockMarketplace::new();
        api.set_programs(vec![POLICY_MANAGEMENT_PROGRAM.to_string()]);
        let profile = business_profile(7);
        api.seed_policies(
            PolicyType::Fulfillment,
            &[profile.fulfillment_policy_id.as_deref().unwrap()],
        );
        api.seed_policies(
            PolicyType::Payment,
            &[profile.payment_policy_id.as_deref().unwrap()],
        );
        api.seed_policies(
            PolicyType::Return,
            &[profile.return_policy_id.as_deref().unwrap()],
        );
        let resolver = AccountPolicyResolver::new(&api, "EBAY_US");

        let resolved = resolver.resolve("tok", &profile).await.unwrap();
        assert_eq!(resolved.classification, AccountClassification::Business);
        assert!(!resolved.ids_changed);
        let calls = api.calls();
        assert_eq!(calls.policy_creates, 0);
        // One list per policy type, nothing more.
        assert_eq!(calls.policy_lists, 3);
    }

    #[tokio::test]
    async fn missing_policy_type_is_synthesized_from_profile_defaults() {
        let api = MockMarketplace::new();
        api.set_programs(vec![POLICY_MANAGEMENT_PROGRAM.to_string()]);
        let profile = business_profile(7);
        api.seed_policies(
            PolicyType::Fulfillment,
            &[profile.fulfillment_policy_id.as_deref().unwrap()],
        );
        api.seed_policies(
            PolicyType::Payment,
            &[profile.payment_policy_id.as_deref().unwrap()],
        );
        // no return policies on the marketplace side
        let resolver = AccountPolicyResolver::new(&api, "EBAY_US");

        let resolved = resolver.resolve("tok", &profile).await.unwrap();
        assert_eq!(api.calls().policy_creates, 1);
        assert!(resolved.ids_changed);
        let ids = resolved.policy_ids.unwrap();
        assert!(ids.return_policy_id.starts_with("POL-"));
    }

    #[tokio::test]
    async fn failed_policy_create_surfaces_as_resolution_failure() {
        let api = MockMarketplace::new();
        api.set_programs(vec![POLICY_MANAGEMENT_PROGRAM.to_string()]);
        api.fail_policy_creates();
        let profile = business_profile(7);
        let resolver = AccountPolicyResolver::new(&api, "EBAY_US");

        let err = resolver.resolve("tok", &profile).await.unwrap_err();
        match err {
            SyncError::PolicyResolutionFailed { detail } => {
                assert!(detail.contains("fulfillment"), "detail: {detail}");
            }
            other => panic!("expected PolicyResolutionFailed, got {other:?}"),
        }
    }
}
