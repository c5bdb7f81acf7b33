use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::marketplace::error::{RefreshError, SyncError};
use crate::marketplace::types::*;
use crate::util::env as env_util;

/// Every remote operation the sync pipeline performs, as one seam.
/// `MarketplaceClient` is the production implementation; tests script an
/// in-memory mock.
#[async_trait::async_trait]
pub trait MarketplaceApi: Send + Sync {
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant, RefreshError>;

    async fn upsert_inventory_item(
        &self,
        token: &str,
        sku: &str,
        item: &InventoryItemPayload,
    ) -> Result<(), SyncError>;

    /// Fresh query of all offers for a SKU; never cached.
    async fn offers_for_sku(&self, token: &str, sku: &str) -> Result<Vec<RemoteOffer>, SyncError>;

    async fn create_offer(&self, token: &str, payload: &OfferPayload) -> Result<String, SyncError>;

    async fn delete_offer(&self, token: &str, offer_id: &str) -> Result<(), SyncError>;

    async fn publish_offer(&self, token: &str, offer_id: &str)
        -> Result<PublishResponse, SyncError>;

    async fn list_policies(
        &self,
        token: &str,
        policy_type: PolicyType,
    ) -> Result<Vec<PolicyBrief>, SyncError>;

    async fn create_policy(
        &self,
        token: &str,
        request: &CreatePolicyRequest,
    ) -> Result<String, SyncError>;

    /// Program identifiers the seller account is opted into. Used as the
    /// authoritative business-vs-individual signal.
    async fn opted_in_programs(&self, token: &str) -> Result<Vec<String>, SyncError>;

    async fn list_inventory_locations(
        &self,
        token: &str,
    ) -> Result<Vec<InventoryLocation>, SyncError>;

    async fn create_inventory_location(
        &self,
        token: &str,
        location: &InventoryLocation,
    ) -> Result<(), SyncError>;
}

#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    pub api_base: String,
    pub auth_base: String,
    pub client_id: String,
    pub client_secret: String,
    pub marketplace_id: String,
    pub timeout_secs: u64,
}

impl MarketplaceConfig {
    /// Build the config from environment variables (dotenv-aware).
    pub fn from_env() -> anyhow::Result<Self> {
        env_util::init_env();
        Ok(Self {
            api_base: env_util::env_opt("MARKETPLACE_API_BASE")
                .unwrap_or_else(|| "https://api.ebay.com".to_string()),
            auth_base: env_util::env_opt("MARKETPLACE_AUTH_BASE")
                .unwrap_or_else(|| "https://api.ebay.com".to_string()),
            client_id: env_util::env_req("MARKETPLACE_CLIENT_ID")?,
            client_secret: env_util::env_req("MARKETPLACE_CLIENT_SECRET")?,
            marketplace_id: env_util::env_opt("MARKETPLACE_ID")
                .unwrap_or_else(|| "EBAY_US".to_string()),
            timeout_secs: env_util::env_parse("MARKETPLACE_TIMEOUT_SECS", 30u64),
        })
    }
}

/// reqwest-backed client for the marketplace's sell APIs. Any non-success
/// status becomes a typed rejection that carries the marketplace's error
/// payload verbatim.
#[derive(Debug, Clone)]
pub struct MarketplaceClient {
    http: Client,
    api_base: String,
    auth_base: String,
    client_id: String,
    client_secret: String,
    marketplace_id: String,
}

/// Which pipeline stage a rejection belongs to, so the helper can produce
/// the right taxonomy variant.
#[derive(Debug, Clone, Copy)]
enum Stage {
    Inventory,
    Offer,
    Publish,
    Policy,
    Location,
}

impl MarketplaceClient {
    pub fn new(config: &MarketplaceConfig) -> anyhow::Result<Self> {
        // Catch malformed base URLs at construction, not on the first call.
        for base in [&config.api_base, &config.auth_base] {
            Url::parse(base)
                .map_err(|e| anyhow::anyhow!("invalid marketplace base URL {base:?}: {e}"))?;
        }
        let http = Client::builder()
            .user_agent(concat!("crosslist/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            auth_base: config.auth_base.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            marketplace_id: config.marketplace_id.clone(),
        })
    }

    pub fn marketplace_id(&self) -> &str {
        &self.marketplace_id
    }

    fn inventory_url(&self, path: &str) -> String {
        format!("{}/sell/inventory/v1/{}", self.api_base, path)
    }

    fn account_url(&self, path: &str) -> String {
        format!("{}/sell/account/v1/{}", self.api_base, path)
    }

    fn bearer(&self, req: RequestBuilder, token: &str) -> RequestBuilder {
        req.bearer_auth(token)
            .header("Content-Language", "en-US")
            .header("Accept", "application/json")
    }

    /// Read a failed response into (status, verbatim payload). JSON bodies
    /// stay structured; anything else is kept as a string value.
    async fn rejection_body(resp: Response) -> (u16, Value) {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
        (status, body)
    }

    fn rejection(stage: Stage, status: u16, body: Value) -> SyncError {
        match stage {
            Stage::Inventory => SyncError::InventoryRejected { status, body },
            Stage::Offer => SyncError::OfferRejected { status, body },
            Stage::Publish => SyncError::PublishRejected { status, body },
            Stage::Policy => SyncError::PolicyResolutionFailed {
                detail: format!("HTTP {status}: {body}"),
            },
            Stage::Location => SyncError::LocationRejected { status, body },
        }
    }

    async fn expect_success(stage: Stage, resp: Response) -> Result<Response, SyncError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let (status, body) = Self::rejection_body(resp).await;
        Err(Self::rejection(stage, status, body))
    }
}

#[async_trait::async_trait]
impl MarketplaceApi for MarketplaceClient {
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant, RefreshError> {
        let url = format!("{}/identity/v1/oauth2/token", self.auth_base);
        let basic = BASE64.encode(format!("{}:{}", self.client_id, self.client_secret));
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Basic {basic}"))
            .form(&params)
            .send()
            .await?;
        if !resp.status().is_success() {
            let (status, body) = Self::rejection_body(resp).await;
            return Err(RefreshError::Rejected { status, body });
        }
        let grant = resp.json::<TokenGrant>().await?;
        debug!(expires_in = grant.expires_in, "marketplace::api: token refreshed");
        Ok(grant)
    }

    async fn upsert_inventory_item(
        &self,
        token: &str,
        sku: &str,
        item: &InventoryItemPayload,
    ) -> Result<(), SyncError> {
        let url = self.inventory_url(&format!("inventory_item/{sku}"));
        let resp = self.bearer(self.http.put(&url), token).json(item).send().await?;
        Self::expect_success(Stage::Inventory, resp).await?;
        Ok(())
    }

    async fn offers_for_sku(&self, token: &str, sku: &str) -> Result<Vec<RemoteOffer>, SyncError> {
        let url = self.inventory_url("offer");
        let resp = self
            .bearer(self.http.get(&url), token)
            .query(&[("sku", sku), ("marketplace_id", &self.marketplace_id)])
            .send()
            .await?;
        // The query endpoint 404s for a SKU with no offers at all.
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let resp = Self::expect_success(Stage::Offer, resp).await?;
        let page = resp.json::<OfferPage>().await?;
        Ok(page.offers)
    }

    async fn create_offer(&self, token: &str, payload: &OfferPayload) -> Result<String, SyncError> {
        let url = self.inventory_url("offer");
        let resp = self
            .bearer(self.http.post(&url), token)
            .json(payload)
            .send()
            .await?;
        let resp = Self::expect_success(Stage::Offer, resp).await?;
        let created = resp.json::<CreateOfferResponse>().await?;
        Ok(created.offer_id)
    }

    async fn delete_offer(&self, token: &str, offer_id: &str) -> Result<(), SyncError> {
        let url = self.inventory_url(&format!("offer/{offer_id}"));
        let resp = self.bearer(self.http.delete(&url), token).send().await?;
        Self::expect_success(Stage::Offer, resp).await?;
        Ok(())
    }

    async fn publish_offer(
        &self,
        token: &str,
        offer_id: &str,
    ) -> Result<PublishResponse, SyncError> {
        let url = self.inventory_url(&format!("offer/{offer_id}/publish"));
        let resp = self.bearer(self.http.post(&url), token).send().await?;
        let resp = Self::expect_success(Stage::Publish, resp).await?;
        let published = resp.json::<PublishResponse>().await?;
        Ok(published)
    }

    async fn list_policies(
        &self,
        token: &str,
        policy_type: PolicyType,
    ) -> Result<Vec<PolicyBrief>, SyncError> {
        let url = self.account_url(policy_type.api_path());
        let resp = self
            .bearer(self.http.get(&url), token)
            .query(&[("marketplace_id", &self.marketplace_id)])
            .send()
            .await?;
        let resp = Self::expect_success(Stage::Policy, resp).await?;
        let page = resp.json::<PolicyPage>().await?;
        Ok(page.policies)
    }

    async fn create_policy(
        &self,
        token: &str,
        request: &CreatePolicyRequest,
    ) -> Result<String, SyncError> {
        let url = self.account_url(request.policy_type().api_path());
        let resp = self
            .bearer(self.http.post(&url), token)
            .json(request)
            .send()
            .await?;
        let resp = Self::expect_success(Stage::Policy, resp).await?;
        let created = resp.json::<CreatePolicyResponse>().await?;
        Ok(created.policy_id)
    }

    async fn opted_in_programs(&self, token: &str) -> Result<Vec<String>, SyncError> {
        let url = self.account_url("program/get_opted_in_programs");
        let resp = self.bearer(self.http.get(&url), token).send().await?;
        let resp = Self::expect_success(Stage::Policy, resp).await?;
        let page = resp.json::<ProgramPage>().await?;
        Ok(page.programs.into_iter().map(|p| p.program_type).collect())
    }

    async fn list_inventory_locations(
        &self,
        token: &str,
    ) -> Result<Vec<InventoryLocation>, SyncError> {
        let url = self.inventory_url("location");
        let resp = self.bearer(self.http.get(&url), token).send().await?;
        let resp = Self::expect_success(Stage::Location, resp).await?;
        let page = resp.json::<LocationPage>().await?;
        Ok(page.locations)
    }

    async fn create_inventory_location(
        &self,
        token: &str,
        location: &InventoryLocation,
    ) -> Result<(), SyncError> {
        // The location key travels in the path; the body carries the rest.
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct CreateLocationBody<'a> {
            #[serde(skip_serializing_if = "Option::is_none")]
            name: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            location: Option<&'a LocationDetails>,
            merchant_location_status: &'a str,
        }
        let url = self.inventory_url(&format!("location/{}", location.merchant_location_key));
        let body = CreateLocationBody {
            name: location.name.as_deref(),
            location: location.location.as_ref(),
            merchant_location_status: "ENABLED",
        };
        let resp = self
            .bearer(self.http.post(&url), token)
            .json(&body)
            .send()
            .await?;
        Self::expect_success(Stage::Location, resp).await?;
        Ok(())
    }
}
