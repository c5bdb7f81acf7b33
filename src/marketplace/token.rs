use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::database_ops::credentials::CredentialStore;
use crate::marketplace::api::MarketplaceApi;
use crate::marketplace::error::SyncError;

/// Tokens within this window of expiry are refreshed proactively so a
/// multi-call sync run never straddles an expiring token.
const REFRESH_WINDOW_MINUTES: i64 = 30;

/// Guarantees a valid, non-expiring-soon access token before any
/// marketplace call. All credential mutation happens here.
pub struct TokenManager<'a> {
    api: &'a dyn MarketplaceApi,
    credentials: &'a dyn CredentialStore,
}

impl<'a> TokenManager<'a> {
    pub fn new(api: &'a dyn MarketplaceApi, credentials: &'a dyn CredentialStore) -> Self {
        Self { api, credentials }
    }

    pub async fn ensure_valid_token(&self, seller_id: i64) -> Result<String, SyncError> {
        let cred = self
            .credentials
            .fetch(seller_id)
            .await?
            .filter(|c| c.connected)
            .ok_or(SyncError::NotConnected { seller_id })?;

        let now = Utc::now();
        if now + Duration::minutes(REFRESH_WINDOW_MINUTES) < cred.expires_at {
            return Ok(cred.access_token);
        }

        info!(
            seller_id,
            expires_at = %cred.expires_at,
            "marketplace::token: access token near expiry, refreshing"
        );
        match self.api.refresh_access_token(&cred.refresh_token).await {
            Ok(grant) => {
                let expires_at = now + Duration::seconds(grant.expires_in);
                // Some grants omit a rotated refresh token; keep the old one.
                let refresh_token = grant
                    .refresh_token
                    .as_deref()
                    .unwrap_or(&cred.refresh_token);
                self.credentials
                    .store_tokens(seller_id, &grant.access_token, refresh_token, expires_at)
                    .await?;
                Ok(grant.access_token)
            }
            Err(e) if e.indicates_invalid_refresh_token() => {
                // Clear the flag first so subsequent calls fail fast as
                // not-connected instead of re-attempting a doomed refresh.
                warn!(seller_id, error = %e, "marketplace::token: refresh token rejected, disconnecting account");
                self.credentials.mark_disconnected(seller_id).await?;
                Err(SyncError::ReauthRequired { seller_id })
            }
            Err(crate::marketplace::error::RefreshError::Network(e)) => Err(SyncError::Network(e)),
            Err(e) => Err(SyncError::Store(anyhow::anyhow!(
                "token refresh failed: {e}"
            ))),
        }
    }
}
