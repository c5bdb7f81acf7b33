use serde_json::Value;
use thiserror::Error;

/// Error id the marketplace returns when an offer's shipping configuration
/// cannot be published (bad/unsupported shipping service).
const SHIPPING_CONFIG_ERROR_IDS: [i64; 2] = [25007, 25019];

/// Everything that can abort a sync run. Marketplace rejections carry the
/// rejecting status code and the error payload verbatim (parsed JSON when the
/// body was JSON, a string value otherwise).
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("seller {seller_id} has no marketplace connection")]
    NotConnected { seller_id: i64 },

    #[error("marketplace rejected the refresh token for seller {seller_id}; account must be re-linked")]
    ReauthRequired { seller_id: i64 },

    #[error("listing failed validation; missing/invalid fields: {}", missing.join(", "))]
    ValidationFailed { missing: Vec<String> },

    #[error("seller account cannot supply business policies: {detail}")]
    PolicyResolutionFailed { detail: String },

    #[error("inventory item rejected (HTTP {status}): {body}")]
    InventoryRejected { status: u16, body: Value },

    #[error("offer rejected (HTTP {status}): {body}")]
    OfferRejected { status: u16, body: Value },

    #[error("publish rejected (HTTP {status}): {body}")]
    PublishRejected { status: u16, body: Value },

    #[error("inventory location setup failed (HTTP {status}): {body}")]
    LocationRejected { status: u16, body: Value },

    #[error("network error talking to marketplace: {0}")]
    Network(#[from] reqwest::Error),

    #[error("storage error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Failure modes of the OAuth refresh exchange. Kept separate from
/// [`SyncError`] because only the token manager knows which seller the
/// exchange was for, and it decides whether a rejection disconnects the
/// account.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("refresh exchange rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: Value },

    #[error(transparent)]
    Network(#[from] reqwest::Error),
}

impl RefreshError {
    /// True when the marketplace says the refresh token itself is invalid or
    /// expired, i.e. re-linking the account is the only way forward.
    pub fn indicates_invalid_refresh_token(&self) -> bool {
        match self {
            RefreshError::Rejected { status, body } => {
                if *status == 401 {
                    return true;
                }
                *status == 400
                    && body
                        .get("error")
                        .and_then(|v| v.as_str())
                        .map(|e| e == "invalid_grant")
                        .unwrap_or(false)
            }
            RefreshError::Network(_) => false,
        }
    }
}

impl SyncError {
    /// True when a publish rejection names an invalid shipping configuration,
    /// the one failure class the lifecycle manager is allowed to retry once
    /// with a fallback fulfillment block.
    pub fn is_shipping_config_rejection(&self) -> bool {
        match self {
            SyncError::PublishRejected { body, .. } => body_names_shipping_config(body),
            _ => false,
        }
    }
}

fn body_names_shipping_config(body: &Value) -> bool {
    let Some(errors) = body.get("errors").and_then(|v| v.as_array()) else {
        return false;
    };
    errors.iter().any(|e| {
        let by_id = e
            .get("errorId")
            .and_then(|v| v.as_i64())
            .map(|id| SHIPPING_CONFIG_ERROR_IDS.contains(&id))
            .unwrap_or(false);
        let by_message = e
            .get("message")
            .and_then(|v| v.as_str())
            .map(|m| m.to_ascii_lowercase().contains("shipping service"))
            .unwrap_or(false);
        by_id || by_message
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shipping_rejection_detected_by_error_id() {
        let err = SyncError::PublishRejected {
            status: 400,
            body: json!({"errors": [{"errorId": 25007, "message": "Invalid data"}]}),
        };
        assert!(err.is_shipping_config_rejection());
    }

    #[test]
    fn shipping_rejection_detected_by_message() {
        let err = SyncError::PublishRejected {
            status: 400,
            body: json!({"errors": [{"errorId": 99, "message": "The Shipping Service is not valid"}]}),
        };
        assert!(err.is_shipping_config_rejection());
    }

    #[test]
    fn unrelated_publish_rejection_is_not_shipping() {
        let err = SyncError::PublishRejected {
            status: 400,
            body: json!({"errors": [{"errorId": 25002, "message": "Category missing"}]}),
        };
        assert!(!err.is_shipping_config_rejection());

        let offer = SyncError::OfferRejected {
            status: 400,
            body: json!({"errors": [{"errorId": 25007}]}),
        };
        assert!(!offer.is_shipping_config_rejection());
    }
}
