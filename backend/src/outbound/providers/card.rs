//! Card-checkout provider adapter.
//!
//! Two halves: [`CardCheckoutClient`] creates hosted checkout sessions over
//! HTTP, and [`CardWebhookVerifier`] authenticates the provider's webhook
//! deliveries and reduces completed-checkout events to settlement notices.
//!
//! The webhook signature header has the form `t=<unix>,v1=<hex>` where `v1`
//! is `HMAC-SHA256(secret, "<t>.<raw body>")`. Verification runs over the
//! raw request bytes; any re-serialisation would change the digest.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;

use crate::domain::coins::{CoinAmount, ProviderReference, UserId};
use crate::domain::error::Error;
use crate::domain::packages::CoinPackage;
use crate::domain::ports::{CheckoutSession, CheckoutSessionProvider, ProviderError};
use crate::domain::settlement::SettlementNotice;

type HmacSha256 = Hmac<Sha256>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How far a webhook timestamp may drift before the delivery is rejected.
pub const REPLAY_TOLERANCE: Duration = Duration::from_secs(300);

/// HTTP client for the card provider's checkout-session API.
pub struct CardCheckoutClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl CardCheckoutClient {
    /// Build a client with a bounded request timeout.
    pub fn new(
        secret_key: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ProviderError::http(err.to_string()))?;
        Ok(Self {
            http,
            secret_key: secret_key.into(),
            api_base: api_base.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
}

#[async_trait]
impl CheckoutSessionProvider for CardCheckoutClient {
    async fn create_session(
        &self,
        user_id: &UserId,
        package: &CoinPackage,
    ) -> Result<CheckoutSession, ProviderError> {
        let price_id = package.provider_price_id.ok_or_else(|| {
            ProviderError::protocol(format!("package {} has no provider price id", package.id))
        })?;

        // The metadata embedded here is what the webhook reads back; it is
        // the single source of truth for the promised credit.
        let user = user_id.to_string();
        let coins = package.coins.to_string();
        let form = [
            ("mode", "payment"),
            ("line_items[0][price]", price_id),
            ("line_items[0][quantity]", "1"),
            ("metadata[user_id]", user.as_str()),
            ("metadata[coins]", coins.as_str()),
            ("payment_intent_data[metadata][user_id]", user.as_str()),
            ("payment_intent_data[metadata][coins]", coins.as_str()),
        ];

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|err| ProviderError::http(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::protocol(format!(
                "session creation returned {status}"
            )));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::protocol(err.to_string()))?;
        Ok(CheckoutSession {
            session_id: session.id,
        })
    }
}

/// Errors raised while authenticating or decoding a webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CardWebhookError {
    /// The signature header is absent.
    #[error("missing signature header")]
    MissingHeader,
    /// The signature header does not match the `t=..,v1=..` scheme.
    #[error("malformed signature header")]
    MalformedHeader,
    /// The signed timestamp is outside the replay tolerance.
    #[error("signature timestamp outside tolerance")]
    StaleTimestamp,
    /// The digest does not match the payload.
    #[error("signature mismatch")]
    SignatureMismatch,
    /// The payload is not a decodable event or lacks required metadata.
    #[error("invalid webhook payload: {message}")]
    Payload {
        /// What was wrong with the payload.
        message: String,
    },
}

impl CardWebhookError {
    fn payload(message: impl Into<String>) -> Self {
        Self::Payload {
            message: message.into(),
        }
    }
}

impl From<CardWebhookError> for Error {
    fn from(value: CardWebhookError) -> Self {
        match value {
            CardWebhookError::Payload { message } => Self::invalid_request(message),
            other => Self::invalid_signature(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    object: CheckoutSessionObject,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    id: String,
    payment_intent: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// Verifies webhook deliveries and extracts settlement notices.
pub struct CardWebhookVerifier {
    secret: Vec<u8>,
}

impl CardWebhookVerifier {
    /// Build a verifier around the shared webhook secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        #[expect(clippy::expect_used, reason = "HMAC-SHA256 accepts any key length")]
        HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length")
    }

    /// Compute the signature header for a payload, as the provider would.
    ///
    /// Used by tests and local webhook tooling.
    #[must_use]
    pub fn signature_header(&self, timestamp: i64, payload: &[u8]) -> String {
        let mut mac = self.mac();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let digest = hex::encode(mac.finalize().into_bytes());
        format!("t={timestamp},v1={digest}")
    }

    /// Verify a delivery's signature header against the raw payload.
    pub fn verify(
        &self,
        payload: &[u8],
        header: &str,
        now: DateTime<Utc>,
    ) -> Result<(), CardWebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut signature: Option<String> = None;
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => {
                    timestamp = Some(
                        value
                            .parse()
                            .map_err(|_| CardWebhookError::MalformedHeader)?,
                    );
                }
                Some(("v1", value)) => signature = Some(value.to_owned()),
                _ => {}
            }
        }
        let timestamp = timestamp.ok_or(CardWebhookError::MalformedHeader)?;
        let signature = signature.ok_or(CardWebhookError::MalformedHeader)?;

        let drift = (now.timestamp() - timestamp).unsigned_abs();
        if drift > REPLAY_TOLERANCE.as_secs() {
            return Err(CardWebhookError::StaleTimestamp);
        }

        let expected = hex::decode(&signature).map_err(|_| CardWebhookError::MalformedHeader)?;
        let mut mac = self.mac();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        // verify_slice is constant time.
        mac.verify_slice(&expected)
            .map_err(|_| CardWebhookError::SignatureMismatch)
    }

    /// Verify a delivery and reduce it to a settlement notice.
    ///
    /// Returns `Ok(None)` for event types that do not settle; the caller
    /// acknowledges those without crediting.
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<SettlementNotice>, CardWebhookError> {
        let header = header.ok_or(CardWebhookError::MissingHeader)?;
        self.verify(payload, header, now)?;
        parse_event(payload)
    }
}

fn parse_event(payload: &[u8]) -> Result<Option<SettlementNotice>, CardWebhookError> {
    let event: WebhookEvent = serde_json::from_slice(payload)
        .map_err(|err| CardWebhookError::payload(format!("undecodable event: {err}")))?;

    if event.event_type != "checkout.session.completed" {
        return Ok(None);
    }

    let session = event.data.object;
    let user_id = session
        .metadata
        .get("user_id")
        .ok_or_else(|| CardWebhookError::payload("metadata missing user_id"))
        .and_then(|raw| {
            UserId::new(raw).map_err(|err| CardWebhookError::payload(err.to_string()))
        })?;
    // Provider metadata is stringly typed; the coin count arrives as text.
    let coins = session
        .metadata
        .get("coins")
        .ok_or_else(|| CardWebhookError::payload("metadata missing coins"))
        .and_then(|raw| {
            raw.parse::<i64>()
                .map_err(|_| CardWebhookError::payload("coins metadata is not an integer"))
        })
        .and_then(|value| {
            CoinAmount::new(value).map_err(|err| CardWebhookError::payload(err.to_string()))
        })?;

    let reference = session
        .payment_intent
        .clone()
        .unwrap_or_else(|| session.id.clone());
    let reference = ProviderReference::new(reference)
        .map_err(|err| CardWebhookError::payload(err.to_string()))?;

    Ok(Some(SettlementNotice {
        user_id,
        coins,
        reference,
        description: format!("Card checkout purchase: {coins} coins"),
        metadata: json!({
            "provider": "card_checkout",
            "session_id": session.id,
        }),
    }))
}
