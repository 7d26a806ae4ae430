//! Regional payment-gateway adapter.
//!
//! [`GatewayClient`] creates orders server-side; the client completes payment
//! in the browser and relays the gateway's success signal back. That relayed
//! signal is untrusted until [`GatewaySignature`] re-computes the HMAC over
//! `"{order_id}|{payment_id}"` with the server-held key secret.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;

use crate::domain::coins::UserId;
use crate::domain::error::Error;
use crate::domain::packages::CoinPackage;
use crate::domain::ports::{GatewayOrder, GatewayOrderProvider, ProviderError};

type HmacSha256 = Hmac<Sha256>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn receipt_for(user_id: &UserId) -> String {
    let prefix: String = user_id.to_string().chars().take(4).collect();
    format!("rcpt_{}_{prefix}", Utc::now().timestamp_millis())
}

/// HTTP client for the gateway's order API.
pub struct GatewayClient {
    http: reqwest::Client,
    key_id: String,
    key_secret: String,
    api_base: String,
}

impl GatewayClient {
    /// Build a client with a bounded request timeout.
    pub fn new(
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ProviderError::http(err.to_string()))?;
        Ok(Self {
            http,
            key_id: key_id.into(),
            key_secret: key_secret.into(),
            api_base: api_base.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

#[async_trait]
impl GatewayOrderProvider for GatewayClient {
    async fn create_order(
        &self,
        user_id: &UserId,
        package: &CoinPackage,
    ) -> Result<GatewayOrder, ProviderError> {
        // Notes travel with the order and come back in dashboard exports;
        // the verify path resolves the package server-side regardless.
        let body = json!({
            "amount": package.price_minor,
            "currency": package.currency,
            "receipt": receipt_for(user_id),
            "notes": {
                "user_id": user_id.to_string(),
                "package_id": package.id,
                "coins": package.coins,
            },
        });

        let response = self
            .http
            .post(format!("{}/v1/orders", self.api_base))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::http(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::protocol(format!(
                "order creation returned {status}"
            )));
        }

        let order: OrderResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::protocol(err.to_string()))?;
        Ok(GatewayOrder {
            order_id: order.id,
            amount: order.amount,
            currency: order.currency,
        })
    }
}

/// Errors raised while checking a relayed payment signature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewaySignatureError {
    /// The signature is not valid hex.
    #[error("malformed payment signature")]
    Malformed,
    /// The signature does not match the order and payment ids.
    #[error("payment signature mismatch")]
    Mismatch,
}

impl From<GatewaySignatureError> for Error {
    fn from(value: GatewaySignatureError) -> Self {
        Self::invalid_signature(value.to_string())
    }
}

/// Verifier for the gateway's `HMAC-SHA256(order_id|payment_id)` scheme.
pub struct GatewaySignature {
    key_secret: Vec<u8>,
}

impl GatewaySignature {
    /// Build a verifier around the gateway key secret.
    pub fn new(key_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            key_secret: key_secret.into(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        #[expect(clippy::expect_used, reason = "HMAC-SHA256 accepts any key length")]
        HmacSha256::new_from_slice(&self.key_secret).expect("HMAC accepts any key length")
    }

    /// Compute the hex signature for an order/payment pair.
    ///
    /// Used by tests standing in for the gateway.
    #[must_use]
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        let mut mac = self.mac();
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Verify a relayed signature; must pass before any credit.
    pub fn verify(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), GatewaySignatureError> {
        let expected = hex::decode(signature).map_err(|_| GatewaySignatureError::Malformed)?;
        let mut mac = self.mac();
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        // verify_slice is constant time.
        mac.verify_slice(&expected)
            .map_err(|_| GatewaySignatureError::Mismatch)
    }
}
