//! Payment-provider adapters: outbound clients and signature verification.

pub mod card;
pub mod gateway;

pub use card::{CardCheckoutClient, CardWebhookError, CardWebhookVerifier};
pub use gateway::{GatewayClient, GatewaySignature, GatewaySignatureError};
