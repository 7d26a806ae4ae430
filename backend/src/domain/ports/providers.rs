//! Ports for the two payment providers' outbound calls.
//!
//! Only order/session creation crosses these ports; signature verification
//! is pure computation and lives with the provider adapters.

use async_trait::async_trait;

use crate::domain::coins::UserId;
use crate::domain::packages::CoinPackage;

/// Errors raised by payment-provider adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The provider could not be reached or timed out.
    #[error("provider request failed: {message}")]
    Http {
        /// Transport-level failure description.
        message: String,
    },
    /// The provider answered with an error or an unexpected payload.
    #[error("provider protocol error: {message}")]
    Protocol {
        /// What the provider returned.
        message: String,
    },
    /// A required provider credential is not configured.
    #[error("provider not configured: {message}")]
    Configuration {
        /// Which setting is missing.
        message: String,
    },
}

impl ProviderError {
    /// Build a [`ProviderError::Http`].
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http {
            message: message.into(),
        }
    }

    /// Build a [`ProviderError::Protocol`].
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Build a [`ProviderError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// A hosted checkout session created with the card provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Provider session identifier the client redirects with.
    pub session_id: String,
}

/// Port for creating hosted card-checkout sessions.
///
/// The session embeds the user id and coin amount in provider metadata; the
/// webhook reads that metadata back as the single source of truth for the
/// promised credit.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CheckoutSessionProvider: Send + Sync {
    /// Create a checkout session for the given package.
    async fn create_session(
        &self,
        user_id: &UserId,
        package: &CoinPackage,
    ) -> Result<CheckoutSession, ProviderError>;
}

/// An order created with the regional gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrder {
    /// Provider order identifier the client completes payment against.
    pub order_id: String,
    /// Amount in the currency's minor unit.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
}

/// Port for creating regional-gateway orders.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GatewayOrderProvider: Send + Sync {
    /// Create an order for the given package.
    async fn create_order(
        &self,
        user_id: &UserId,
        package: &CoinPackage,
    ) -> Result<GatewayOrder, ProviderError>;
}

/// Fixture checkout provider returning a canned session.
#[derive(Debug, Default)]
pub struct FixtureCheckoutSessionProvider;

#[async_trait]
impl CheckoutSessionProvider for FixtureCheckoutSessionProvider {
    async fn create_session(
        &self,
        _user_id: &UserId,
        _package: &CoinPackage,
    ) -> Result<CheckoutSession, ProviderError> {
        Ok(CheckoutSession {
            session_id: "cs_fixture".to_owned(),
        })
    }
}

/// Fixture gateway provider returning a canned order.
#[derive(Debug, Default)]
pub struct FixtureGatewayOrderProvider;

#[async_trait]
impl GatewayOrderProvider for FixtureGatewayOrderProvider {
    async fn create_order(
        &self,
        _user_id: &UserId,
        package: &CoinPackage,
    ) -> Result<GatewayOrder, ProviderError> {
        Ok(GatewayOrder {
            order_id: "order_fixture".to_owned(),
            amount: package.price_minor,
            currency: package.currency.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::packages::gateway_package;

    #[tokio::test]
    async fn fixture_gateway_echoes_package_pricing() {
        let provider = FixtureGatewayOrderProvider;
        let package = gateway_package("starter").expect("package exists");
        let order = provider
            .create_order(&UserId::random(), package)
            .await
            .expect("fixture order succeeds");
        assert_eq!(order.amount, 19_900);
        assert_eq!(order.currency, "INR");
    }

    #[tokio::test]
    async fn fixture_checkout_returns_session_id() {
        let provider = FixtureCheckoutSessionProvider;
        let package = crate::domain::packages::card_package("100").expect("package exists");
        let session = provider
            .create_session(&UserId::random(), package)
            .await
            .expect("fixture session succeeds");
        assert!(!session.session_id.is_empty());
    }
}
