//! Shared HTTP adapter state.
//!
//! Handlers receive this via `actix_web::web::Data` and depend only on
//! domain ports, so every endpoint is testable without I/O. Provider pieces
//! are optional: a missing secret leaves its slot `None` and the affected
//! endpoints fail closed with a configuration error instead of skipping
//! verification.

use std::sync::Arc;

use crate::domain::Error;
use crate::domain::ports::{CheckoutSessionProvider, CoinLedger, GatewayOrderProvider};
use crate::domain::settlement::SettlementService;
use crate::outbound::providers::{CardWebhookVerifier, GatewaySignature};

/// Gateway pieces registered together: order creation, signature checks, and
/// the public key id handed to clients.
#[derive(Clone)]
pub struct GatewayPorts {
    /// Order-creation client.
    pub orders: Arc<dyn GatewayOrderProvider>,
    /// Payment signature verifier.
    pub signature: Arc<GatewaySignature>,
    /// Publishable key id echoed in order responses.
    pub public_key_id: String,
}

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Coin ledger port.
    pub ledger: Arc<dyn CoinLedger>,
    /// Settlement entry point shared by webhook and verify paths.
    pub settlement: Arc<SettlementService>,
    checkout: Option<Arc<dyn CheckoutSessionProvider>>,
    webhook_verifier: Option<Arc<CardWebhookVerifier>>,
    gateway: Option<GatewayPorts>,
}

impl HttpState {
    /// Build state with no payment providers configured.
    #[must_use]
    pub fn new(ledger: Arc<dyn CoinLedger>) -> Self {
        let settlement = Arc::new(SettlementService::new(Arc::clone(&ledger)));
        Self {
            ledger,
            settlement,
            checkout: None,
            webhook_verifier: None,
            gateway: None,
        }
    }

    /// Register the card-checkout session client.
    #[must_use]
    pub fn with_checkout(mut self, checkout: Arc<dyn CheckoutSessionProvider>) -> Self {
        self.checkout = Some(checkout);
        self
    }

    /// Register the card webhook verifier.
    #[must_use]
    pub fn with_webhook_verifier(mut self, verifier: Arc<CardWebhookVerifier>) -> Self {
        self.webhook_verifier = Some(verifier);
        self
    }

    /// Register the regional gateway ports.
    #[must_use]
    pub fn with_gateway(mut self, gateway: GatewayPorts) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// The checkout client, or a configuration error when absent.
    pub fn checkout(&self) -> Result<&Arc<dyn CheckoutSessionProvider>, Error> {
        self.checkout
            .as_ref()
            .ok_or_else(|| Error::configuration("card checkout secret key is not configured"))
    }

    /// The webhook verifier, or a configuration error when absent.
    pub fn webhook_verifier(&self) -> Result<&Arc<CardWebhookVerifier>, Error> {
        self.webhook_verifier
            .as_ref()
            .ok_or_else(|| Error::configuration("card webhook secret is not configured"))
    }

    /// The gateway ports, or a configuration error when absent.
    pub fn gateway(&self) -> Result<&GatewayPorts, Error> {
        self.gateway
            .as_ref()
            .ok_or_else(|| Error::configuration("gateway credentials are not configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ledger::LedgerService;
    use crate::domain::ports::InMemoryBalanceStore;
    use rstest::rstest;

    fn bare_state() -> HttpState {
        HttpState::new(Arc::new(LedgerService::new(Arc::new(
            InMemoryBalanceStore::new(),
        ))))
    }

    #[rstest]
    fn unconfigured_providers_fail_closed() {
        let state = bare_state();
        for code in [
            state.checkout().err().map(|err| err.code()),
            state.webhook_verifier().err().map(|err| err.code()),
            state.gateway().err().map(|err| err.code()),
        ] {
            assert_eq!(code, Some(ErrorCode::ConfigurationError));
        }
    }

    #[rstest]
    fn registered_providers_resolve() {
        let state = bare_state()
            .with_webhook_verifier(Arc::new(CardWebhookVerifier::new(b"secret".as_slice())));
        assert!(state.webhook_verifier().is_ok());
        assert!(state.checkout().is_err());
    }
}
