//! Domain ports for the hexagonal boundary.

mod balance_store;
mod ledger;
mod providers;

#[cfg(test)]
pub use balance_store::MockBalanceStore;
pub use balance_store::{BalanceStore, BalanceStoreError, InMemoryBalanceStore};
#[cfg(test)]
pub use ledger::MockCoinLedger;
pub use ledger::{CoinLedger, CreditOutcome, CreditRequest, DebitRequest, LedgerError, LedgerReceipt};
#[cfg(test)]
pub use providers::{MockCheckoutSessionProvider, MockGatewayOrderProvider};
pub use providers::{
    CheckoutSession, CheckoutSessionProvider, FixtureCheckoutSessionProvider,
    FixtureGatewayOrderProvider, GatewayOrder, GatewayOrderProvider, ProviderError,
};
