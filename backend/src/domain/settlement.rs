//! Payment settlement service.
//!
//! Both provider paths (asynchronous webhook, synchronous verify) reduce a
//! provider success signal to a [`SettlementNotice`] before calling in here.
//! The service drives the payment-intent state machine and hands the credit
//! to the ledger, which enforces at-most-once semantics per reference.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::coins::{CoinAmount, ProviderReference, UserId};
use crate::domain::ports::{CoinLedger, CreditRequest, LedgerError};

/// Lifecycle of a payment intent as observed by this service.
///
/// `Created -> Confirmed -> Credited`, or `-> Failed` from any non-terminal
/// state. Transitions are explicit so an out-of-order settlement is a bug
/// surfaced here rather than a silent double credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentState {
    /// Order or session created with the provider.
    Created,
    /// Provider success signal verified.
    Confirmed,
    /// Coins credited (terminal).
    Credited,
    /// Settlement abandoned (terminal).
    Failed,
}

/// Error for a transition the state machine does not permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal intent transition: {from:?} -> {attempted:?}")]
pub struct IntentTransitionError {
    /// State the intent was in.
    pub from: IntentState,
    /// State the caller tried to reach.
    pub attempted: IntentState,
}

impl IntentState {
    /// Mark the provider signal as verified.
    pub fn confirm(self) -> Result<Self, IntentTransitionError> {
        match self {
            Self::Created => Ok(Self::Confirmed),
            other => Err(IntentTransitionError {
                from: other,
                attempted: Self::Confirmed,
            }),
        }
    }

    /// Mark the coins as credited.
    pub fn credit(self) -> Result<Self, IntentTransitionError> {
        match self {
            Self::Confirmed => Ok(Self::Credited),
            other => Err(IntentTransitionError {
                from: other,
                attempted: Self::Credited,
            }),
        }
    }

    /// Abandon the intent.
    #[must_use]
    pub const fn fail(self) -> Self {
        match self {
            Self::Credited => Self::Credited,
            Self::Created | Self::Confirmed | Self::Failed => Self::Failed,
        }
    }
}

/// A verified provider success signal, reduced to the credit it promises.
///
/// Constructing one implies the provider signature has already been checked;
/// adapters must never build a notice from an unverified payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementNotice {
    /// Account the payment belongs to, read from provider metadata.
    pub user_id: UserId,
    /// Coins promised by the payment.
    pub coins: CoinAmount,
    /// Provider payment identifier; the settlement idempotency key.
    pub reference: ProviderReference,
    /// Audit-trail description.
    pub description: String,
    /// Provider payload snippets worth keeping alongside the record.
    pub metadata: Value,
}

/// Result of settling a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementReceipt {
    /// Whether this settlement moved coins (false on replay).
    pub credited: bool,
    /// Balance after the credit settled, now or previously.
    pub balance_after: i64,
}

/// Errors raised while settling a notice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    /// The intent state machine rejected a transition.
    #[error(transparent)]
    Intent(#[from] IntentTransitionError),
    /// The ledger refused or failed the credit.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<SettlementError> for crate::domain::error::Error {
    fn from(value: SettlementError) -> Self {
        match value {
            SettlementError::Intent(err) => Self::internal(err.to_string()),
            SettlementError::Ledger(err) => err.into(),
        }
    }
}

/// Drives verified payments into the ledger.
pub struct SettlementService {
    ledger: Arc<dyn CoinLedger>,
}

impl SettlementService {
    /// Build a settlement service over the given ledger.
    #[must_use]
    pub fn new(ledger: Arc<dyn CoinLedger>) -> Self {
        Self { ledger }
    }

    /// Settle a verified notice; replays succeed without crediting again.
    pub async fn settle(
        &self,
        notice: SettlementNotice,
    ) -> Result<SettlementReceipt, SettlementError> {
        let state = IntentState::Created.confirm()?;

        let request = CreditRequest {
            user_id: notice.user_id.clone(),
            amount: notice.coins,
            reference: notice.reference.clone(),
            description: notice.description,
            metadata: notice.metadata,
        };

        match self.ledger.credit(request).await {
            Ok(outcome) => {
                let state = state.credit()?;
                debug_assert_eq!(state, IntentState::Credited);
                if outcome.was_applied() {
                    tracing::info!(
                        user_id = %notice.user_id,
                        coins = %notice.coins,
                        reference = %notice.reference,
                        "payment settled"
                    );
                } else {
                    tracing::info!(
                        reference = %notice.reference,
                        "settlement replayed; coins already credited"
                    );
                }
                Ok(SettlementReceipt {
                    credited: outcome.was_applied(),
                    balance_after: outcome.balance_after(),
                })
            }
            Err(err) => {
                let _ = state.fail();
                tracing::error!(
                    reference = %notice.reference,
                    error = %err,
                    "settlement failed; safe to retry per reference"
                );
                Err(err.into())
            }
        }
    }
}
