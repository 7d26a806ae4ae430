//! Port abstraction for coin balance and transaction-log persistence.
//!
//! The [`BalanceStore`] trait is the single seam between the ledger and its
//! storage. Implementations must provide atomic conditional balance updates;
//! the ledger never compensates for lost updates itself.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::coins::{
    CoinAmount, ProviderReference, TransactionDraft, TransactionRecord, UserId,
};
use crate::domain::ports::ledger::CreditOutcome;

/// Errors raised by balance store adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BalanceStoreError {
    /// Store connection could not be established.
    #[error("balance store connection failed: {message}")]
    Connection {
        /// Adapter-level failure description.
        message: String,
    },
    /// Query or mutation failed during execution.
    #[error("balance store query failed: {message}")]
    Query {
        /// Adapter-level failure description.
        message: String,
    },
    /// Row decoding or value conversion failed.
    #[error("balance store serialization failed: {message}")]
    Serialization {
        /// Adapter-level failure description.
        message: String,
    },
    /// A transaction with this provider reference already exists.
    #[error("provider reference already recorded: {reference}")]
    DuplicateReference {
        /// The conflicting provider reference.
        reference: String,
    },
}

impl BalanceStoreError {
    /// Build a [`BalanceStoreError::Connection`].
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Build a [`BalanceStoreError::Query`].
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Build a [`BalanceStoreError::Serialization`].
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Build a [`BalanceStoreError::DuplicateReference`].
    pub fn duplicate_reference(reference: impl Into<String>) -> Self {
        Self::DuplicateReference {
            reference: reference.into(),
        }
    }
}

/// Port for balance rows and the append-only transaction log.
///
/// Per-user linearizability is the store's responsibility: `credit_balance`,
/// `debit_balance`, and `settle_credit` must be atomic with respect to
/// concurrent callers, and `settle_credit` must credit at most once per
/// provider reference.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Current balance for the user, or `None` when no account row exists.
    async fn fetch_balance(&self, user_id: &UserId) -> Result<Option<i64>, BalanceStoreError>;

    /// Atomically add `amount` coins, creating the account row on first use.
    ///
    /// Returns the balance after the increment.
    async fn credit_balance(
        &self,
        user_id: &UserId,
        amount: CoinAmount,
    ) -> Result<i64, BalanceStoreError>;

    /// Atomically subtract `amount` coins only when the balance covers it.
    ///
    /// Returns the balance after the decrement, or `None` when the account
    /// row is missing or the balance is insufficient. The two cases are
    /// deliberately indistinguishable here; callers disambiguate with
    /// [`BalanceStore::fetch_balance`].
    async fn debit_balance(
        &self,
        user_id: &UserId,
        amount: CoinAmount,
    ) -> Result<Option<i64>, BalanceStoreError>;

    /// Append one record to the transaction log.
    ///
    /// A duplicate provider reference maps to
    /// [`BalanceStoreError::DuplicateReference`].
    async fn append_transaction(
        &self,
        record: &TransactionRecord,
    ) -> Result<(), BalanceStoreError>;

    /// Look up the transaction recorded for a provider reference, if any.
    async fn find_by_provider_reference(
        &self,
        reference: &ProviderReference,
    ) -> Result<Option<TransactionRecord>, BalanceStoreError>;

    /// Credit and log in one storage transaction.
    ///
    /// The draft must carry a positive amount and a provider reference. When
    /// the reference is already recorded the whole operation rolls back with
    /// no balance change and the existing record's `balance_after` is
    /// reported via [`CreditOutcome::AlreadySettled`].
    async fn settle_credit(&self, draft: TransactionDraft)
    -> Result<CreditOutcome, BalanceStoreError>;

    /// Most recent transactions for the user, newest first.
    async fn list_transactions(
        &self,
        user_id: &UserId,
        limit: i64,
    ) -> Result<Vec<TransactionRecord>, BalanceStoreError>;
}

#[derive(Debug, Default)]
struct InMemoryState {
    balances: HashMap<UserId, i64>,
    log: Vec<TransactionRecord>,
}

/// In-memory [`BalanceStore`] with the full atomicity contract.
///
/// Backs the ledger unit tests and local development. A single mutex stands
/// in for the database's row-level atomicity, so the concurrency properties
/// exercised against it carry over to the SQL adapter.
#[derive(Debug, Default)]
pub struct InMemoryBalanceStore {
    state: Mutex<InMemoryState>,
}

impl InMemoryBalanceStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with one pre-funded account.
    #[must_use]
    pub fn with_balance(user_id: UserId, coins: i64) -> Self {
        let store = Self::new();
        store.lock().balances.insert(user_id, coins);
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reference_taken(state: &InMemoryState, reference: &ProviderReference) -> bool {
        state
            .log
            .iter()
            .any(|record| record.provider_reference.as_ref() == Some(reference))
    }
}

#[async_trait]
impl BalanceStore for InMemoryBalanceStore {
    async fn fetch_balance(&self, user_id: &UserId) -> Result<Option<i64>, BalanceStoreError> {
        Ok(self.lock().balances.get(user_id).copied())
    }

    async fn credit_balance(
        &self,
        user_id: &UserId,
        amount: CoinAmount,
    ) -> Result<i64, BalanceStoreError> {
        let mut state = self.lock();
        let balance = state.balances.entry(user_id.clone()).or_insert(0);
        *balance += amount.get();
        Ok(*balance)
    }

    async fn debit_balance(
        &self,
        user_id: &UserId,
        amount: CoinAmount,
    ) -> Result<Option<i64>, BalanceStoreError> {
        let mut state = self.lock();
        let Some(balance) = state.balances.get_mut(user_id) else {
            return Ok(None);
        };
        if *balance < amount.get() {
            return Ok(None);
        }
        *balance -= amount.get();
        Ok(Some(*balance))
    }

    async fn append_transaction(
        &self,
        record: &TransactionRecord,
    ) -> Result<(), BalanceStoreError> {
        let mut state = self.lock();
        if let Some(reference) = record.provider_reference.as_ref()
            && Self::reference_taken(&state, reference)
        {
            return Err(BalanceStoreError::duplicate_reference(reference.as_str()));
        }
        state.log.push(record.clone());
        Ok(())
    }

    async fn find_by_provider_reference(
        &self,
        reference: &ProviderReference,
    ) -> Result<Option<TransactionRecord>, BalanceStoreError> {
        let state = self.lock();
        Ok(state
            .log
            .iter()
            .find(|record| record.provider_reference.as_ref() == Some(reference))
            .cloned())
    }

    async fn settle_credit(
        &self,
        draft: TransactionDraft,
    ) -> Result<CreditOutcome, BalanceStoreError> {
        let mut state = self.lock();
        if let Some(reference) = draft.provider_reference.as_ref()
            && let Some(existing) = state
                .log
                .iter()
                .find(|record| record.provider_reference.as_ref() == Some(reference))
        {
            return Ok(CreditOutcome::AlreadySettled {
                balance_after: existing.balance_after,
            });
        }
        let balance = state.balances.entry(draft.user_id.clone()).or_insert(0);
        *balance += draft.amount;
        let balance_after = *balance;
        state.log.push(draft.into_record(balance_after));
        Ok(CreditOutcome::Applied { balance_after })
    }

    async fn list_transactions(
        &self,
        user_id: &UserId,
        limit: i64,
    ) -> Result<Vec<TransactionRecord>, BalanceStoreError> {
        let state = self.lock();
        let limit = usize::try_from(limit.max(0))
            .map_err(|err| BalanceStoreError::serialization(err.to_string()))?;
        Ok(state
            .log
            .iter()
            .rev()
            .filter(|record| &record.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
