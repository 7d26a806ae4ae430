//! Coin ledger service.
//!
//! Implements [`CoinLedger`] over a [`BalanceStore`]. Credits are idempotent
//! per provider reference and run through a primary transactional strategy
//! with a journaled fallback for transient store failures. Debits rely on the
//! store's guarded decrement; the subsequent log append is best-effort and
//! never rolls the debit back.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::domain::coins::{TransactionDraft, TransactionRecord, TransactionType, UserId};
use crate::domain::ports::{
    BalanceStore, BalanceStoreError, CoinLedger, CreditOutcome, CreditRequest, DebitRequest,
    LedgerError, LedgerReceipt,
};

fn credit_draft(request: &CreditRequest) -> TransactionDraft {
    TransactionDraft {
        id: Uuid::new_v4(),
        user_id: request.user_id.clone(),
        amount: request.amount.get(),
        transaction_type: TransactionType::Purchase,
        description: request.description.clone(),
        provider_reference: Some(request.reference.clone()),
        metadata: request.metadata.clone(),
    }
}

/// Strategy for applying one idempotent credit against the store.
#[async_trait]
pub trait CreditStrategy: Send + Sync {
    /// Apply the credit, reporting whether this call moved coins.
    async fn apply(
        &self,
        store: &dyn BalanceStore,
        request: &CreditRequest,
    ) -> Result<CreditOutcome, BalanceStoreError>;
}

/// Primary strategy: increment and log in one storage transaction.
///
/// The store's unique provider-reference constraint rolls replays back with
/// no balance change.
#[derive(Debug, Default)]
pub struct TransactionalCredit;

#[async_trait]
impl CreditStrategy for TransactionalCredit {
    async fn apply(
        &self,
        store: &dyn BalanceStore,
        request: &CreditRequest,
    ) -> Result<CreditOutcome, BalanceStoreError> {
        store.settle_credit(credit_draft(request)).await
    }
}

/// Fallback strategy: atomic increment first, journal entry best-effort.
///
/// Used when the transactional path fails transiently. The balance update
/// keeps the same atomic increment primitive; only the log append degrades.
/// A duplicate reference detected at append time means a concurrent caller
/// settled first, so the increment is compensated and the earlier settlement
/// reported. A compensation that cannot reclaim the coins surfaces as a
/// store error rather than a silent duplicate.
#[derive(Debug, Default)]
pub struct JournaledCredit;

impl JournaledCredit {
    async fn compensate(
        store: &dyn BalanceStore,
        request: &CreditRequest,
    ) -> Result<(), BalanceStoreError> {
        match store.debit_balance(&request.user_id, request.amount).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => {
                tracing::error!(
                    reference = %request.reference,
                    "duplicate credit spent before it could be reclaimed; balance is overstated"
                );
                Err(BalanceStoreError::query(format!(
                    "duplicate credit for {} needs reconciliation",
                    request.reference
                )))
            }
            Err(err) => {
                tracing::error!(
                    reference = %request.reference,
                    error = %err,
                    "failed to compensate duplicate credit; balance is overstated"
                );
                Err(err)
            }
        }
    }

    async fn settled_balance(
        store: &dyn BalanceStore,
        request: &CreditRequest,
        observed: i64,
    ) -> i64 {
        match store.find_by_provider_reference(&request.reference).await {
            Ok(Some(existing)) => existing.balance_after,
            // The increment was compensated, so back the observed value out.
            Ok(None) | Err(_) => observed - request.amount.get(),
        }
    }
}

#[async_trait]
impl CreditStrategy for JournaledCredit {
    async fn apply(
        &self,
        store: &dyn BalanceStore,
        request: &CreditRequest,
    ) -> Result<CreditOutcome, BalanceStoreError> {
        if let Some(existing) = store.find_by_provider_reference(&request.reference).await? {
            return Ok(CreditOutcome::AlreadySettled {
                balance_after: existing.balance_after,
            });
        }

        let balance_after = store
            .credit_balance(&request.user_id, request.amount)
            .await?;

        let record = credit_draft(request).into_record(balance_after);
        match store.append_transaction(&record).await {
            Ok(()) => Ok(CreditOutcome::Applied { balance_after }),
            Err(BalanceStoreError::DuplicateReference { .. }) => {
                Self::compensate(store, request).await?;
                let settled = Self::settled_balance(store, request, balance_after).await;
                Ok(CreditOutcome::AlreadySettled {
                    balance_after: settled,
                })
            }
            Err(err) => {
                tracing::error!(
                    reference = %request.reference,
                    error = %err,
                    "credit applied but journal append failed"
                );
                Ok(CreditOutcome::Applied { balance_after })
            }
        }
    }
}

/// [`CoinLedger`] implementation over a [`BalanceStore`].
pub struct LedgerService {
    store: Arc<dyn BalanceStore>,
    primary: Box<dyn CreditStrategy>,
    fallback: Box<dyn CreditStrategy>,
}

impl LedgerService {
    /// Build a ledger with the default strategy pair.
    #[must_use]
    pub fn new(store: Arc<dyn BalanceStore>) -> Self {
        Self {
            store,
            primary: Box::new(TransactionalCredit),
            fallback: Box::new(JournaledCredit),
        }
    }

    /// Override the credit strategies.
    #[must_use]
    pub fn with_strategies(
        store: Arc<dyn BalanceStore>,
        primary: Box<dyn CreditStrategy>,
        fallback: Box<dyn CreditStrategy>,
    ) -> Self {
        Self {
            store,
            primary,
            fallback,
        }
    }

    fn debit_description(request: &DebitRequest) -> String {
        request.description.clone().unwrap_or_else(|| {
            let label = match request.transaction_type {
                TransactionType::Purchase => "Coin purchase",
                TransactionType::PostGeneration => "Post generation",
                TransactionType::ImageGeneration => "Image generation",
            };
            format!("{label}: {} coins", request.amount)
        })
    }
}

#[async_trait]
impl CoinLedger for LedgerService {
    async fn credit(&self, request: CreditRequest) -> Result<CreditOutcome, LedgerError> {
        match self.primary.apply(self.store.as_ref(), &request).await {
            Ok(outcome) => Ok(outcome),
            // Only transient connectivity failures justify degrading the
            // journal; anything else propagates for a client retry.
            Err(BalanceStoreError::Connection { message }) => {
                tracing::warn!(
                    reference = %request.reference,
                    error = %message,
                    "transactional credit unavailable; using journaled fallback"
                );
                self.fallback
                    .apply(self.store.as_ref(), &request)
                    .await
                    .map_err(LedgerError::from)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn debit(&self, request: DebitRequest) -> Result<LedgerReceipt, LedgerError> {
        let Some(balance_after) = self
            .store
            .debit_balance(&request.user_id, request.amount)
            .await?
        else {
            return match self.store.fetch_balance(&request.user_id).await? {
                Some(have) => Err(LedgerError::InsufficientFunds {
                    have,
                    need: request.amount.get(),
                }),
                None => Err(LedgerError::AccountMissing),
            };
        };

        let draft = TransactionDraft {
            id: Uuid::new_v4(),
            user_id: request.user_id.clone(),
            amount: -request.amount.get(),
            transaction_type: request.transaction_type,
            description: Self::debit_description(&request),
            provider_reference: None,
            metadata: json!({}),
        };
        let transaction_id = draft.id;
        // The balance mutation is authoritative; a failed journal append is
        // logged and never unwinds the debit.
        if let Err(err) = self
            .store
            .append_transaction(&draft.into_record(balance_after))
            .await
        {
            tracing::error!(
                user_id = %request.user_id,
                error = %err,
                "debit applied but journal append failed"
            );
        }

        Ok(LedgerReceipt {
            transaction_id,
            balance_after,
        })
    }

    async fn balance(&self, user_id: &UserId) -> Result<i64, LedgerError> {
        Ok(self.store.fetch_balance(user_id).await?.unwrap_or(0))
    }

    async fn transactions(
        &self,
        user_id: &UserId,
        limit: i64,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        self.store
            .list_transactions(user_id, limit)
            .await
            .map_err(LedgerError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::coins::{CoinAmount, ProviderReference};
    use crate::domain::ports::InMemoryBalanceStore;
    use futures::future::join_all;
    use rstest::rstest;

    fn amount(value: i64) -> CoinAmount {
        CoinAmount::new(value).expect("valid amount")
    }

    fn credit_request(user_id: &UserId, coins: i64, reference: &str) -> CreditRequest {
        CreditRequest {
            user_id: user_id.clone(),
            amount: amount(coins),
            reference: ProviderReference::new(reference).expect("valid reference"),
            description: format!("Purchase: {coins} coins"),
            metadata: json!({}),
        }
    }

    fn debit_request(user_id: &UserId, coins: i64) -> DebitRequest {
        DebitRequest {
            user_id: user_id.clone(),
            amount: amount(coins),
            transaction_type: TransactionType::PostGeneration,
            description: None,
        }
    }

    /// Store wrapper that fails selected operations with a connection error.
    struct FlakyStore {
        inner: InMemoryBalanceStore,
        fail_settle: bool,
        fail_append: bool,
    }

    impl FlakyStore {
        fn failing_settle(inner: InMemoryBalanceStore) -> Self {
            Self {
                inner,
                fail_settle: true,
                fail_append: false,
            }
        }

        fn failing_append(inner: InMemoryBalanceStore) -> Self {
            Self {
                inner,
                fail_settle: false,
                fail_append: true,
            }
        }
    }

    #[async_trait]
    impl BalanceStore for FlakyStore {
        async fn fetch_balance(&self, user_id: &UserId) -> Result<Option<i64>, BalanceStoreError> {
            self.inner.fetch_balance(user_id).await
        }

        async fn credit_balance(
            &self,
            user_id: &UserId,
            amount: CoinAmount,
        ) -> Result<i64, BalanceStoreError> {
            self.inner.credit_balance(user_id, amount).await
        }

        async fn debit_balance(
            &self,
            user_id: &UserId,
            amount: CoinAmount,
        ) -> Result<Option<i64>, BalanceStoreError> {
            self.inner.debit_balance(user_id, amount).await
        }

        async fn append_transaction(
            &self,
            record: &TransactionRecord,
        ) -> Result<(), BalanceStoreError> {
            if self.fail_append {
                return Err(BalanceStoreError::query("journal offline"));
            }
            self.inner.append_transaction(record).await
        }

        async fn find_by_provider_reference(
            &self,
            reference: &ProviderReference,
        ) -> Result<Option<TransactionRecord>, BalanceStoreError> {
            self.inner.find_by_provider_reference(reference).await
        }

        async fn settle_credit(
            &self,
            draft: TransactionDraft,
        ) -> Result<CreditOutcome, BalanceStoreError> {
            if self.fail_settle {
                return Err(BalanceStoreError::connection("primary offline"));
            }
            self.inner.settle_credit(draft).await
        }

        async fn list_transactions(
            &self,
            user_id: &UserId,
            limit: i64,
        ) -> Result<Vec<TransactionRecord>, BalanceStoreError> {
            self.inner.list_transactions(user_id, limit).await
        }
    }

    /// Store where the transactional path is down and another writer owns
    /// the reference: the pre-check misses, the append collides, and the
    /// reclaiming debit either succeeds or finds the coins already spent.
    struct ContestedStore {
        inner: InMemoryBalanceStore,
        reclaim_fails: bool,
    }

    impl ContestedStore {
        fn new(inner: InMemoryBalanceStore) -> Self {
            Self {
                inner,
                reclaim_fails: false,
            }
        }

        fn with_spent_duplicate(inner: InMemoryBalanceStore) -> Self {
            Self {
                inner,
                reclaim_fails: true,
            }
        }
    }

    #[async_trait]
    impl BalanceStore for ContestedStore {
        async fn fetch_balance(&self, user_id: &UserId) -> Result<Option<i64>, BalanceStoreError> {
            self.inner.fetch_balance(user_id).await
        }

        async fn credit_balance(
            &self,
            user_id: &UserId,
            amount: CoinAmount,
        ) -> Result<i64, BalanceStoreError> {
            self.inner.credit_balance(user_id, amount).await
        }

        async fn debit_balance(
            &self,
            user_id: &UserId,
            amount: CoinAmount,
        ) -> Result<Option<i64>, BalanceStoreError> {
            if self.reclaim_fails {
                return Ok(None);
            }
            self.inner.debit_balance(user_id, amount).await
        }

        async fn append_transaction(
            &self,
            record: &TransactionRecord,
        ) -> Result<(), BalanceStoreError> {
            let reference = record
                .provider_reference
                .as_ref()
                .map_or("missing", ProviderReference::as_str);
            Err(BalanceStoreError::duplicate_reference(reference))
        }

        async fn find_by_provider_reference(
            &self,
            _reference: &ProviderReference,
        ) -> Result<Option<TransactionRecord>, BalanceStoreError> {
            Ok(None)
        }

        async fn settle_credit(
            &self,
            _draft: TransactionDraft,
        ) -> Result<CreditOutcome, BalanceStoreError> {
            Err(BalanceStoreError::connection("primary offline"))
        }

        async fn list_transactions(
            &self,
            user_id: &UserId,
            limit: i64,
        ) -> Result<Vec<TransactionRecord>, BalanceStoreError> {
            self.inner.list_transactions(user_id, limit).await
        }
    }

    #[rstest]
    #[tokio::test]
    async fn credit_applies_once_and_replays_settle() {
        let user_id = UserId::random();
        let ledger = LedgerService::new(Arc::new(InMemoryBalanceStore::new()));

        let first = ledger
            .credit(credit_request(&user_id, 100, "pi_1"))
            .await
            .expect("credit succeeds");
        assert_eq!(first, CreditOutcome::Applied { balance_after: 100 });

        let replay = ledger
            .credit(credit_request(&user_id, 100, "pi_1"))
            .await
            .expect("replay succeeds");
        assert_eq!(replay, CreditOutcome::AlreadySettled { balance_after: 100 });
        assert_eq!(ledger.balance(&user_id).await.expect("balance"), 100);
    }

    #[rstest]
    #[tokio::test]
    async fn fallback_engages_only_on_connection_failure() {
        let user_id = UserId::random();
        let store = Arc::new(FlakyStore::failing_settle(InMemoryBalanceStore::new()));
        let ledger = LedgerService::new(store);

        let outcome = ledger
            .credit(credit_request(&user_id, 50, "pi_2"))
            .await
            .expect("fallback credit succeeds");
        assert_eq!(outcome, CreditOutcome::Applied { balance_after: 50 });

        // The journal entry still landed through the fallback path.
        let replay = ledger
            .credit(credit_request(&user_id, 50, "pi_2"))
            .await
            .expect("replay succeeds");
        assert!(!replay.was_applied());
        assert_eq!(ledger.balance(&user_id).await.expect("balance"), 50);
    }

    #[rstest]
    #[tokio::test]
    async fn duplicate_detected_at_append_is_reclaimed() {
        let user_id = UserId::random();
        let store = Arc::new(ContestedStore::new(InMemoryBalanceStore::new()));
        let ledger = LedgerService::new(store);

        let outcome = ledger
            .credit(credit_request(&user_id, 50, "pi_race"))
            .await
            .expect("lost race resolves to the earlier settlement");
        assert!(!outcome.was_applied());
        // The fallback's own increment was backed out again.
        assert_eq!(ledger.balance(&user_id).await.expect("balance"), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn unreclaimed_duplicate_credit_surfaces_an_error() {
        let user_id = UserId::random();
        let store = Arc::new(ContestedStore::with_spent_duplicate(
            InMemoryBalanceStore::new(),
        ));
        let ledger = LedgerService::new(store);

        let err = ledger
            .credit(credit_request(&user_id, 50, "pi_race"))
            .await
            .expect_err("an overstated balance is never reported as settled");
        assert!(matches!(
            err,
            LedgerError::Store(BalanceStoreError::Query { .. })
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn debit_reports_have_and_need_when_short() {
        let user_id = UserId::random();
        let store = Arc::new(InMemoryBalanceStore::with_balance(user_id.clone(), 5));
        let ledger = LedgerService::new(store);

        let receipt = ledger
            .debit(debit_request(&user_id, 3))
            .await
            .expect("first debit covered");
        assert_eq!(receipt.balance_after, 2);

        let err = ledger
            .debit(debit_request(&user_id, 3))
            .await
            .expect_err("second debit exceeds balance");
        assert_eq!(err, LedgerError::InsufficientFunds { have: 2, need: 3 });
        assert_eq!(ledger.balance(&user_id).await.expect("balance"), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn debit_without_account_reports_missing() {
        let ledger = LedgerService::new(Arc::new(InMemoryBalanceStore::new()));
        let err = ledger
            .debit(debit_request(&UserId::random(), 3))
            .await
            .expect_err("no account row");
        assert_eq!(err, LedgerError::AccountMissing);
    }

    #[rstest]
    #[tokio::test]
    async fn debit_survives_journal_failure() {
        let user_id = UserId::random();
        let store = Arc::new(FlakyStore::failing_append(
            InMemoryBalanceStore::with_balance(user_id.clone(), 10),
        ));
        let ledger = LedgerService::new(store);

        let receipt = ledger
            .debit(debit_request(&user_id, 3))
            .await
            .expect("debit applies despite journal failure");
        assert_eq!(receipt.balance_after, 7);
        assert_eq!(ledger.balance(&user_id).await.expect("balance"), 7);
    }

    #[rstest]
    #[tokio::test]
    async fn concurrent_debits_never_overdraw() {
        let user_id = UserId::random();
        let store = Arc::new(InMemoryBalanceStore::with_balance(user_id.clone(), 10));
        let ledger = Arc::new(LedgerService::new(store));

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let user_id = user_id.clone();
                tokio::spawn(async move { ledger.debit(debit_request(&user_id, 3)).await })
            })
            .collect();
        let results = join_all(tasks).await;

        let successes = results
            .into_iter()
            .map(|joined| joined.expect("task completes"))
            .filter(Result::is_ok)
            .count();
        // floor(10 / 3) debits can settle before the balance is exhausted.
        assert_eq!(successes, 3);
        assert_eq!(ledger.balance(&user_id).await.expect("balance"), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn journal_chains_balance_snapshots() {
        let user_id = UserId::random();
        let ledger = LedgerService::new(Arc::new(InMemoryBalanceStore::new()));

        ledger
            .credit(credit_request(&user_id, 100, "pi_3"))
            .await
            .expect("credit succeeds");
        ledger
            .debit(debit_request(&user_id, 30))
            .await
            .expect("debit succeeds");
        ledger
            .debit(debit_request(&user_id, 20))
            .await
            .expect("debit succeeds");

        let records = ledger
            .transactions(&user_id, 10)
            .await
            .expect("listing succeeds");
        let snapshots: Vec<i64> = records.iter().rev().map(|r| r.balance_after).collect();
        assert_eq!(snapshots, vec![100, 70, 50]);
        let amounts: Vec<i64> = records.iter().rev().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![100, -30, -20]);
    }

    #[rstest]
    #[tokio::test]
    async fn balance_defaults_to_zero_for_new_users() {
        let ledger = LedgerService::new(Arc::new(InMemoryBalanceStore::new()));
        assert_eq!(ledger.balance(&UserId::random()).await.expect("balance"), 0);
    }
}
