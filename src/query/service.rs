use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::models::{LedgerError, TransactionRecord, WalletAccount};
use crate::storage::{LedgerStore, TransactionFilter};
use crate::types::UserId;

/// Read-side access to balances and history.
///
/// Never writes and never blocks the engine. Balance reads can be served
/// from a short-lived cache, so they may trail an in-flight commit by up to
/// the cache's time-to-live.
pub struct QueryService<S> {
    store: Arc<S>,
    balance_cache: Option<Cache<UserId, WalletAccount>>
}

impl<S: LedgerStore> QueryService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            balance_cache: None
        }
    }

    /// Serves balance reads through a capacity- and TTL-bounded cache.
    pub fn with_balance_cache(mut self, capacity: u64, time_to_live: Duration) -> Self {
        self.balance_cache = Some(
            Cache::builder()
                .max_capacity(capacity)
                .time_to_live(time_to_live)
                .build()
        );
        self
    }

    /// The user's current snapshot, zero-created on first read through the
    /// same atomic first-use guard the engine uses.
    pub async fn balance(&self, user_id: &str) -> Result<WalletAccount, LedgerError> {
        if let Some(cache) = &self.balance_cache {
            if let Some(wallet) = cache.get(user_id).await {
                return Ok(wallet);
            }
        }

        let wallet = self.store.load_or_init(user_id).await?;

        if let Some(cache) = &self.balance_cache {
            cache.insert(wallet.user_id.clone(), wallet.clone()).await;
        }

        Ok(wallet)
    }

    /// The user's history matching `filter`, newest first.
    pub async fn list_transactions(&self, user_id: &str, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>, LedgerError> {
        Ok(self.store.records(user_id, filter).await?)
    }

    /// Reconciliation lookup for a caller recovering from an unknown-outcome
    /// commit: whether the intent's key already landed, and as what.
    pub async fn find_by_idempotency_key(&self, user_id: &str, key: &str) -> Result<Option<TransactionRecord>, LedgerError> {
        Ok(self.store.find_by_idempotency_key(user_id, key).await?)
    }
}
