use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::{LedgerError, Operation, TransactionIntent, TransactionRecord};
use crate::storage::{LedgerStore, RecordDraft, StoreError};
use crate::types::Amount;

const MIN_DESCRIPTION_CHARS: usize = 3;
const MAX_DESCRIPTION_CHARS: usize = 200;

/// Validation bounds and the retry cap for conditional writes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub min_amount: Amount,
    pub max_amount: Amount,
    /// Extra conditional-write attempts after the first before a lost race
    /// is surfaced as `ConcurrencyConflict`.
    pub max_commit_retries: u32
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_amount: Amount::from_cents(1),
            max_amount: Amount::from_cents(99_999_999),
            max_commit_retries: 8
        }
    }
}

/// The only write path into wallets and the ledger.
///
/// A commit validates the intent, computes the balance effect against the
/// loaded snapshot, and hands both to the store's conditional write. A lost
/// revision race reloads and validates again from scratch; the stale delta is
/// never replayed, because an expense that fit the old balance may not fit
/// the new one.
pub struct LedgerEngine<S> {
    store: Arc<S>,
    config: EngineConfig
}

impl<S: LedgerStore> LedgerEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            config: EngineConfig::default()
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Atomically applies one financial event: appends the transaction record
    /// and updates the wallet snapshot as a single unit, or changes nothing.
    pub async fn commit(&self, user_id: &str, intent: TransactionIntent) -> Result<TransactionRecord, LedgerError> {
        let description = self.validate(&intent)?;

        for attempt in 0..=self.config.max_commit_retries {
            let mut wallet = self.store.load_or_init(user_id).await?;
            wallet.apply(&intent.operation, intent.amount)?;

            let draft = RecordDraft {
                user_id: user_id.to_string(),
                operation: intent.operation,
                amount: intent.amount,
                description: description.clone(),
                idempotency_key: intent.idempotency_key.clone()
            };

            match self.store.commit(wallet, draft).await {
                Ok(record) => {
                    debug!("Transaction [{}]:[{:?}] for user [{}] committed", record.id, record.kind(), user_id);
                    return Ok(record);
                }
                Err(StoreError::RevisionMismatch { expected, found, .. }) => {
                    warn!("Commit for user [{user_id}] lost the revision race ({expected} -> {found}) on attempt {attempt}");
                }
                Err(error) => return Err(error.into())
            }
        }

        Err(LedgerError::ConcurrencyConflict {
            user_id: user_id.to_string()
        })
    }

    /// Input checks that need no snapshot, in order: amount bounds, trimmed
    /// description length, transfer route. Returns the description to persist.
    fn validate(&self, intent: &TransactionIntent) -> Result<String, LedgerError> {
        if intent.amount < self.config.min_amount || intent.amount > self.config.max_amount {
            return Err(LedgerError::InvalidAmount {
                amount: intent.amount,
                min: self.config.min_amount,
                max: self.config.max_amount
            });
        }

        let description = intent.description.trim();
        let length = description.chars().count();

        if !(MIN_DESCRIPTION_CHARS..=MAX_DESCRIPTION_CHARS).contains(&length) {
            return Err(LedgerError::InvalidDescription {
                length,
                min: MIN_DESCRIPTION_CHARS,
                max: MAX_DESCRIPTION_CHARS
            });
        }

        if let Operation::Transfer { from, to } = intent.operation {
            if from == to {
                return Err(LedgerError::InvalidTransfer { wallet: from });
            }
        }

        Ok(description.to_string())
    }
}
