mod memory;

use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{LedgerError, Operation, TransactionKind, TransactionRecord, WalletAccount};
use crate::types::{Amount, Revision, UserId};

pub use memory::MemoryStore;

/// What the engine hands the store to persist. The store owns assignment of
/// the server-side fields (id, timestamp, sequence) at commit time.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub user_id: UserId,
    pub operation: Operation,
    pub amount: Amount,
    pub description: String,
    pub idempotency_key: Option<String>
}

/// Read-side selection over a user's ledger history. Date bounds are
/// inclusive; `limit` keeps only the newest N after ordering.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>
}

impl TransactionFilter {
    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn since(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn newest(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &TransactionRecord) -> bool {
        if let Some(kind) = self.kind {
            if record.kind() != kind {
                return false;
            }
        }

        if let Some(start) = self.start {
            if record.created_at < start {
                return false;
            }
        }

        if let Some(end) = self.end {
            if record.created_at > end {
                return false;
            }
        }

        true
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The conditional write observed a newer snapshot than the caller loaded.
    #[error("wallet for user [{user_id}] moved from revision {expected} to {found}")]
    RevisionMismatch {
        user_id: UserId,
        expected: Revision,
        found: Revision
    },
    #[error("user [{user_id}] is not registered")]
    UnknownUser {
        user_id: UserId
    },
    #[error("idempotency key [{key}] was already committed")]
    DuplicateKey {
        key: String,
        existing: Box<TransactionRecord>
    },
    #[error("store unavailable: {reason}")]
    Unavailable {
        reason: String
    }
}

impl From<StoreError> for LedgerError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::RevisionMismatch { user_id, .. } => LedgerError::ConcurrencyConflict { user_id },
            StoreError::UnknownUser { user_id } => LedgerError::NotFound { user_id },
            StoreError::DuplicateKey { key, existing } => LedgerError::DuplicateTransaction { key, existing },
            StoreError::Unavailable { reason } => LedgerError::Unavailable { reason }
        }
    }
}

/// Persistence boundary for the ledger: one wallet snapshot per user plus an
/// append-only transaction log, joined by a conditional write.
///
/// `commit` must be atomic. The revision check, the record append, and the
/// snapshot write all happen together or not at all; a record without its
/// balance effect (or the reverse) must never be observable.
pub trait LedgerStore: Send + Sync + 'static {
    /// Loads the wallet snapshot, atomically creating the zeroed snapshot on
    /// first use. Two racing first reads must observe the same account.
    fn load_or_init(&self, user_id: &str) -> impl Future<Output = Result<WalletAccount, StoreError>> + Send;

    /// Conditionally commits one transaction: persists `wallet` at
    /// `wallet.revision + 1` together with the record built from `draft`,
    /// iff the stored snapshot is still at `wallet.revision`. Rejects a draft
    /// whose idempotency key has already been committed.
    fn commit(&self, wallet: WalletAccount, draft: RecordDraft) -> impl Future<Output = Result<TransactionRecord, StoreError>> + Send;

    /// Looks up a previously committed record by its idempotency key.
    fn find_by_idempotency_key(&self, user_id: &str, key: &str) -> impl Future<Output = Result<Option<TransactionRecord>, StoreError>> + Send;

    /// The user's history matching `filter`, newest first with a stable
    /// insertion-sequence tie-break.
    fn records(&self, user_id: &str, filter: &TransactionFilter) -> impl Future<Output = Result<Vec<TransactionRecord>, StoreError>> + Send;
}
