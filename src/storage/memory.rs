use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::{TransactionRecord, WalletAccount};
use crate::storage::{LedgerStore, RecordDraft, StoreError, TransactionFilter};
use crate::types::UserId;

/// In-memory reference backend.
///
/// The wallet entry guard is the per-user serialization point: a commit holds
/// it across the revision check, the log append, and the snapshot write, so
/// same-user commits are atomic while different users never contend.
pub struct MemoryStore {
    wallets: DashMap<UserId, WalletAccount>,
    ledger: DashMap<UserId, Vec<TransactionRecord>>,
    sequence: AtomicU64,
    registered: Option<HashSet<UserId>>
}

impl MemoryStore {
    /// Open-world store: any user id gets a zeroed wallet at first use.
    pub fn new() -> Self {
        Self {
            wallets: DashMap::new(),
            ledger: DashMap::new(),
            sequence: AtomicU64::new(0),
            registered: None
        }
    }

    /// Restricts wallet creation to the given users, mirroring backends
    /// where an account document exists only after registration.
    pub fn with_registered_users<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<UserId>,
    {
        Self {
            registered: Some(users.into_iter().map(Into::into).collect()),
            ..Self::new()
        }
    }

    /// Snapshot of every wallet, in no particular order.
    pub fn wallets(&self) -> Vec<WalletAccount> {
        self.wallets.iter().map(|entry| entry.value().clone()).collect()
    }

    fn check_registered(&self, user_id: &str) -> Result<(), StoreError> {
        match &self.registered {
            Some(users) if !users.contains(user_id) => Err(StoreError::UnknownUser {
                user_id: user_id.to_string()
            }),
            _ => Ok(())
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerStore for MemoryStore {
    async fn load_or_init(&self, user_id: &str) -> Result<WalletAccount, StoreError> {
        self.check_registered(user_id)?;

        let entry = self.wallets
            .entry(user_id.to_string())
            .or_insert_with(|| WalletAccount::new(user_id));

        Ok(entry.clone())
    }

    async fn commit(&self, wallet: WalletAccount, draft: RecordDraft) -> Result<TransactionRecord, StoreError> {
        self.check_registered(&draft.user_id)?;

        // Lock order is always wallets then ledger; the guard lives until the
        // snapshot write below.
        let mut entry = self.wallets
            .entry(wallet.user_id.clone())
            .or_insert_with(|| WalletAccount::new(wallet.user_id.clone()));

        if entry.revision != wallet.revision {
            return Err(StoreError::RevisionMismatch {
                user_id: wallet.user_id,
                expected: wallet.revision,
                found: entry.revision
            });
        }

        let mut log = self.ledger.entry(draft.user_id.clone()).or_default();

        if let Some(key) = &draft.idempotency_key {
            if let Some(existing) = log.iter().find(|record| record.idempotency_key.as_deref() == Some(key)) {
                return Err(StoreError::DuplicateKey {
                    key: key.clone(),
                    existing: Box::new(existing.clone())
                });
            }
        }

        let record = TransactionRecord {
            id: Uuid::new_v4(),
            user_id: draft.user_id,
            operation: draft.operation,
            amount: draft.amount,
            description: draft.description,
            created_at: Utc::now(),
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            idempotency_key: draft.idempotency_key
        };

        log.push(record.clone());

        let revision = wallet.revision + 1;
        *entry = WalletAccount { revision, ..wallet };

        Ok(record)
    }

    async fn find_by_idempotency_key(&self, user_id: &str, key: &str) -> Result<Option<TransactionRecord>, StoreError> {
        Ok(self.ledger.get(user_id).and_then(|log| {
            log.iter()
                .find(|record| record.idempotency_key.as_deref() == Some(key))
                .cloned()
        }))
    }

    async fn records(&self, user_id: &str, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>, StoreError> {
        let mut selected: Vec<TransactionRecord> = self.ledger
            .get(user_id)
            .map(|log| log.iter().filter(|record| filter.matches(record)).cloned().collect())
            .unwrap_or_default();

        selected.sort_by(|a, b| {
            b.created_at.cmp(&a.created_at).then(b.sequence.cmp(&a.sequence))
        });

        if let Some(limit) = filter.limit {
            selected.truncate(limit);
        }

        Ok(selected)
    }
}
