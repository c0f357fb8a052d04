use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{TransactionKind, Wallet};
use crate::types::{Amount, UserId};

/// The balance effect a transaction has on the two wallets.
///
/// Transfers carry their route, so an incoherent event (a transfer without
/// endpoints, an income with one) is unrepresentable rather than checked by
/// convention.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    Income,
    Expense,
    Transfer {
        from: Wallet,
        to: Wallet
    }
}

impl Operation {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Operation::Income => TransactionKind::Income,
            Operation::Expense => TransactionKind::Expense,
            Operation::Transfer { .. } => TransactionKind::Transfer
        }
    }
}

/// A financial event proposed by a caller, before validation and commit.
#[derive(Debug, Clone)]
pub struct TransactionIntent {
    pub operation: Operation,
    pub amount: Amount,
    pub description: String,
    /// Caller-generated key for exactly-once commits across unknown-outcome
    /// retries. A committed key is never applied twice.
    pub idempotency_key: Option<String>
}

impl TransactionIntent {
    pub fn new(operation: Operation, amount: Amount, description: impl Into<String>) -> Self {
        Self {
            operation,
            amount,
            description: description.into(),
            idempotency_key: None
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// A committed financial event. Immutable once persisted; amendments are new
/// offsetting transactions, never edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Assigned by the store at commit time.
    pub id: Uuid,
    pub user_id: UserId,
    #[serde(flatten)]
    pub operation: Operation,
    pub amount: Amount,
    pub description: String,
    /// Store-assigned commit timestamp; history is ordered newest first.
    pub created_at: DateTime<Utc>,
    /// Store-assigned insertion counter, the tie-break for equal timestamps.
    pub sequence: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>
}

impl TransactionRecord {
    pub fn kind(&self) -> TransactionKind {
        self.operation.kind()
    }
}
