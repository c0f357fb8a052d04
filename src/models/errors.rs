use thiserror::Error;

use crate::models::{TransactionRecord, Wallet};
use crate::types::{Amount, UserId};

/// Every way a commit or query can fail, as a closed set callers branch on.
///
/// Validation variants are always pre-mutation. `Unavailable` is the one
/// unknown-outcome case: the caller must reconcile by idempotency key before
/// retrying.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("amount {amount} is outside the allowed range [{min}, {max}]")]
    InvalidAmount {
        amount: Amount,
        min: Amount,
        max: Amount
    },
    #[error("description must be {min}-{max} characters after trimming, got {length}")]
    InvalidDescription {
        length: usize,
        min: usize,
        max: usize
    },
    #[error("transfer must move funds between distinct wallets, got {wallet:?} on both sides")]
    InvalidTransfer {
        wallet: Wallet
    },
    #[error("insufficient funds in {wallet:?}: available {available}, requested {requested}")]
    InsufficientFunds {
        wallet: Wallet,
        available: Amount,
        requested: Amount
    },
    #[error("commit for user [{user_id}] lost the revision race; safe to retry the whole commit")]
    ConcurrencyConflict {
        user_id: UserId
    },
    #[error("persistence unavailable: {reason}")]
    Unavailable {
        reason: String
    },
    #[error("no wallet account for user [{user_id}] and auto-creation is not permitted")]
    NotFound {
        user_id: UserId
    },
    #[error("idempotency key [{key}] was already committed as transaction [{}]", .existing.id)]
    DuplicateTransaction {
        key: String,
        existing: Box<TransactionRecord>
    },
    #[error("balance arithmetic overflow")]
    Overflow
}
