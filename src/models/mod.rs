mod errors;
mod transaction;
mod wallet;

use serde::{Deserialize, Serialize};

pub use errors::LedgerError;
pub use transaction::{Operation, TransactionIntent, TransactionRecord};
pub use wallet::WalletAccount;

/// One of the two named balances owned by every user.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Wallet {
    Spending,
    Savings
}

/// Discriminant of an [`Operation`], used for history filters and ingest.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
    Transfer
}
