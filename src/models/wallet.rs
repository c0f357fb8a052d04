use serde::{Deserialize, Serialize};

use crate::models::errors::LedgerError;
use crate::models::{Operation, Wallet};
use crate::types::{Amount, Revision, UserId};

/// The current balance snapshot for one user: two named balances plus the
/// revision the store's conditional write is keyed on.
///
/// Balances are a cached projection of the ledger. The engine keeps them in
/// step incrementally; nothing outside the engine may write them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub user_id: UserId,
    pub spending: Amount,
    pub savings: Amount,
    /// Bumped by the store on every successful commit. The engine only ever
    /// reads it back as the expected value for the next conditional write.
    pub revision: Revision
}

impl WalletAccount {
    /// The zeroed snapshot used for first-use initialization.
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            spending: Amount::ZERO,
            savings: Amount::ZERO,
            revision: 0
        }
    }

    pub fn balance_of(&self, wallet: Wallet) -> Amount {
        match wallet {
            Wallet::Spending => self.spending,
            Wallet::Savings => self.savings
        }
    }

    /// Applies one operation's balance effect.
    ///
    /// Rejects any effect that would overdraw a wallet; on error the snapshot
    /// is left untouched.
    pub fn apply(&mut self, operation: &Operation, amount: Amount) -> Result<(), LedgerError> {
        match *operation {
            Operation::Income => {
                self.spending = self.credit(Wallet::Spending, amount)?;
            }
            Operation::Expense => {
                self.spending = self.debit(Wallet::Spending, amount)?;
            }
            Operation::Transfer { from, to } => {
                let debited = self.debit(from, amount)?;
                let credited = self.credit(to, amount)?;
                self.set(from, debited);
                self.set(to, credited);
            }
        }

        Ok(())
    }

    fn debit(&self, wallet: Wallet, amount: Amount) -> Result<Amount, LedgerError> {
        let available = self.balance_of(wallet);

        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                wallet,
                available,
                requested: amount
            });
        }

        available.checked_sub(amount).ok_or(LedgerError::Overflow)
    }

    fn credit(&self, wallet: Wallet, amount: Amount) -> Result<Amount, LedgerError> {
        self.balance_of(wallet).checked_add(amount).ok_or(LedgerError::Overflow)
    }

    fn set(&mut self, wallet: Wallet, value: Amount) {
        match wallet {
            Wallet::Spending => self.spending = value,
            Wallet::Savings => self.savings = value
        }
    }
}
