pub mod engine;
pub mod models;
pub mod query;
pub mod storage;
pub mod types;

pub use engine::{EngineConfig, LedgerEngine};
pub use models::{LedgerError, Operation, TransactionIntent, TransactionKind, TransactionRecord, Wallet, WalletAccount};
pub use query::QueryService;
pub use storage::{LedgerStore, MemoryStore, StoreError, TransactionFilter};
pub use types::Amount;
