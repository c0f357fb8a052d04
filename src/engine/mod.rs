mod ledger;
#[cfg(test)]
mod tests;

pub use ledger::{EngineConfig, LedgerEngine};
