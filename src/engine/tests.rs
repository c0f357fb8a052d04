use super::{EngineConfig, LedgerEngine};

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use rand::RngExt;
use tokio::task::JoinSet;

use crate::models::{LedgerError, Operation, TransactionIntent, TransactionKind, TransactionRecord, Wallet, WalletAccount};
use crate::storage::{LedgerStore, MemoryStore, RecordDraft, StoreError, TransactionFilter};
use crate::types::Amount;

fn amount(value: &str) -> Amount {
    Amount::from_str(value).unwrap()
}

fn income(value: &str) -> TransactionIntent {
    TransactionIntent::new(Operation::Income, amount(value), "test income")
}

fn expense(value: &str) -> TransactionIntent {
    TransactionIntent::new(Operation::Expense, amount(value), "test expense")
}

fn transfer(value: &str, from: Wallet, to: Wallet) -> TransactionIntent {
    TransactionIntent::new(Operation::Transfer { from, to }, amount(value), "test transfer")
}

#[tokio::test]
async fn test_income_on_a_fresh_user_creates_wallet_and_record() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let engine = LedgerEngine::new(store.clone());

    let record = engine.commit("user-1", income("100.00")).await?;

    assert_eq!(record.kind(), TransactionKind::Income);
    assert_eq!(record.amount, amount("100.00"));

    let wallet = store.load_or_init("user-1").await?;

    assert_eq!(wallet.spending, amount("100.00"));
    assert_eq!(wallet.savings, Amount::ZERO);

    let records = store.records("user-1", &TransactionFilter::default()).await?;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, record.id);

    Ok(())
}

#[tokio::test]
async fn test_overdrawing_expense_is_rejected_without_mutation() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let engine = LedgerEngine::new(store.clone());

    engine.commit("user-1", income("50.00")).await?;

    let result = engine.commit("user-1", expense("75.00")).await;

    assert!(matches!(
        result,
        Err(LedgerError::InsufficientFunds { wallet: Wallet::Spending, .. })
    ));

    let wallet = store.load_or_init("user-1").await?;
    assert_eq!(wallet.spending, amount("50.00"));

    let records = store.records("user-1", &TransactionFilter::default()).await?;
    assert_eq!(records.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_transfer_moves_funds_between_wallets() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let engine = LedgerEngine::new(store.clone());

    engine.commit("user-1", income("100.00")).await?;
    engine.commit("user-1", transfer("40.00", Wallet::Spending, Wallet::Savings)).await?;

    let wallet = store.load_or_init("user-1").await?;

    assert_eq!(wallet.spending, amount("60.00"));
    assert_eq!(wallet.savings, amount("40.00"));

    Ok(())
}

#[tokio::test]
async fn test_history_filter_returns_only_the_requested_kind_newest_first() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let engine = LedgerEngine::new(store.clone());

    engine.commit("user-1", income("100.00")).await?;
    engine.commit("user-1", expense("10.00")).await?;
    engine.commit("user-1", transfer("20.00", Wallet::Spending, Wallet::Savings)).await?;
    engine.commit("user-1", expense("5.00")).await?;

    let filter = TransactionFilter::default().kind(TransactionKind::Expense);
    let expenses = store.records("user-1", &filter).await?;

    assert_eq!(expenses.len(), 2);
    assert_eq!(expenses[0].amount, amount("5.00"));
    assert_eq!(expenses[1].amount, amount("10.00"));

    Ok(())
}

#[tokio::test]
async fn test_amounts_outside_the_configured_bounds_are_rejected() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let engine = LedgerEngine::new(store.clone());

    let result = engine.commit("user-1", income("0.00")).await;
    assert!(matches!(result, Err(LedgerError::InvalidAmount { .. })));

    let result = engine.commit("user-1", income("-5.00")).await;
    assert!(matches!(result, Err(LedgerError::InvalidAmount { .. })));

    let result = engine.commit("user-1", income("1000000.00")).await;
    assert!(matches!(result, Err(LedgerError::InvalidAmount { .. })));

    assert!(store.records("user-1", &TransactionFilter::default()).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_description_length_is_checked_after_trimming() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let engine = LedgerEngine::new(store.clone());

    let short = TransactionIntent::new(Operation::Income, amount("10.00"), "  ab  ");
    let result = engine.commit("user-1", short).await;
    assert!(matches!(result, Err(LedgerError::InvalidDescription { length: 2, .. })));

    let long = TransactionIntent::new(Operation::Income, amount("10.00"), "x".repeat(201));
    let result = engine.commit("user-1", long).await;
    assert!(matches!(result, Err(LedgerError::InvalidDescription { length: 201, .. })));

    let padded = TransactionIntent::new(Operation::Income, amount("10.00"), "  salary deposit  ");
    let record = engine.commit("user-1", padded).await?;
    assert_eq!(record.description, "salary deposit");

    Ok(())
}

#[tokio::test]
async fn test_transfer_between_the_same_wallet_is_rejected() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let engine = LedgerEngine::new(store.clone());

    engine.commit("user-1", income("100.00")).await?;

    let result = engine
        .commit("user-1", transfer("10.00", Wallet::Savings, Wallet::Savings))
        .await;

    assert!(matches!(
        result,
        Err(LedgerError::InvalidTransfer { wallet: Wallet::Savings })
    ));

    Ok(())
}

#[tokio::test]
async fn test_unknown_user_in_registered_mode_maps_to_not_found() -> Result<()> {
    let store = Arc::new(MemoryStore::with_registered_users(["user-1"]));
    let engine = LedgerEngine::new(store.clone());

    assert!(engine.commit("user-1", income("10.00")).await.is_ok());

    let result = engine.commit("stranger", income("10.00")).await;

    assert!(matches!(result, Err(LedgerError::NotFound { .. })));

    Ok(())
}

#[tokio::test]
async fn test_committing_the_same_idempotency_key_applies_the_effect_once() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let engine = LedgerEngine::new(store.clone());

    let first = engine
        .commit("user-1", income("100.00").with_idempotency_key("intent-1"))
        .await?;

    let result = engine
        .commit("user-1", income("100.00").with_idempotency_key("intent-1"))
        .await;

    match result {
        Err(LedgerError::DuplicateTransaction { key, existing }) => {
            assert_eq!(key, "intent-1");
            assert_eq!(existing.id, first.id);
        }
        other => panic!("expected DuplicateTransaction, got {other:?}")
    }

    let wallet = store.load_or_init("user-1").await?;
    assert_eq!(wallet.spending, amount("100.00"));

    Ok(())
}

#[tokio::test]
async fn test_concurrent_commits_with_one_idempotency_key_land_exactly_once() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let engine = Arc::new(LedgerEngine::new(store.clone()));

    let mut tasks = JoinSet::new();
    for _ in 0..4 {
        let engine = engine.clone();
        tasks.spawn(async move {
            engine
                .commit("user-1", income("25.00").with_idempotency_key("intent-9"))
                .await
        });
    }

    let mut committed = 0;
    let mut duplicates = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined? {
            Ok(_) => committed += 1,
            Err(LedgerError::DuplicateTransaction { .. }) => duplicates += 1,
            Err(other) => panic!("unexpected error: {other}")
        }
    }

    assert_eq!(committed, 1);
    assert_eq!(duplicates, 3);

    let wallet = store.load_or_init("user-1").await?;
    assert_eq!(wallet.spending, amount("25.00"));

    Ok(())
}

#[tokio::test]
async fn test_concurrent_expenses_never_overdraw_the_wallet() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let config = EngineConfig {
        max_commit_retries: 32,
        ..EngineConfig::default()
    };
    let engine = Arc::new(LedgerEngine::new(store.clone()).with_config(config));

    // Room for exactly three of the four concurrent expenses.
    engine.commit("user-1", income("75.00")).await?;

    let mut tasks = JoinSet::new();
    for _ in 0..4 {
        let engine = engine.clone();
        tasks.spawn(async move { engine.commit("user-1", expense("25.00")).await });
    }

    let mut successes = 0;
    let mut rejections = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined? {
            Ok(_) => successes += 1,
            Err(LedgerError::InsufficientFunds { .. }) => rejections += 1,
            Err(other) => panic!("unexpected error: {other}")
        }
    }

    assert_eq!(successes, 3);
    assert_eq!(rejections, 1);

    let wallet = store.load_or_init("user-1").await?;
    assert_eq!(wallet.spending, Amount::ZERO);
    assert!(!wallet.spending.is_negative());

    let records = store.records("user-1", &TransactionFilter::default()).await?;
    assert_eq!(records.len(), 4);

    Ok(())
}

#[tokio::test]
async fn test_random_workload_keeps_ledger_and_balances_consistent() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let engine = LedgerEngine::new(store.clone());
    let mut rng = rand::rng();

    for _ in 0..200 {
        let cents = rng.random_range(1..=10_000);
        let value = Amount::from_cents(cents);
        let intent = match rng.random_range(0..4) {
            0 => TransactionIntent::new(Operation::Income, value, "random income"),
            1 => TransactionIntent::new(Operation::Expense, value, "random expense"),
            2 => TransactionIntent::new(
                Operation::Transfer { from: Wallet::Spending, to: Wallet::Savings },
                value,
                "random transfer"
            ),
            _ => TransactionIntent::new(
                Operation::Transfer { from: Wallet::Savings, to: Wallet::Spending },
                value,
                "random transfer"
            )
        };

        // Insufficient-funds rejections are part of the workload.
        let _ = engine.commit("user-1", intent).await;
    }

    let wallet = store.load_or_init("user-1").await?;
    assert!(!wallet.spending.is_negative());
    assert!(!wallet.savings.is_negative());

    let records = store.records("user-1", &TransactionFilter::default()).await?;
    let mut net = 0i64;
    for record in &records {
        match record.operation {
            Operation::Income => net += record.amount.cents(),
            Operation::Expense => net -= record.amount.cents(),
            Operation::Transfer { .. } => {}
        }
    }

    assert_eq!(net, wallet.spending.cents() + wallet.savings.cents());

    Ok(())
}

/// Fails every conditional write with a revision mismatch, as if another
/// writer always got there first.
struct ContestedStore {
    inner: MemoryStore
}

impl LedgerStore for ContestedStore {
    async fn load_or_init(&self, user_id: &str) -> Result<WalletAccount, StoreError> {
        self.inner.load_or_init(user_id).await
    }

    async fn commit(&self, wallet: WalletAccount, _draft: RecordDraft) -> Result<TransactionRecord, StoreError> {
        Err(StoreError::RevisionMismatch {
            expected: wallet.revision,
            found: wallet.revision + 1,
            user_id: wallet.user_id
        })
    }

    async fn find_by_idempotency_key(&self, user_id: &str, key: &str) -> Result<Option<TransactionRecord>, StoreError> {
        self.inner.find_by_idempotency_key(user_id, key).await
    }

    async fn records(&self, user_id: &str, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>, StoreError> {
        self.inner.records(user_id, filter).await
    }
}

#[tokio::test]
async fn test_exhausted_retries_surface_a_concurrency_conflict() -> Result<()> {
    let store = Arc::new(ContestedStore { inner: MemoryStore::new() });
    let config = EngineConfig {
        max_commit_retries: 2,
        ..EngineConfig::default()
    };
    let engine = LedgerEngine::new(store.clone()).with_config(config);

    let result = engine.commit("user-1", income("10.00")).await;

    assert!(matches!(result, Err(LedgerError::ConcurrencyConflict { .. })));
    assert!(store.records("user-1", &TransactionFilter::default()).await?.is_empty());

    Ok(())
}

/// Drops the whole conditional write with `Unavailable` while armed, standing
/// in for a persistence outage at the worst possible moment.
struct OutageStore {
    inner: MemoryStore,
    outage: AtomicBool
}

impl LedgerStore for OutageStore {
    async fn load_or_init(&self, user_id: &str) -> Result<WalletAccount, StoreError> {
        self.inner.load_or_init(user_id).await
    }

    async fn commit(&self, wallet: WalletAccount, draft: RecordDraft) -> Result<TransactionRecord, StoreError> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "simulated outage".to_string()
            });
        }

        self.inner.commit(wallet, draft).await
    }

    async fn find_by_idempotency_key(&self, user_id: &str, key: &str) -> Result<Option<TransactionRecord>, StoreError> {
        self.inner.find_by_idempotency_key(user_id, key).await
    }

    async fn records(&self, user_id: &str, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>, StoreError> {
        self.inner.records(user_id, filter).await
    }
}

#[tokio::test]
async fn test_a_failed_commit_leaves_no_partial_state_behind() -> Result<()> {
    let store = Arc::new(OutageStore {
        inner: MemoryStore::new(),
        outage: AtomicBool::new(false)
    });
    let engine = LedgerEngine::new(store.clone());

    engine.commit("user-1", income("100.00")).await?;

    store.outage.store(true, Ordering::SeqCst);
    let result = engine.commit("user-1", expense("30.00")).await;
    assert!(matches!(result, Err(LedgerError::Unavailable { .. })));

    // Balance and ledger must both still show the pre-commit state.
    let wallet = store.load_or_init("user-1").await?;
    assert_eq!(wallet.spending, amount("100.00"));
    let records = store.records("user-1", &TransactionFilter::default()).await?;
    assert_eq!(records.len(), 1);

    store.outage.store(false, Ordering::SeqCst);
    engine.commit("user-1", expense("30.00")).await?;

    let wallet = store.load_or_init("user-1").await?;
    assert_eq!(wallet.spending, amount("70.00"));
    let records = store.records("user-1", &TransactionFilter::default()).await?;
    assert_eq!(records.len(), 2);

    Ok(())
}
