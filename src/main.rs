use std::fs::File;
use std::io::{BufReader, BufWriter, Write, stderr, stdout};
use std::process::exit;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::spawn_blocking;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt};

use wallet_ledger::{Amount, LedgerEngine, MemoryStore, Operation, TransactionIntent, TransactionKind, Wallet};

/// One row of the replay file: `user,kind,amount,description,from,to`.
/// The wallet columns are only meaningful for transfers.
#[derive(Debug, Deserialize)]
struct EventRow {
    user: String,
    kind: TransactionKind,
    amount: Amount,
    description: String,
    from: Option<Wallet>,
    to: Option<Wallet>
}

impl EventRow {
    fn into_intent(self) -> Option<(String, TransactionIntent)> {
        let operation = match self.kind {
            TransactionKind::Income => Operation::Income,
            TransactionKind::Expense => Operation::Expense,
            TransactionKind::Transfer => match (self.from, self.to) {
                (Some(from), Some(to)) => Operation::Transfer { from, to },
                _ => return None
            }
        };

        Some((self.user, TransactionIntent::new(operation, self.amount, self.description)))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: wallet-ledger [events].csv [log_level:optional]");
        eprintln!("Available log levels: error, warn, info, debug, trace (default: error)");
        exit(1);
    }

    let path = &args[1];
    let log_level = args.get(2)
        .map(|s| parse_log_level(s)).unwrap_or(LevelFilter::ERROR);

    setup_logging(log_level);

    let store = Arc::new(MemoryStore::new());
    let engine = LedgerEngine::new(store.clone());

    let timer = Instant::now();
    replay(&engine, path.clone()).await?;
    let duration = timer.elapsed();

    info!("Replayed events in: {duration:?}");

    write_balances_to_stdout(&store)?;

    Ok(())
}

/// Streams rows from the CSV into the engine: a blocking reader feeds a
/// bounded channel, and rows are committed in file order so per-user
/// ordering matches the file.
async fn replay(engine: &LedgerEngine<MemoryStore>, path: String) -> Result<()> {
    let (sender, mut receiver) = mpsc::channel::<EventRow>(256);

    let reader_handle = spawn_blocking(move || {
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(error) => {
                error!("Error opening events CSV at path: {path} | {error}");
                return;
            }
        };

        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(BufReader::new(file));

        for result in reader.deserialize::<EventRow>() {
            match result {
                Ok(row) => {
                    if sender.blocking_send(row).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    error!("CSV deserialization error: {error}");
                }
            }
        }
    });

    while let Some(row) = receiver.recv().await {
        let Some((user, intent)) = row.into_intent() else {
            warn!("Skipping transfer row without a complete route");
            continue;
        };

        if let Err(error) = engine.commit(&user, intent).await {
            warn!("{error}");
        }
    }

    if let Err(error) = reader_handle.await {
        error!("CSV ingestion failed: {error}");
    }

    Ok(())
}

fn parse_log_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to 'error'", level);
            LevelFilter::ERROR
        }
    }
}

fn setup_logging(level: LevelFilter) {
    // Results go to stdout, so logging has to stay on stderr.
    let terminal_log = fmt::layer()
        .with_target(false)
        .with_writer(stderr)
        .with_filter(level);

    tracing_subscriber::registry()
        .with(terminal_log)
        .init();
}

fn write_balances_to_stdout(store: &MemoryStore) -> Result<()> {
    let mut output = BufWriter::new(stdout().lock());

    writeln!(output, "user,spending,savings")?;

    let mut wallets = store.wallets();
    wallets.sort_by(|a, b| a.user_id.cmp(&b.user_id));

    for wallet in wallets {
        writeln!(output, "{},{},{}", wallet.user_id, wallet.spending, wallet.savings)?;
    }

    output.flush()?;

    Ok(())
}
