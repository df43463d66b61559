//! The cardwatch worker process: ingestion worker pool, partition catalog
//! crawler, and daily report scheduler over a local directory-backed store.

use std::{
    collections::HashSet,
    fs::OpenOptions,
    sync::{Arc, Mutex},
    time::Duration,
};

use clap::Parser;
use rusqlite::Connection;
use time::OffsetDateTime;
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use cardwatch::{
    AppConfig, FsObjectStore, IngestionWorker, LogAlertChannel, LogReportChannel, MemoryQueue,
    ObjectStore, SqliteRecordIndex, run_report_scheduler, run_worker, shutdown_signal,
};

/// The storage prefix watched for newly arrived notification messages.
const INBOUND_PREFIX: &str = "inbound/";

/// How often the queue is polled when it is empty.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How often the inbound watcher and the partition catalog scan the store.
const SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// The transaction notification pipeline for cardwatch.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory that backs the object store.
    #[arg(long, default_value = "cardwatch_data")]
    data_dir: String,

    /// File path to the SQLite database for the record index.
    #[arg(long, default_value = "cardwatch_index.db")]
    db_path: String,

    /// Number of ingestion workers to run.
    #[arg(short, long, default_value_t = 4)]
    workers: usize,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!("could not load configuration: {error}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        threshold = config.threshold_amount,
        pattern = config.pattern.as_str(),
        max_delivery_attempts = config.max_delivery_attempts,
        report_hour_utc = config.report_hour_utc,
        "starting cardwatch"
    );

    let store = FsObjectStore::new(&args.data_dir).expect("could not open the data directory");

    let connection = Connection::open(&args.db_path).expect("could not open the index database");
    let index = SqliteRecordIndex::new(Arc::new(Mutex::new(connection)))
        .expect("could not initialize the record index");

    let queue = MemoryQueue::new();

    let worker = Arc::new(IngestionWorker::new(
        config.clone(),
        store.clone(),
        LogAlertChannel,
    ));

    for worker_id in 0..args.workers {
        tokio::spawn(run_worker(
            worker_id,
            queue.clone(),
            worker.clone(),
            POLL_INTERVAL,
        ));
    }

    tokio::spawn(watch_inbound(store.clone(), queue.clone()));
    tokio::spawn(crawl_partitions(store.clone(), index.clone()));
    tokio::spawn(run_report_scheduler(config, index, LogReportChannel));

    shutdown_signal().await;
}

/// Enqueue a delivery for each object that appears under the inbound prefix.
///
/// Plays the object-creation notification plumbing when running against a
/// local directory: drop a message file under `inbound/` and it is picked up
/// on the next scan.
async fn watch_inbound(store: FsObjectStore, queue: MemoryQueue) {
    let mut seen: HashSet<String> = HashSet::new();

    loop {
        match store.list(INBOUND_PREFIX) {
            Ok(keys) => {
                for key in keys {
                    if seen.insert(key.clone()) {
                        tracing::info!(source_key = %key, "enqueueing inbound notification");
                        queue.enqueue(&key, OffsetDateTime::now_utc());
                    }
                }
            }
            Err(error) => tracing::warn!("could not scan the inbound prefix: {error}"),
        }

        tokio::time::sleep(SCAN_INTERVAL).await;
    }
}

/// Periodically discover newly written record partitions and index them.
///
/// Runs on its own schedule, independent of the ingestion workers; a record
/// only becomes queryable by the report job once a crawl has seen it.
async fn crawl_partitions(store: FsObjectStore, index: SqliteRecordIndex) {
    loop {
        if let Err(error) = index.crawl(&store) {
            tracing::warn!("partition crawl failed: {error}");
        }

        tokio::time::sleep(SCAN_INTERVAL).await;
    }
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}
