//! Cardwatch ingests plain-text transaction-notification messages, extracts
//! the amount and merchant, alerts on high-value charges, persists
//! normalized records in a date-partitioned layout, and publishes a daily
//! spending report.
//!
//! The pipeline is built for at-least-once delivery: record identity is a
//! pure function of the notification source key, so redeliveries converge on
//! the same persisted record, and a notification that keeps failing on
//! transient errors is dead-lettered after a bounded number of attempts.

#![warn(missing_docs)]

use tokio::signal;

mod alert;
mod channels;
mod config;
mod error;
mod extract;
mod models;
mod queue;
mod record;
mod report;
mod stores;
mod worker;

pub use alert::evaluate;
pub use channels::{
    AlertChannel, LogAlertChannel, LogReportChannel, MemoryAlertChannel, MemoryReportChannel,
    ReportChannel,
};
pub use config::AppConfig;
pub use error::Error;
pub use extract::{CAPTURE_GROUP_COUNT, ExtractionPattern, extract};
pub use models::{
    AlertEvent, DailyReport, Extracted, MerchantTotal, RawNotification, TransactionRecord,
};
pub use queue::{MemoryQueue, NotificationQueue, QueueDelivery};
pub use record::{normalize, record_id};
pub use report::{next_run_after, run_daily, run_report_scheduler};
pub use stores::{
    FsObjectStore, MemoryObjectStore, ObjectStore, RecordQuery, partition_key, read_record,
    sqlite::SqliteRecordIndex, write_record,
};
pub use worker::{AckReason, IngestionWorker, Outcome, run_worker};

/// Wait for either the ctrl+c or terminate signal, whichever comes first.
///
/// The worker binary races this against its long-running tasks so the
/// process exits cleanly; any delivery that was in flight simply becomes
/// visible to the queue again after its visibility window.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
