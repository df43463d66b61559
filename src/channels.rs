//! Outbound pub/sub channels for alerts and daily reports.
//!
//! Both channels are fire-and-forget with at-least-once delivery to
//! subscribers. The worker treats a failed alert publish as best-effort (the
//! notification still proceeds to persistence); the scheduler treats a
//! failed report publish as a failed run and retries it.

use std::sync::{Arc, Mutex};

use crate::{
    Error,
    models::{AlertEvent, DailyReport},
};

/// Publishes alert events to the high-value transaction topic.
pub trait AlertChannel {
    /// Publish one alert event.
    fn publish(&self, alert: &AlertEvent) -> Result<(), Error>;
}

/// Publishes daily spending reports to the report topic.
pub trait ReportChannel {
    /// Publish one daily report.
    fn publish(&self, report: &DailyReport) -> Result<(), Error>;
}

/// An alert channel that writes alerts to the process log.
///
/// Stands in for an external topic when running locally; the log line
/// carries the full event so a subscriber can be pointed at the log stream.
#[derive(Debug, Clone, Default)]
pub struct LogAlertChannel;

impl AlertChannel for LogAlertChannel {
    fn publish(&self, alert: &AlertEvent) -> Result<(), Error> {
        let payload = serde_json::to_string(alert)?;
        tracing::info!(source_key = %alert.source_key, "ALERT {payload}");

        Ok(())
    }
}

/// A report channel that writes the rendered report body to the process log.
#[derive(Debug, Clone, Default)]
pub struct LogReportChannel;

impl ReportChannel for LogReportChannel {
    fn publish(&self, report: &DailyReport) -> Result<(), Error> {
        tracing::info!(date = %report.date, "daily spending report:\n{}", report.body);

        Ok(())
    }
}

/// An in-memory alert channel that records published events for inspection
/// in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryAlertChannel {
    published: Arc<Mutex<Vec<AlertEvent>>>,
}

impl MemoryAlertChannel {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events published so far, in order.
    pub fn published(&self) -> Vec<AlertEvent> {
        self.published.lock().unwrap().clone()
    }
}

impl AlertChannel for MemoryAlertChannel {
    fn publish(&self, alert: &AlertEvent) -> Result<(), Error> {
        self.published.lock().unwrap().push(alert.clone());

        Ok(())
    }
}

/// An in-memory report channel that records published reports for inspection
/// in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryReportChannel {
    published: Arc<Mutex<Vec<DailyReport>>>,
}

impl MemoryReportChannel {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports published so far, in order.
    pub fn published(&self) -> Vec<DailyReport> {
        self.published.lock().unwrap().clone()
    }
}

impl ReportChannel for MemoryReportChannel {
    fn publish(&self, report: &DailyReport) -> Result<(), Error> {
        self.published.lock().unwrap().push(report.clone());

        Ok(())
    }
}
