//! The daily aggregation job and its fixed-schedule runner.
//!
//! Every run recomputes the report from the persisted records for the target
//! date. Nothing is accumulated between runs, so replaying a day after a
//! failed run or a late-discovered partition converges on the same report.

use std::collections::HashMap;
use std::time::Duration;

use time::{Date, OffsetDateTime, Time};

use crate::{
    Error,
    channels::ReportChannel,
    config::AppConfig,
    models::{DailyReport, MerchantTotal, TransactionRecord},
    stores::RecordQuery,
};

/// How long to wait before retrying a failed report run.
const RETRY_BACKOFF: Duration = Duration::from_secs(5 * 60);

/// How many times a failed report run is retried before giving up until the
/// next scheduled day.
const RETRY_LIMIT: u32 = 3;

/// Compute the spending report for `target_date` from persisted records.
///
/// Pure recomputation: the same records always produce the same report,
/// including the month-to-date figure, which is summed fresh over the
/// records from the first of the month through `target_date`.
///
/// # Errors
/// Returns [Error::Query] if the query engine or partition catalog cannot
/// serve the query. The caller treats this as retryable; records for other
/// dates are unaffected.
pub fn run_daily(
    query: &impl RecordQuery,
    target_date: Date,
    top_merchant_limit: usize,
) -> Result<DailyReport, Error> {
    let records = query.records_for(target_date)?;

    let total_amount: f64 = records.iter().map(|record| record.amount).sum();
    let top_merchants = top_merchants(&records, top_merchant_limit);

    let month_start = target_date.replace_day(1).unwrap();
    let month_to_date: f64 = query
        .records_between(month_start, target_date)?
        .iter()
        .map(|record| record.amount)
        .sum();

    let mut report = DailyReport {
        date: target_date,
        total_amount,
        transaction_count: records.len(),
        top_merchants,
        month_to_date,
        body: String::new(),
    };
    report.body = render_body(&report, &records);

    Ok(report)
}

/// Sum amounts per merchant and keep the `limit` largest.
///
/// Ordered by summed amount descending; merchants with equal totals are
/// ordered alphabetically.
fn top_merchants(records: &[TransactionRecord], limit: usize) -> Vec<MerchantTotal> {
    let mut totals: HashMap<&str, f64> = HashMap::new();

    for record in records {
        *totals.entry(record.merchant.as_str()).or_insert(0.0) += record.amount;
    }

    let mut merchants: Vec<MerchantTotal> = totals
        .into_iter()
        .map(|(merchant, amount)| MerchantTotal {
            merchant: merchant.to_owned(),
            amount,
        })
        .collect();

    merchants.sort_by(|a, b| {
        b.amount
            .total_cmp(&a.amount)
            .then_with(|| a.merchant.cmp(&b.merchant))
    });
    merchants.truncate(limit);

    merchants
}

/// Render the plain-text report body for subscribers of the report topic.
fn render_body(report: &DailyReport, records: &[TransactionRecord]) -> String {
    if records.is_empty() {
        return format!("No transactions found for {}.", report.date);
    }

    let mut lines = vec![
        format!("Daily Spending Report for {}", report.date),
        String::new(),
        "Transactions:".to_owned(),
    ];

    for record in records {
        lines.push(format!("${:.2} at {}", record.amount, record.merchant));
    }

    lines.push(String::new());
    lines.push("Top merchants:".to_owned());

    for merchant_total in &report.top_merchants {
        lines.push(format!(
            "{}: ${:.2}",
            merchant_total.merchant, merchant_total.amount
        ));
    }

    lines.push(String::new());
    lines.push(format!("Total Spent: ${:.2}", report.total_amount));
    lines.push(format!(
        "Total Spent This Month: ${:.2}",
        report.month_to_date
    ));

    lines.join("\n")
}

/// The next time the daily report should run at or after `now`.
///
/// An out-of-range `report_hour_utc` is clamped to 23; configuration
/// loading already rejects such values at startup.
pub fn next_run_after(now: OffsetDateTime, report_hour_utc: u8) -> OffsetDateTime {
    let run_time =
        Time::from_hms(report_hour_utc.min(23), 0, 0).expect("a clamped hour is a valid time");
    let today_run = now.replace_time(run_time);

    if today_run > now {
        today_run
    } else {
        today_run + time::Duration::days(1)
    }
}

/// Run the aggregation job once per day at the configured UTC hour,
/// reporting on the previous day.
///
/// Runs never overlap: the schedule is a single task that awaits each run to
/// completion, including its retries, before sleeping until the next tick.
/// A run that still fails after [RETRY_LIMIT] retries is logged and dropped;
/// the next day's run is unaffected, and the missed date can be recomputed
/// by replaying the job for that date.
pub async fn run_report_scheduler<Q, R>(config: AppConfig, query: Q, channel: R)
where
    Q: RecordQuery,
    R: ReportChannel,
{
    loop {
        let now = OffsetDateTime::now_utc();
        let next_run = next_run_after(now, config.report_hour_utc);
        let wait = next_run - now;

        tracing::info!(%next_run, "report scheduler sleeping until next run");
        tokio::time::sleep(Duration::from_secs_f64(wait.as_seconds_f64().max(0.0))).await;

        let target_date = next_run.date().previous_day().unwrap_or(next_run.date());
        run_with_retries(&config, &query, &channel, target_date).await;
    }
}

/// Run and publish the report for `target_date`, retrying transient query
/// and publish failures.
async fn run_with_retries<Q, R>(config: &AppConfig, query: &Q, channel: &R, target_date: Date)
where
    Q: RecordQuery,
    R: ReportChannel,
{
    for attempt in 1..=RETRY_LIMIT {
        match run_daily(query, target_date, config.top_merchant_limit)
            .and_then(|report| channel.publish(&report).map(|()| report))
        {
            Ok(report) => {
                tracing::info!(
                    date = %report.date,
                    transaction_count = report.transaction_count,
                    total_amount = report.total_amount,
                    "published daily spending report"
                );

                return;
            }
            Err(error) if attempt < RETRY_LIMIT => {
                tracing::warn!(
                    date = %target_date,
                    attempt,
                    "report run failed, retrying after backoff: {error}"
                );
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
            Err(error) => {
                tracing::error!(
                    date = %target_date,
                    "report run failed after {RETRY_LIMIT} attempts, giving up until \
                     the next scheduled run: {error}"
                );
            }
        }
    }
}


#[cfg(test)]
mod run_with_retries_tests {
    use std::sync::{Arc, Mutex};

    use time::macros::date;

    use crate::{
        Error,
        channels::MemoryReportChannel,
        config::AppConfig,
        models::TransactionRecord,
        report::run_with_retries,
        stores::RecordQuery,
    };

    /// A query engine that is unavailable for a set number of calls before
    /// recovering, like a catalog that has not yet discovered a partition.
    #[derive(Clone)]
    struct FlakyQuery {
        remaining_failures: Arc<Mutex<u32>>,
        records: Vec<TransactionRecord>,
    }

    impl FlakyQuery {
        fn new(failures: u32, records: Vec<TransactionRecord>) -> Self {
            Self {
                remaining_failures: Arc::new(Mutex::new(failures)),
                records,
            }
        }

        fn take_failure(&self) -> bool {
            let mut remaining = self.remaining_failures.lock().unwrap();

            if *remaining > 0 {
                *remaining -= 1;
                true
            } else {
                false
            }
        }
    }

    impl RecordQuery for FlakyQuery {
        fn records_for(&self, date: time::Date) -> Result<Vec<TransactionRecord>, Error> {
            self.records_between(date, date)
        }

        fn records_between(
            &self,
            start: time::Date,
            end: time::Date,
        ) -> Result<Vec<TransactionRecord>, Error> {
            if self.take_failure() {
                return Err(Error::Query("query engine unavailable".to_owned()));
            }

            Ok(self
                .records
                .iter()
                .filter(|record| (start..=end).contains(&record.date))
                .cloned()
                .collect())
        }
    }

    fn record(id: &str, amount: f64, date: time::Date) -> TransactionRecord {
        TransactionRecord {
            id: id.to_owned(),
            amount,
            merchant: "Acme Store".to_owned(),
            date,
            source_key: format!("inbound/{id}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_run_is_retried_and_published_once() {
        let query = FlakyQuery::new(1, vec![record("aaa", 42.10, date!(2025 - 06 - 12))]);
        let channel = MemoryReportChannel::new();

        run_with_retries(
            &AppConfig::default_config(),
            &query,
            &channel,
            date!(2025 - 06 - 12),
        )
        .await;

        let published = channel.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].transaction_count, 1);
        assert_eq!(published[0].total_amount, 42.10);
        assert_eq!(*query.remaining_failures.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_gives_up_after_exhausting_retries() {
        let query = FlakyQuery::new(u32::MAX, Vec::new());
        let channel = MemoryReportChannel::new();

        run_with_retries(
            &AppConfig::default_config(),
            &query,
            &channel,
            date!(2025 - 06 - 12),
        )
        .await;

        assert!(channel.published().is_empty());
    }
}
