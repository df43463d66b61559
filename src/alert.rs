//! Threshold evaluation for normalized transaction records.

use crate::models::{AlertEvent, TransactionRecord};

/// Evaluate `record` against the configured threshold.
///
/// Returns an [AlertEvent] if and only if the amount is strictly greater
/// than `threshold`; an amount exactly equal to the threshold does not
/// alert.
///
/// The caller publishes the returned event once per processing attempt.
/// Because the queue delivers at-least-once, a redelivered notification can
/// alert again for the same source key; the alert channel is documented as
/// at-least-once and subscribers must deduplicate if they need to.
pub fn evaluate(record: &TransactionRecord, threshold: f64) -> Option<AlertEvent> {
    if record.amount <= threshold {
        return None;
    }

    Some(AlertEvent {
        amount: record.amount,
        merchant: record.merchant.clone(),
        source_key: record.source_key.clone(),
        threshold,
        message: format!(
            "High value transaction detected: ${:.2} at {}",
            record.amount, record.merchant
        ),
    })
}

#[cfg(test)]
mod evaluate_tests {
    use time::macros::date;

    use crate::{alert::evaluate, models::TransactionRecord};

    fn record_with_amount(amount: f64) -> TransactionRecord {
        TransactionRecord {
            id: "6c31b792d17f2463eb848dfa15c64a2a".to_owned(),
            amount,
            merchant: "Best Buy".to_owned(),
            date: date!(2025 - 06 - 12),
            source_key: "inbound/2025-06-12/message-001".to_owned(),
        }
    }

    #[test]
    fn amount_above_threshold_alerts() {
        let alert = evaluate(&record_with_amount(200.00), 150.0);

        let alert = alert.expect("expected an alert for an amount above the threshold");
        assert_eq!(alert.amount, 200.00);
        assert_eq!(alert.merchant, "Best Buy");
        assert_eq!(alert.threshold, 150.0);
        assert_eq!(
            alert.message,
            "High value transaction detected: $200.00 at Best Buy"
        );
    }

    #[test]
    fn amount_equal_to_threshold_does_not_alert() {
        assert_eq!(evaluate(&record_with_amount(150.00), 150.0), None);
    }

    #[test]
    fn amount_one_cent_above_threshold_alerts() {
        assert!(evaluate(&record_with_amount(150.01), 150.0).is_some());
    }

    #[test]
    fn amount_below_threshold_does_not_alert() {
        assert_eq!(evaluate(&record_with_amount(142.50), 150.0), None);
    }
}
