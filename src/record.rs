//! Builds canonical [TransactionRecord]s from extracted notification data.

use sha2::{Digest, Sha256};

use crate::models::{Extracted, RawNotification, TransactionRecord};

/// How many bytes of the SHA-256 digest make up a record id.
///
/// 16 bytes (32 hex characters) keeps keys short while leaving collisions
/// out of practical reach.
const RECORD_ID_BYTES: usize = 16;

/// Derives the stable record identity for a notification source key.
///
/// The id is a pure function of the source key, so redelivery of the same
/// notification, whether from at-least-once queue semantics or a manual
/// replay, always lands on the same record.
pub fn record_id(source_key: &str) -> String {
    let digest = Sha256::digest(source_key.as_bytes());

    digest[..RECORD_ID_BYTES]
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Build the canonical [TransactionRecord] for a notification and its
/// extracted fields.
///
/// The record date comes from the notification's received time truncated to
/// a UTC date; the message body is never consulted for a timestamp. Pure,
/// no side effects.
pub fn normalize(notification: &RawNotification, extracted: Extracted) -> TransactionRecord {
    TransactionRecord {
        id: record_id(&notification.source_key),
        amount: extracted.amount,
        merchant: extracted.merchant,
        date: notification.received_at.date(),
        source_key: notification.source_key.clone(),
    }
}

#[cfg(test)]
mod record_tests {
    use time::macros::datetime;

    use crate::{
        models::{Extracted, RawNotification},
        record::{normalize, record_id},
    };

    fn sample_notification() -> RawNotification {
        RawNotification {
            source_key: "inbound/2025-06-12/message-001".to_owned(),
            body: "Your card was charged $42.10 at Acme Store.".to_owned(),
            received_at: datetime!(2025-06-12 16:45:00 UTC),
            delivery_attempt: 1,
        }
    }

    #[test]
    fn record_id_is_deterministic() {
        assert_eq!(
            record_id("inbound/2025-06-12/message-001"),
            record_id("inbound/2025-06-12/message-001")
        );
    }

    #[test]
    fn record_id_differs_between_source_keys() {
        assert_ne!(
            record_id("inbound/2025-06-12/message-001"),
            record_id("inbound/2025-06-12/message-002")
        );
    }

    #[test]
    fn record_id_is_hex_of_fixed_length() {
        let id = record_id("inbound/2025-06-12/message-001");

        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|character| character.is_ascii_hexdigit()));
    }

    #[test]
    fn normalize_is_deterministic() {
        let notification = sample_notification();
        let extracted = Extracted {
            amount: 42.10,
            merchant: "Acme Store".to_owned(),
        };

        let first = normalize(&notification, extracted.clone());
        let second = normalize(&notification, extracted);

        assert_eq!(first, second);
    }

    #[test]
    fn normalize_truncates_received_time_to_date() {
        let notification = sample_notification();
        let extracted = Extracted {
            amount: 42.10,
            merchant: "Acme Store".to_owned(),
        };

        let record = normalize(&notification, extracted);

        assert_eq!(record.date, time::macros::date!(2025 - 06 - 12));
    }

    #[test]
    fn redelivery_produces_identical_identity() {
        let first_delivery = sample_notification();
        let second_delivery = RawNotification {
            delivery_attempt: 2,
            received_at: datetime!(2025-06-12 16:47:30 UTC),
            ..first_delivery.clone()
        };
        let extracted = Extracted {
            amount: 42.10,
            merchant: "Acme Store".to_owned(),
        };

        let first = normalize(&first_delivery, extracted.clone());
        let second = normalize(&second_delivery, extracted);

        assert_eq!(first.id, second.id);
    }
}
