//! Pattern-based extraction of transaction details from notification bodies.
//!
//! A single configurable pattern with two capture groups (amount, merchant)
//! decides whether a message describes a card transaction at all, and if so,
//! what was charged where. A body that does not match is a normal outcome,
//! not an error: most messages are not transaction notifications.

use regex::Regex;

use crate::{Error, models::Extracted};

/// The number of capture groups an extraction pattern must have: one for the
/// amount, one for the merchant, in that order.
pub const CAPTURE_GROUP_COUNT: usize = 2;

/// A compiled extraction pattern, validated to have exactly two capture
/// groups.
///
/// Compiling and checking the group arity happens once at configuration load,
/// so a bad pattern is a startup failure rather than a silent per-message
/// failure.
#[derive(Debug, Clone)]
pub struct ExtractionPattern {
    regex: Regex,
}

impl ExtractionPattern {
    /// Compile `pattern` and check it has exactly two capture groups.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::InvalidPattern] if `pattern` is not a valid regular
    ///   expression,
    /// - or [Error::PatternArity] if it does not have exactly two capture
    ///   groups.
    pub fn new(pattern: &str) -> Result<Self, Error> {
        let regex = Regex::new(pattern)
            .map_err(|error| Error::InvalidPattern(pattern.to_owned(), error.to_string()))?;

        // captures_len counts the implicit group 0 for the whole match.
        let group_count = regex.captures_len() - 1;

        if group_count != CAPTURE_GROUP_COUNT {
            return Err(Error::PatternArity(pattern.to_owned(), group_count));
        }

        Ok(Self { regex })
    }

    /// The pattern source string, for logging.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Apply `pattern` to `body` and parse out the transaction details.
///
/// Matching is case-sensitive and uses the first match only; a body with
/// several matches yields the first.
///
/// Returns `Ok(None)` when the pattern does not match, i.e. the message is
/// not a transaction notification.
///
/// # Errors
/// A body that matches the pattern but carries unusable captures is
/// permanently unprocessable and will return a:
/// - [Error::UnparseableAmount] if the amount capture is not a decimal with
///   at most two fractional digits,
/// - [Error::NonPositiveAmount] if the amount is zero or negative,
/// - or [Error::EmptyMerchant] if the merchant capture is empty after
///   trimming whitespace.
pub fn extract(body: &str, pattern: &ExtractionPattern) -> Result<Option<Extracted>, Error> {
    let Some(captures) = pattern.regex.captures(body) else {
        return Ok(None);
    };

    // Arity was checked at compile time, so both groups participate whenever
    // the pattern matches.
    let amount_text = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
    let merchant_text = captures.get(2).map(|m| m.as_str()).unwrap_or_default();

    let amount = parse_amount(amount_text)?;
    let merchant = merchant_text.trim();

    if merchant.is_empty() {
        return Err(Error::EmptyMerchant);
    }

    Ok(Some(Extracted {
        amount,
        merchant: merchant.to_owned(),
    }))
}

/// Parse an amount capture as a positive decimal with at most two fractional
/// digits.
fn parse_amount(text: &str) -> Result<f64, Error> {
    let error = || Error::UnparseableAmount(text.to_owned());

    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (text, None),
    };

    if whole.is_empty() || !whole.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(error());
    }

    if let Some(fraction) = fraction {
        if fraction.is_empty()
            || fraction.len() > 2
            || !fraction.bytes().all(|byte| byte.is_ascii_digit())
        {
            return Err(error());
        }
    }

    let amount: f64 = text.parse().map_err(|_| error())?;

    if amount <= 0.0 {
        return Err(Error::NonPositiveAmount(amount));
    }

    Ok(amount)
}


#[cfg(test)]
mod extract_tests {
    use crate::{
        Error,
        extract::{ExtractionPattern, extract},
        models::Extracted,
    };

    fn default_pattern() -> ExtractionPattern {
        ExtractionPattern::new(r"Your card was charged \$([0-9.]+) at ([^.]+)\.").unwrap()
    }

    #[test]
    fn extracts_amount_and_merchant() {
        let body = "Your card was charged $142.50 at Blue Bottle Coffee.";

        let result = extract(body, &default_pattern());

        assert_eq!(
            result,
            Ok(Some(Extracted {
                amount: 142.50,
                merchant: "Blue Bottle Coffee".to_owned(),
            }))
        );
    }

    #[test]
    fn non_transaction_body_is_no_match() {
        let body = "Your package has shipped.";

        let result = extract(body, &default_pattern());

        assert_eq!(result, Ok(None));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let body = "YOUR CARD WAS CHARGED $10.00 at Acme.";

        let result = extract(body, &default_pattern());

        assert_eq!(result, Ok(None));
    }

    #[test]
    fn uses_first_match_only() {
        let body = "Your card was charged $5.00 at First Cafe. \
            Your card was charged $9.00 at Second Cafe.";

        let result = extract(body, &default_pattern());

        assert_eq!(
            result,
            Ok(Some(Extracted {
                amount: 5.00,
                merchant: "First Cafe".to_owned(),
            }))
        );
    }

    #[test]
    fn whole_number_amount_parses() {
        let body = "Your card was charged $42 at Acme Store.";

        let result = extract(body, &default_pattern());

        assert_eq!(
            result,
            Ok(Some(Extracted {
                amount: 42.0,
                merchant: "Acme Store".to_owned(),
            }))
        );
    }

    #[test]
    fn malformed_amount_is_unprocessable() {
        let body = "Your card was charged $12.3.4 at Acme Store.";

        let result = extract(body, &default_pattern());

        assert_eq!(result, Err(Error::UnparseableAmount("12.3.4".to_owned())));
    }

    #[test]
    fn too_many_fractional_digits_is_unprocessable() {
        let body = "Your card was charged $12.345 at Acme Store.";

        let result = extract(body, &default_pattern());

        assert_eq!(result, Err(Error::UnparseableAmount("12.345".to_owned())));
    }

    #[test]
    fn zero_amount_is_unprocessable() {
        let body = "Your card was charged $0.00 at Acme Store.";

        let result = extract(body, &default_pattern());

        assert_eq!(result, Err(Error::NonPositiveAmount(0.0)));
    }

    #[test]
    fn whitespace_merchant_is_unprocessable() {
        let pattern = ExtractionPattern::new(r"charged \$([0-9.]+) at(.*)\.").unwrap();
        let body = "Your card was charged $12.00 at .";

        let result = extract(body, &pattern);

        assert_eq!(result, Err(Error::EmptyMerchant));
    }

    #[test]
    fn merchant_is_trimmed() {
        let pattern = ExtractionPattern::new(r"charged \$([0-9.]+) at(.*)\.").unwrap();
        let body = "Your card was charged $12.00 at  Corner Dairy .";

        let result = extract(body, &pattern);

        assert_eq!(
            result,
            Ok(Some(Extracted {
                amount: 12.00,
                merchant: "Corner Dairy".to_owned(),
            }))
        );
    }
}
