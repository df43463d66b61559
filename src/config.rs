//! Process-wide configuration, loaded once at startup.

use std::env;

use crate::{Error, extract::ExtractionPattern};

/// The default alert threshold in the account currency.
pub const DEFAULT_THRESHOLD_AMOUNT: f64 = 150.0;

/// The default extraction pattern: amount first, merchant second.
pub const DEFAULT_EXTRACTION_PATTERN: &str = r"Your card was charged \$([0-9.]+) at ([^.]+)\.";

/// How many deliveries a notification gets before it is dead-lettered.
pub const DEFAULT_MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// The UTC hour at which the daily report runs.
pub const DEFAULT_REPORT_HOUR_UTC: u8 = 6;

/// How many merchants the daily report lists.
pub const DEFAULT_TOP_MERCHANT_LIMIT: usize = 5;

/// The immutable configuration shared by every worker and the report
/// scheduler.
///
/// Loaded once at process start and passed explicitly into each component;
/// nothing in the pipeline reads the environment after startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Transactions strictly above this amount raise an alert.
    pub threshold_amount: f64,
    /// The compiled two-group extraction pattern.
    pub pattern: ExtractionPattern,
    /// How many deliveries a notification gets before dead-lettering.
    pub max_delivery_attempts: u32,
    /// The UTC hour of day the aggregation job runs at.
    pub report_hour_utc: u8,
    /// How many merchants to include in the daily report's top list.
    pub top_merchant_limit: usize,
}

impl AppConfig {
    /// Build a configuration from the defaults.
    pub fn default_config() -> Self {
        Self {
            threshold_amount: DEFAULT_THRESHOLD_AMOUNT,
            pattern: ExtractionPattern::new(DEFAULT_EXTRACTION_PATTERN)
                .expect("the default extraction pattern must compile"),
            max_delivery_attempts: DEFAULT_MAX_DELIVERY_ATTEMPTS,
            report_hour_utc: DEFAULT_REPORT_HOUR_UTC,
            top_merchant_limit: DEFAULT_TOP_MERCHANT_LIMIT,
        }
    }

    /// Load the configuration from environment variables, falling back to
    /// the defaults for unset values.
    ///
    /// Recognised variables: `HIGH_VALUE_THRESHOLD`,
    /// `AMOUNT_MERCHANT_PATTERN`, `MAX_DELIVERY_ATTEMPTS`,
    /// `REPORT_HOUR_UTC`, and `TOP_MERCHANT_LIMIT`.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::InvalidConfig] if a numeric variable does not parse or is
    ///   out of range,
    /// - [Error::InvalidPattern] or [Error::PatternArity] if the extraction
    ///   pattern is unusable.
    ///
    /// A configuration mistake is a startup failure, not a silent
    /// per-message failure.
    pub fn from_env() -> Result<Self, Error> {
        let threshold_amount = parse_env("HIGH_VALUE_THRESHOLD", DEFAULT_THRESHOLD_AMOUNT)?;

        let pattern_text = env::var("AMOUNT_MERCHANT_PATTERN")
            .unwrap_or_else(|_| DEFAULT_EXTRACTION_PATTERN.to_owned());
        let pattern = ExtractionPattern::new(&pattern_text)?;

        let max_delivery_attempts: u32 =
            parse_env("MAX_DELIVERY_ATTEMPTS", DEFAULT_MAX_DELIVERY_ATTEMPTS)?;
        if max_delivery_attempts == 0 {
            return Err(Error::InvalidConfig(
                "MAX_DELIVERY_ATTEMPTS must be at least 1".to_owned(),
            ));
        }

        let report_hour_utc: u8 = parse_env("REPORT_HOUR_UTC", DEFAULT_REPORT_HOUR_UTC)?;
        if report_hour_utc > 23 {
            return Err(Error::InvalidConfig(
                "REPORT_HOUR_UTC must be between 0 and 23".to_owned(),
            ));
        }

        let top_merchant_limit = parse_env("TOP_MERCHANT_LIMIT", DEFAULT_TOP_MERCHANT_LIMIT)?;

        Ok(Self {
            threshold_amount,
            pattern,
            max_delivery_attempts,
            report_hour_utc,
            top_merchant_limit,
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, Error> {
    match env::var(name) {
        Ok(text) => text
            .parse()
            .map_err(|_| Error::InvalidConfig(format!("could not parse {name}=\"{text}\""))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod config_tests {
    use crate::config::AppConfig;

    #[test]
    fn default_config_compiles_default_pattern() {
        let config = AppConfig::default_config();

        assert_eq!(config.threshold_amount, 150.0);
        assert_eq!(config.max_delivery_attempts, 3);
        assert_eq!(config.top_merchant_limit, 5);
        assert_eq!(
            config.pattern.as_str(),
            r"Your card was charged \$([0-9.]+) at ([^.]+)\."
        );
    }
}
