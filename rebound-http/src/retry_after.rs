//! `Retry-After` header parsing.

use std::time::{Duration, SystemTime};
use thiserror::Error;

/// A `Retry-After` value that could not be turned into a delay.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryAfterError {
    /// The header held a negative number of seconds.
    #[error("negative Retry-After value: {0}")]
    Negative(i64),

    /// The header was neither an integer nor an HTTP date.
    #[error("invalid Retry-After value: {value:?}")]
    InvalidDate {
        /// The raw header value.
        value: String,
    },

    /// The header held an HTTP date that has already passed.
    #[error("Retry-After date is in the past: {0}")]
    DateInPast(String),
}

/// Parse a `Retry-After` value relative to the current time.
///
/// An empty value yields a zero delay.
pub fn parse_retry_after(value: &str) -> Result<Duration, RetryAfterError> {
    parse_retry_after_at(value, SystemTime::now())
}

/// Parse a `Retry-After` value relative to `now`.
///
/// The value is either a non-negative integer number of seconds or an HTTP
/// date, in which case the delay is the time from `now` until that date.
pub fn parse_retry_after_at(value: &str, now: SystemTime) -> Result<Duration, RetryAfterError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(Duration::ZERO);
    }

    if let Ok(seconds) = value.parse::<i64>() {
        return u64::try_from(seconds)
            .map(Duration::from_secs)
            .map_err(|_| RetryAfterError::Negative(seconds));
    }

    let date = httpdate::parse_http_date(value).map_err(|_| RetryAfterError::InvalidDate {
        value: value.to_string(),
    })?;

    date.duration_since(now)
        .map_err(|_| RetryAfterError::DateInPast(httpdate::fmt_http_date(date)))
}
