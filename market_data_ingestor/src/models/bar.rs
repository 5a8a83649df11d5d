//! Canonical in-memory representation of a time-series bar (OHLCV).
//!
//! This struct is used as the standard output for all [`DataProvider`](crate::providers::DataProvider)
//! implementations, regardless of asset class.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::America::New_York;
use serde::{Deserialize, Serialize};

/// A single time-series bar (OHLCV) for a given timestamp.
///
/// This struct is vendor-agnostic and is used throughout the screening pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// The timestamp for this bar (UTC).
    pub timestamp: DateTime<Utc>,

    /// Opening price.
    pub open: f64,

    /// Highest price during the bar interval.
    pub high: f64,

    /// Lowest price during the bar interval.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Volume traded during the bar interval.
    pub volume: f64,

    /// Trade count for the bar. Not all providers supply this.
    pub trade_count: Option<u64>,

    /// Volume-weighted average price. Not all providers supply this.
    pub vwap: Option<f64>,
}

impl Bar {
    /// The exchange-local trading date this bar belongs to.
    ///
    /// Daily bars are stamped at New York midnight (04:00 or 05:00 UTC).
    pub fn session_date(&self) -> NaiveDate {
        self.timestamp.with_timezone(&New_York).date_naive()
    }

    /// Returns the name of the first OHLC field that is not a positive finite number.
    pub(crate) fn first_invalid_price(&self) -> Option<(&'static str, f64)> {
        [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ]
        .into_iter()
        .find(|(_, v)| !(v.is_finite() && *v > 0.0))
    }
}
