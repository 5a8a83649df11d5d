//! A collection of time-series bars for a specific symbol and timeframe.

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{bar::Bar, timeframe::TimeFrame};

/// Ways a [`BarSeries`] can break its ordering or price invariants.
#[derive(Debug, Error, PartialEq)]
pub enum BarSeriesError {
    #[error("bar {index} on {date} does not follow the previous session {previous}")]
    NonIncreasingDate {
        index: usize,
        previous: NaiveDate,
        date: NaiveDate,
    },

    #[error("bar {index} has invalid {field} price {value}")]
    InvalidPrice {
        index: usize,
        field: &'static str,
        value: f64,
    },
}

/// Represents a complete set of time-series data for a single symbol.
///
/// This struct groups a vector of [`Bar`]s with their corresponding symbol
/// and [`TimeFrame`], making the data set self-describing.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    /// The symbol this data represents (e.g., "AAPL").
    pub symbol: String,
    /// The time interval for each bar in the series.
    pub timeframe: TimeFrame,
    /// The collection of OHLCV bars, oldest first.
    pub bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(symbol: impl Into<String>, timeframe: TimeFrame, bars: Vec<Bar>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Checks that session dates strictly increase and that every OHLC value is a
    /// positive finite number.
    pub fn validate(&self) -> Result<(), BarSeriesError> {
        let mut previous: Option<NaiveDate> = None;
        for (index, bar) in self.bars.iter().enumerate() {
            if let Some((field, value)) = bar.first_invalid_price() {
                return Err(BarSeriesError::InvalidPrice {
                    index,
                    field,
                    value,
                });
            }

            let date = bar.session_date();
            if let Some(previous) = previous {
                if date <= previous {
                    return Err(BarSeriesError::NonIncreasingDate {
                        index,
                        previous,
                        date,
                    });
                }
            }
            previous = Some(date);
        }
        Ok(())
    }
}
