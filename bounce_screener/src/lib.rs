//! Screens equities for bounces off simple and exponential moving averages.
//!
//! A bounce is a daily bar that traded below one of the configured averages and
//! closed back above it within the latest two sessions. Matches are optionally
//! enriched with the implied volatility of the at-the-money call, which makes the
//! output a candidate list for cash-secured puts.
//!
//! The crate is organised as a one-way pipeline:
//!
//! - [`moving_average`]: the averages and warm-up pruning.
//! - [`detector`]: the bounce rules.
//! - [`enrichment`]: best-effort implied volatility lookup.
//! - [`screener`]: concurrent fan-out over a ticker list and batch assembly.
//! - [`report`]: text table and chart documents.
//!
//! Bars and option chains come from any
//! [`DataProvider`](market_data_ingestor::providers::DataProvider) /
//! [`OptionChainProvider`](market_data_ingestor::providers::OptionChainProvider).

pub mod config;
pub mod detector;
pub mod enrichment;
pub mod errors;
pub mod moving_average;
pub mod report;
pub mod screener;

pub use config::{ConfigError, ScreenerConfig, ValidatedConfig};
pub use errors::ScreenError;
pub use screener::{BounceResult, Screener, ScreeningBatch, ScreeningProgress, screen};
