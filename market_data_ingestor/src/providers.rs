//! Provider abstraction for market data sources.
//!
//! This module defines the [`DataProvider`] and [`OptionChainProvider`] traits, which
//! serve as unified interfaces for fetching daily bars and option chains from any
//! market data vendor (e.g., Alpaca).
//!
//! Each concrete provider implementation should implement these traits to handle
//! vendor-specific API logic and validation.
//!
//! The traits are designed for async usage and support dynamic dispatch
//! (`dyn DataProvider`) for runtime selection of providers.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use market_data_ingestor::models::{
//!     bar_series::BarSeries,
//!     request_params::BarsRequestParams,
//! };
//! use market_data_ingestor::providers::{DataProvider, ProviderError};
//!
//! struct MyProvider;
//!
//! #[async_trait]
//! impl DataProvider for MyProvider {
//!     async fn fetch_bars(
//!         &self,
//!         _params: BarsRequestParams,
//!     ) -> Result<Vec<BarSeries>, ProviderError> {
//!         Ok(vec![])
//!     }
//! }
//! ```
//!

pub mod alpaca_rest;

use async_trait::async_trait;
use shared_utils::env::MissingEnvVarError;
use snafu::{Backtrace, Snafu};

use crate::models::{
    bar_series::BarSeries,
    option::OptionContract,
    request_params::{BarsRequestParams, OptionChainRequest},
};

/// Trait for fetching time-series bar data from a market data provider.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetches time-series bar data for the given request parameters.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<BarSeries>)` - One bar series per symbol the vendor had data for.
    ///   Symbols without data are simply absent.
    /// * `Err(ProviderError)` - If the request fails.
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError>;
}

/// Trait for listing the option contracts written on an underlying.
#[async_trait]
pub trait OptionChainProvider: Send + Sync {
    /// Fetches the current option chain snapshot for `request.underlying`.
    ///
    /// An underlying without listed options yields `Ok(vec![])`.
    async fn fetch_option_chain(
        &self,
        request: OptionChainRequest,
    ) -> Result<Vec<OptionContract>, ProviderError>;
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// missed environment variable.
    #[snafu(display("Missing environment variable: {source}"))]
    MissingEnvVar {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// API key contains invalid characters.
    #[snafu(display("Invalid API key format: {source}"))]
    InvalidApiKey {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a provider implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// An error during an API request (e.g., network failure, timeout).
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The provider's API answered with a non-success status.
    #[snafu(display("API error ({status}): {message}"))]
    Api {
        status: u16,
        message: String,
        backtrace: Backtrace,
    },

    /// The request parameters were invalid for this specific provider.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },

    /// An internal error occurred while processing data within the provider.
    #[snafu(display("Internal provider error: {message}"))]
    Internal {
        message: String,
        backtrace: Backtrace,
    },
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;

    struct AlpacaLike;
    struct EmptyVendor;

    #[async_trait]
    impl DataProvider for AlpacaLike {
        async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
            Ok(params
                .symbols
                .into_iter()
                .map(|s| BarSeries::new(s, params.timeframe.clone(), vec![]))
                .collect())
        }
    }

    #[async_trait]
    impl DataProvider for EmptyVendor {
        async fn fetch_bars(&self, _params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
            ValidationSnafu {
                message: "no such feed",
            }
            .fail()
        }
    }

    fn get_provider(name: &str) -> Box<dyn DataProvider> {
        if name == "alpaca" {
            Box::new(AlpacaLike)
        } else {
            Box::new(EmptyVendor)
        }
    }

    #[tokio::test]
    async fn test_dynamic_provider() {
        let provider = get_provider("alpaca");
        let params = BarsRequestParams::trailing_daily("AAPL", Utc::now(), 365);

        let result = provider.fetch_bars(params).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].symbol, "AAPL");
    }

    #[tokio::test]
    async fn test_provider_error_display() {
        let provider = get_provider("other");
        let params = BarsRequestParams::trailing_daily("AAPL", Utc::now(), 365);

        let err = provider.fetch_bars(params).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid parameters for provider: no such feed");
    }
}
