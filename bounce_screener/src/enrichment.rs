//! Best-effort implied volatility of the at-the-money call.
//!
//! Nothing here is allowed to fail a screen: every problem is returned as an
//! [`EnrichmentIssue`] which the caller turns into the `"N/A"` sentinel plus a
//! warning.

use std::{fmt, time::Duration};

use chrono::{Days, NaiveDate};
use market_data_ingestor::{
    models::{
        option::{OptionContract, OptionKind},
        request_params::OptionChainRequest,
    },
    providers::{OptionChainProvider, ProviderError},
};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Rendered in place of a volatility figure that could not be obtained.
pub const NOT_AVAILABLE: &str = "N/A";

/// Implied volatility as shown in a report row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImpliedVolatility {
    /// Fraction, e.g. `0.2871` for 28.71%.
    Available(f64),
    NotAvailable,
}

impl ImpliedVolatility {
    pub fn value(&self) -> Option<f64> {
        match self {
            ImpliedVolatility::Available(v) => Some(*v),
            ImpliedVolatility::NotAvailable => None,
        }
    }
}

impl fmt::Display for ImpliedVolatility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImpliedVolatility::Available(v) => write!(f, "{:.2}%", v * 100.0),
            ImpliedVolatility::NotAvailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

impl Serialize for ImpliedVolatility {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Error)]
pub enum EnrichmentIssue {
    #[error("option chain request failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("option chain request timed out after {0:?}")]
    Timeout(Duration),

    #[error("no call contracts listed")]
    EmptyChain,

    #[error("{contract} carries no implied volatility")]
    MissingImpliedVolatility { contract: String },

    #[error("{contract} has unusable implied volatility {value}")]
    InvalidImpliedVolatility { contract: String, value: f64 },
}

/// Among the calls of the nearest expiration in `contracts`, the one whose strike is
/// closest to `reference_price`. Equal distances resolve to the lower strike.
pub fn select_at_the_money_call(
    contracts: &[OptionContract],
    reference_price: f64,
) -> Option<&OptionContract> {
    let calls = || contracts.iter().filter(|c| c.kind == OptionKind::Call);
    let nearest_expiration = calls().map(|c| c.expiration).min()?;

    calls()
        .filter(|c| c.expiration == nearest_expiration)
        .min_by(|a, b| {
            let da = (a.strike - reference_price).abs();
            let db = (b.strike - reference_price).abs();
            da.total_cmp(&db)
                .then_with(|| a.strike.total_cmp(&b.strike))
                .then_with(|| a.symbol.cmp(&b.symbol))
        })
}

/// The contract's implied volatility if it is present, finite and strictly
/// positive. Infinite quotes are rejected like NaN.
pub fn implied_volatility_of(contract: &OptionContract) -> Result<f64, EnrichmentIssue> {
    match contract.implied_volatility {
        None => Err(EnrichmentIssue::MissingImpliedVolatility {
            contract: contract.symbol.clone(),
        }),
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        Some(value) => Err(EnrichmentIssue::InvalidImpliedVolatility {
            contract: contract.symbol.clone(),
            value,
        }),
    }
}

/// Days past the session date covered by the first, bounded chain request.
pub const NEAR_EXPIRY_WINDOW_DAYS: u64 = 7;

/// Fetches the call chain for `ticker` and returns the implied volatility of the
/// call nearest to `reference_price`.
///
/// Only expirations within [`NEAR_EXPIRY_WINDOW_DAYS`] of `as_of` are requested
/// first; the full chain from `as_of` on is fetched when that window lists no call.
pub async fn enrich(
    provider: &dyn OptionChainProvider,
    ticker: &str,
    reference_price: f64,
    as_of: NaiveDate,
    timeout: Duration,
) -> Result<f64, EnrichmentIssue> {
    let window_end = as_of.checked_add_days(Days::new(NEAR_EXPIRY_WINDOW_DAYS));
    let near = OptionChainRequest::calls(ticker).expiring_between(as_of, window_end);
    let mut contracts = fetch_chain(provider, near, timeout).await?;

    if select_at_the_money_call(&contracts, reference_price).is_none() {
        tracing::debug!(%ticker, %as_of, "no call expiring this week, fetching full chain");
        let full = OptionChainRequest::calls(ticker).expiring_between(as_of, None);
        contracts = fetch_chain(provider, full, timeout).await?;
    }

    let contract =
        select_at_the_money_call(&contracts, reference_price).ok_or(EnrichmentIssue::EmptyChain)?;
    tracing::debug!(
        %ticker,
        contract = %contract.symbol,
        strike = contract.strike,
        expiration = %contract.expiration,
        "selected at-the-money call"
    );
    implied_volatility_of(contract)
}

async fn fetch_chain(
    provider: &dyn OptionChainProvider,
    request: OptionChainRequest,
    timeout: Duration,
) -> Result<Vec<OptionContract>, EnrichmentIssue> {
    let contracts = tokio::time::timeout(timeout, provider.fetch_option_chain(request))
        .await
        .map_err(|_| EnrichmentIssue::Timeout(timeout))??;
    Ok(contracts)
}
