use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    models::{asset::AssetClass, option::OptionKind, timeframe::TimeFrame},
    providers::alpaca_rest::AlpacaBarsParams,
};

/// Universal parameters for requesting time-series bar data from any market data provider.
///
/// This struct is designed to be vendor-agnostic. It is intended as the standard input
/// for all [`DataProvider`](crate::providers::DataProvider) implementations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BarsRequestParams {
    /// List of symbols to request (e.g., `["AAPL"]`).
    pub symbols: Vec<String>,

    /// The time interval for each bar (e.g., 1 minute, 1 day).
    ///
    /// **Validation of allowed values is performed by each data provider
    /// implementation, according to their own API rules.**
    pub timeframe: TimeFrame,

    /// Start of the requested time range (inclusive, UTC).
    pub start: DateTime<Utc>,

    /// End of the requested time range (exclusive, UTC).
    pub end: DateTime<Utc>,

    /// The asset class for the requested symbols.
    ///
    /// This helps providers route the request to the correct API or endpoint.
    pub asset_class: AssetClass,

    /// Optional, provider-specific parameters.
    #[serde(default)]
    pub provider_specific: ProviderParams,
}

impl BarsRequestParams {
    /// Daily bars for one equity symbol covering the trailing `days` calendar days
    /// up to `end`.
    pub fn trailing_daily(symbol: impl Into<String>, end: DateTime<Utc>, days: i64) -> Self {
        Self {
            symbols: vec![symbol.into()],
            timeframe: TimeFrame::day(),
            start: end - chrono::Duration::days(days),
            end,
            asset_class: AssetClass::UsEquity,
            provider_specific: ProviderParams::None,
        }
    }
}

/// An enum to hold provider-specific request parameters.
///
/// This allows callers to specify detailed, per-request options for a
/// particular provider without cluttering the universal `BarsRequestParams`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum ProviderParams {
    #[default]
    None,
    Alpaca(AlpacaBarsParams),
}

/// Parameters for listing the option contracts written on one underlying.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OptionChainRequest {
    /// Underlying equity symbol (e.g., "AAPL").
    pub underlying: String,

    /// Restrict to calls or puts; `None` returns both sides.
    pub kind: Option<OptionKind>,

    /// Only contracts expiring on or after this date.
    pub expiration_from: Option<NaiveDate>,

    /// Only contracts expiring on or before this date.
    pub expiration_to: Option<NaiveDate>,
}

impl OptionChainRequest {
    pub fn calls(underlying: impl Into<String>) -> Self {
        Self {
            underlying: underlying.into(),
            kind: Some(OptionKind::Call),
            expiration_from: None,
            expiration_to: None,
        }
    }

    /// Restricts the request to contracts expiring within `from..=to`.
    pub fn expiring_between(mut self, from: NaiveDate, to: Option<NaiveDate>) -> Self {
        self.expiration_from = Some(from);
        self.expiration_to = to;
        self
    }
}
