//! Screener configuration: TOML loading, ticker-list parsing and pre-flight
//! validation.
//!
//! [`ScreenerConfig`] is the user-facing, loosely typed shape (what the TOML file
//! and CLI flags fill in). [`ScreenerConfig::validate`] turns it into a
//! [`ValidatedConfig`], and only a validated config can start a screen, so an empty
//! ticker list or an empty moving-average selection is rejected before any request
//! leaves the process.
//!
//! ```toml
//! tickers = ["AAPL", "MSFT"]
//! moving_averages = ["5-EMA", "50-SMA", "200-SMA"]
//! rule = "pierce"
//! max_concurrency = 4
//!
//! [alpaca]
//! feed = "iex"
//! ```

use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    time::Duration,
};

use indexmap::IndexSet;
use market_data_ingestor::providers::alpaca_rest::AlpacaProviderConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    detector::{BounceRule, NEAR_TOUCH_TOLERANCE},
    moving_average::{MovingAverageSpec, ParseSpecError},
};

/// Errors that reject a screen before it starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Please enter at least one stock ticker")]
    NoTickers,

    #[error("Please select at least one moving average")]
    NoMovingAverages,

    #[error(transparent)]
    InvalidMovingAverage(#[from] ParseSpecError),

    #[error("moving average '{0}' is not offered; choose from {1}")]
    UnsupportedMovingAverage(String, String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("near-touch tolerance must be a non-negative number, got {0}")]
    InvalidTolerance(f64),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Bounce rule names accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuleName {
    #[default]
    Pierce,
    NearTouch,
}

/// Screener settings as read from a TOML file and CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScreenerConfig {
    /// Ticker symbols, normalised by [`normalize_tickers`].
    pub tickers: Vec<String>,
    /// Text file with one ticker per line, appended after `tickers`.
    pub tickers_file: Option<PathBuf>,
    /// Moving-average labels in scan order, e.g. `"50-SMA"`.
    pub moving_averages: Vec<String>,
    pub rule: RuleName,
    /// Only read when `rule = "near_touch"`.
    pub near_touch_tolerance: f64,
    /// Calendar days of daily bars to request.
    pub lookback_days: u32,
    pub max_concurrency: usize,
    /// Upper bound for each network call (bars, option chain).
    pub fetch_timeout_secs: u64,
    pub enrich_implied_volatility: bool,
    pub alpaca: AlpacaProviderConfig,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            tickers: Vec::new(),
            tickers_file: None,
            moving_averages: MovingAverageSpec::reference_catalog()
                .iter()
                .map(MovingAverageSpec::label)
                .collect(),
            rule: RuleName::default(),
            near_touch_tolerance: NEAR_TOUCH_TOLERANCE,
            lookback_days: 365,
            max_concurrency: 4,
            fetch_timeout_secs: 20,
            enrich_implied_volatility: true,
            alpaca: AlpacaProviderConfig::default(),
        }
    }
}

/// A configuration that passed [`ScreenerConfig::validate`].
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub tickers: Vec<String>,
    pub specs: Vec<MovingAverageSpec>,
    pub rule: BounceRule,
    pub lookback_days: i64,
    pub max_concurrency: NonZeroUsize,
    pub fetch_timeout: Duration,
    pub enrich_implied_volatility: bool,
}

impl ScreenerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolves the ticker file, parses labels and checks every limit.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        let mut raw = self.tickers.clone();
        if let Some(path) = &self.tickers_file {
            let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            raw.extend(text.lines().map(str::to_string));
        }
        let tickers = normalize_tickers(raw.iter().map(String::as_str));
        if tickers.is_empty() {
            return Err(ConfigError::NoTickers);
        }

        let specs = parse_moving_averages(&self.moving_averages)?;
        if specs.is_empty() {
            return Err(ConfigError::NoMovingAverages);
        }

        let rule = match self.rule {
            RuleName::Pierce => BounceRule::Pierce,
            RuleName::NearTouch => {
                let tolerance = self.near_touch_tolerance;
                if !(tolerance.is_finite() && tolerance >= 0.0) {
                    return Err(ConfigError::InvalidTolerance(tolerance));
                }
                BounceRule::NearTouch { tolerance }
            }
        };

        if self.lookback_days == 0 {
            return Err(ConfigError::Zero("lookback_days"));
        }
        let max_concurrency =
            NonZeroUsize::new(self.max_concurrency).ok_or(ConfigError::Zero("max_concurrency"))?;
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Zero("fetch_timeout_secs"));
        }

        Ok(ValidatedConfig {
            tickers,
            specs,
            rule,
            lookback_days: i64::from(self.lookback_days),
            max_concurrency,
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            enrich_implied_volatility: self.enrich_implied_volatility,
        })
    }
}

/// Trims and uppercases each entry, drops blanks and repeats (first occurrence
/// wins). Symbols are not checked here; the screen skips ones it cannot fetch.
pub fn normalize_tickers<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = IndexSet::new();
    for entry in raw {
        let ticker = entry.trim().to_uppercase();
        if !ticker.is_empty() {
            seen.insert(ticker);
        }
    }
    seen.into_iter().collect()
}

/// Whether `ticker` only uses characters a listed equity symbol can carry.
pub fn is_well_formed_ticker(ticker: &str) -> bool {
    !ticker.is_empty()
        && ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

/// Splits free text (one ticker per line, as typed into a text box) into tickers.
pub fn parse_ticker_list(text: &str) -> Vec<String> {
    normalize_tickers(text.lines())
}

/// Parses labels in order, keeping the first of any repeats, and checks each one
/// against [`MovingAverageSpec::reference_catalog`].
pub fn parse_moving_averages(labels: &[String]) -> Result<Vec<MovingAverageSpec>, ConfigError> {
    let mut specs = IndexSet::new();
    for label in labels {
        let spec: MovingAverageSpec = label.parse()?;
        if !spec.is_in_reference_catalog() {
            let offered = MovingAverageSpec::reference_catalog()
                .iter()
                .map(MovingAverageSpec::label)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ConfigError::UnsupportedMovingAverage(spec.label(), offered));
        }
        specs.insert(spec);
    }
    Ok(specs.into_iter().collect())
}
