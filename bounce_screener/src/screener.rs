//! The screening pipeline.
//!
//! For every ticker of a batch: fetch a trailing year of daily bars, compute the
//! configured averages, detect a bounce and, on a match, look up the implied
//! volatility of the at-the-money call. Tickers are processed concurrently with a
//! bounded worker count; the batch is always reassembled in input order.
//!
//! Per-instrument problems are contained: they are recorded as a
//! [`SkippedInstrument`] and/or a [`ScreeningWarning`] and never abort the batch.

use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, NaiveDate, Utc};
use futures::{StreamExt, stream};
use market_data_ingestor::{
    models::{bar_series::BarSeries, request_params::BarsRequestParams},
    providers::{DataProvider, OptionChainProvider, ProviderError, alpaca_rest::AlpacaProvider},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    config::{ScreenerConfig, ValidatedConfig, is_well_formed_ticker},
    detector::{Detection, detect},
    enrichment::{ImpliedVolatility, enrich},
    errors::ScreenError,
    moving_average::{InsufficientHistory, MovingAverageSpec, PrunedSeries, prune},
};

/// One report row: an instrument that bounced off one of the configured averages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BounceResult {
    pub ticker: String,
    pub bounced_off: MovingAverageSpec,
    /// Close of the triggering bar.
    pub close: f64,
    /// Session date of the triggering bar.
    pub date: NaiveDate,
    /// `None` when enrichment is switched off.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implied_volatility: Option<ImpliedVolatility>,
}

/// A matched instrument together with everything a chart needs.
#[derive(Debug, Clone)]
pub struct ScreenedInstrument {
    pub result: BounceResult,
    pub detection: Detection,
    pub pruned: PrunedSeries,
}

/// Why a ticker produced no result.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The provider returned nothing for the symbol, or a series that failed
    /// validation.
    NoData,
    InsufficientHistory(InsufficientHistory),
    NoBounce,
    /// Provider error or timeout; the message is kept for the report.
    FetchFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoData => f.write_str("no data"),
            SkipReason::InsufficientHistory(shortfall) => write!(f, "{shortfall}"),
            SkipReason::NoBounce => f.write_str("no bounce"),
            SkipReason::FetchFailed(message) => write!(f, "fetch failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedInstrument {
    pub ticker: String,
    pub reason: SkipReason,
}

/// Where in the pipeline a warning was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningStage {
    Fetch,
    Validation,
    Enrichment,
}

impl fmt::Display for WarningStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WarningStage::Fetch => "fetch",
            WarningStage::Validation => "validation",
            WarningStage::Enrichment => "enrichment",
        })
    }
}

/// A non-fatal problem met while screening one ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningWarning {
    pub ticker: String,
    pub stage: WarningStage,
    pub message: String,
}

impl ScreeningWarning {
    fn new(ticker: &str, stage: WarningStage, message: impl Into<String>) -> Self {
        Self {
            ticker: ticker.to_string(),
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for ScreeningWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.ticker, self.stage, self.message)
    }
}

/// Reported once per finished ticker, in completion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreeningProgress {
    pub completed: usize,
    pub total: usize,
    pub ticker: String,
}

/// Everything a run produced, in the order the tickers were supplied.
#[derive(Debug, Clone, Default)]
pub struct ScreeningBatch {
    pub instruments: Vec<ScreenedInstrument>,
    pub skipped: Vec<SkippedInstrument>,
    pub warnings: Vec<ScreeningWarning>,
}

impl ScreeningBatch {
    pub fn results(&self) -> impl Iterator<Item = &BounceResult> + '_ {
        self.instruments.iter().map(|i| &i.result)
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    fn from_reports(reports: impl IntoIterator<Item = InstrumentReport>) -> Self {
        let mut batch = Self::default();
        for report in reports {
            batch.warnings.extend(report.warnings);
            match report.outcome {
                Outcome::Matched(instrument) => batch.instruments.push(*instrument),
                Outcome::Skipped(reason) => batch.skipped.push(SkippedInstrument {
                    ticker: report.ticker,
                    reason,
                }),
            }
        }
        batch
    }
}

enum Outcome {
    Matched(Box<ScreenedInstrument>),
    Skipped(SkipReason),
}

struct InstrumentReport {
    ticker: String,
    outcome: Outcome,
    warnings: Vec<ScreeningWarning>,
}

#[derive(Debug, Error)]
enum FetchFailure {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Runs a validated configuration against a bar provider and, optionally, an option
/// chain provider.
pub struct Screener {
    bars: Arc<dyn DataProvider>,
    options: Option<Arc<dyn OptionChainProvider>>,
    config: ValidatedConfig,
}

impl Screener {
    pub fn new(bars: Arc<dyn DataProvider>, config: ValidatedConfig) -> Self {
        Self {
            bars,
            options: None,
            config,
        }
    }

    pub fn with_option_chain(mut self, options: Arc<dyn OptionChainProvider>) -> Self {
        self.options = Some(options);
        self
    }

    /// Validates `config` and wires a single [`AlpacaProvider`] as both the bar and
    /// the option chain source.
    ///
    /// Credentials come from `APCA_API_KEY_ID` and `APCA_API_SECRET_KEY`.
    pub fn alpaca(config: &ScreenerConfig) -> Result<Self, ScreenError> {
        let validated = config.validate()?;
        let provider = Arc::new(AlpacaProvider::with_config(config.alpaca.clone())?);
        Ok(Self::new(provider.clone(), validated).with_option_chain(provider))
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    /// Screens every configured ticker with bars up to now.
    pub async fn run(&self, progress: impl FnMut(ScreeningProgress)) -> ScreeningBatch {
        self.run_as_of(Utc::now(), progress).await
    }

    /// Screens every configured ticker with bars up to `as_of`.
    pub async fn run_as_of(
        &self,
        as_of: DateTime<Utc>,
        mut progress: impl FnMut(ScreeningProgress),
    ) -> ScreeningBatch {
        let tickers = &self.config.tickers;
        let total = tickers.len();
        info!(
            total,
            concurrency = self.config.max_concurrency.get(),
            "screening started"
        );

        let mut reports = Vec::with_capacity(total);
        let mut pending = stream::iter(tickers.iter().enumerate())
            .map(|(position, ticker)| async move {
                (position, self.screen_instrument(ticker, as_of).await)
            })
            .buffer_unordered(self.config.max_concurrency.get());

        while let Some((position, report)) = pending.next().await {
            progress(ScreeningProgress {
                completed: reports.len() + 1,
                total,
                ticker: report.ticker.clone(),
            });
            reports.push((position, report));
        }
        reports.sort_by_key(|(position, _)| *position);

        let batch = ScreeningBatch::from_reports(reports.into_iter().map(|(_, report)| report));
        info!(
            matched = batch.instruments.len(),
            skipped = batch.skipped.len(),
            warnings = batch.warnings.len(),
            "screening finished"
        );
        batch
    }

    async fn screen_instrument(&self, ticker: &str, as_of: DateTime<Utc>) -> InstrumentReport {
        let mut warnings = Vec::new();
        let outcome = self.evaluate(ticker, as_of, &mut warnings).await;
        InstrumentReport {
            ticker: ticker.to_string(),
            outcome,
            warnings,
        }
    }

    async fn evaluate(
        &self,
        ticker: &str,
        as_of: DateTime<Utc>,
        warnings: &mut Vec<ScreeningWarning>,
    ) -> Outcome {
        if !is_well_formed_ticker(ticker) {
            warn!(%ticker, "unsupported ticker symbol, skipping");
            warnings.push(ScreeningWarning::new(
                ticker,
                WarningStage::Validation,
                format!("unsupported ticker symbol '{ticker}'"),
            ));
            return Outcome::Skipped(SkipReason::NoData);
        }

        let series = match self.fetch_series(ticker, as_of).await {
            Ok(Some(series)) => series,
            Ok(None) => {
                info!(%ticker, "no data returned, skipping");
                return Outcome::Skipped(SkipReason::NoData);
            }
            Err(e) => {
                warn!(%ticker, error = %e, "bar fetch failed");
                let message = e.to_string();
                warnings.push(ScreeningWarning::new(ticker, WarningStage::Fetch, &message));
                return Outcome::Skipped(SkipReason::FetchFailed(message));
            }
        };

        if let Err(e) = series.validate() {
            warn!(%ticker, error = %e, "discarding malformed bar series");
            warnings.push(ScreeningWarning::new(
                ticker,
                WarningStage::Validation,
                e.to_string(),
            ));
            return Outcome::Skipped(SkipReason::NoData);
        }

        let pruned = match prune(series, &self.config.specs) {
            Ok(pruned) => pruned,
            Err(shortfall) => {
                info!(
                    %ticker,
                    required = shortfall.required,
                    available = shortfall.available,
                    "insufficient history, skipping"
                );
                return Outcome::Skipped(SkipReason::InsufficientHistory(shortfall));
            }
        };

        let Some(detection) = detect(&pruned, self.config.rule) else {
            debug!(%ticker, bars = pruned.len(), "no bounce");
            return Outcome::Skipped(SkipReason::NoBounce);
        };
        debug!(
            %ticker,
            bounced_off = %detection.spec,
            close = detection.close,
            average = detection.average,
            date = %detection.date,
            "bounce detected"
        );

        let implied_volatility = if self.config.enrich_implied_volatility {
            Some(
                self.implied_volatility(ticker, &detection, &pruned, warnings)
                    .await,
            )
        } else {
            None
        };

        Outcome::Matched(Box::new(ScreenedInstrument {
            result: BounceResult {
                ticker: ticker.to_string(),
                bounced_off: detection.spec,
                close: detection.close,
                date: detection.date,
                implied_volatility,
            },
            detection,
            pruned,
        }))
    }

    /// The series for `ticker`, or `None` if the provider had no bars for it.
    async fn fetch_series(
        &self,
        ticker: &str,
        as_of: DateTime<Utc>,
    ) -> Result<Option<BarSeries>, FetchFailure> {
        let params = BarsRequestParams::trailing_daily(ticker, as_of, self.config.lookback_days);
        let timeout = self.config.fetch_timeout;
        let fetched = tokio::time::timeout(timeout, self.bars.fetch_bars(params))
            .await
            .map_err(|_| FetchFailure::Timeout(timeout))??;

        Ok(fetched
            .into_iter()
            .find(|s| s.symbol.eq_ignore_ascii_case(ticker))
            .filter(|s| !s.is_empty()))
    }

    async fn implied_volatility(
        &self,
        ticker: &str,
        detection: &Detection,
        pruned: &PrunedSeries,
        warnings: &mut Vec<ScreeningWarning>,
    ) -> ImpliedVolatility {
        let Some(options) = &self.options else {
            warnings.push(ScreeningWarning::new(
                ticker,
                WarningStage::Enrichment,
                "no option chain provider configured",
            ));
            return ImpliedVolatility::NotAvailable;
        };

        // Expirations are looked up from the latest session, not the triggering bar.
        let session = pruned
            .bars()
            .last()
            .map_or(detection.date, |bar| bar.session_date());

        match enrich(
            options.as_ref(),
            ticker,
            detection.close,
            session,
            self.config.fetch_timeout,
        )
        .await
        {
            Ok(iv) => ImpliedVolatility::Available(iv),
            Err(issue) => {
                warn!(%ticker, error = %issue, "implied volatility unavailable");
                warnings.push(ScreeningWarning::new(
                    ticker,
                    WarningStage::Enrichment,
                    issue.to_string(),
                ));
                ImpliedVolatility::NotAvailable
            }
        }
    }
}

/// Validates `config` and screens it. A configuration error is returned before any
/// provider is called.
pub async fn screen(
    bars: Arc<dyn DataProvider>,
    options: Option<Arc<dyn OptionChainProvider>>,
    config: &ScreenerConfig,
    progress: impl FnMut(ScreeningProgress),
) -> Result<ScreeningBatch, ScreenError> {
    let validated = config.validate()?;
    let mut screener = Screener::new(bars, validated);
    if let Some(options) = options {
        screener = screener.with_option_chain(options);
    }
    Ok(screener.run(progress).await)
}
