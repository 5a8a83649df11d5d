//! Moving averages of closing price and warm-up pruning.
//!
//! A [`MovingAverageSpec`] names one average by period and kind, and its label
//! (`"50-SMA"`, `"5-EMA"`) is both its display form and its configuration form.
//!
//! Every average is aligned to the bar axis of the input series: position `i` of a
//! [`MovingAverageSeries`] belongs to bar `i`, with `None` while the average is
//! warming up. Both kinds warm up for `period - 1` bars. The exponential average is
//! seeded from the first close and therefore has a value from bar 0; those early
//! values are masked the same way the simple average's undefined prefix is.
//!
//! [`prune`] then keeps only the trailing bars where *every* requested average is
//! defined. That [`PrunedSeries`] is what the detector inspects and what a chart
//! renderer draws.

use std::{fmt, num::NonZeroUsize, str::FromStr};

use chrono::NaiveDate;
use market_data_ingestor::models::{bar::Bar, bar_series::BarSeries};
use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How closes are weighted inside the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovingAverageKind {
    /// Unweighted mean of the last `period` closes.
    Simple,
    /// Recursive average with smoothing factor `2 / (period + 1)`.
    Exponential,
}

impl MovingAverageKind {
    fn suffix(self) -> &'static str {
        match self {
            MovingAverageKind::Simple => "SMA",
            MovingAverageKind::Exponential => "EMA",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseSpecError {
    #[error("moving average '{0}' must look like '<period>-SMA' or '<period>-EMA'")]
    Malformed(String),

    #[error("moving average '{0}' has a zero period")]
    ZeroPeriod(String),
}

/// One moving average to compute: a kind and a period in bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MovingAverageSpec {
    kind: MovingAverageKind,
    period: NonZeroUsize,
}

impl MovingAverageSpec {
    pub const fn new(kind: MovingAverageKind, period: NonZeroUsize) -> Self {
        Self { kind, period }
    }

    pub const fn simple(period: NonZeroUsize) -> Self {
        Self::new(MovingAverageKind::Simple, period)
    }

    pub const fn exponential(period: NonZeroUsize) -> Self {
        Self::new(MovingAverageKind::Exponential, period)
    }

    pub const fn kind(&self) -> MovingAverageKind {
        self.kind
    }

    pub const fn period(&self) -> NonZeroUsize {
        self.period
    }

    /// Display and lookup label, e.g. `"50-SMA"`.
    pub fn label(&self) -> String {
        self.to_string()
    }

    /// Number of leading bars without a usable value.
    pub fn warm_up(&self) -> usize {
        self.period.get() - 1
    }

    /// The averages offered to users, in the default scan order.
    pub fn reference_catalog() -> Vec<Self> {
        vec![
            Self::exponential(nonzero!(5usize)),
            Self::exponential(nonzero!(10usize)),
            Self::simple(nonzero!(50usize)),
            Self::simple(nonzero!(100usize)),
            Self::simple(nonzero!(150usize)),
            Self::simple(nonzero!(200usize)),
        ]
    }

    pub fn is_in_reference_catalog(&self) -> bool {
        Self::reference_catalog().contains(self)
    }

    /// Computes this average over `closes`, aligned to the same axis.
    pub fn compute(&self, closes: &[f64]) -> MovingAverageSeries {
        let values = match self.kind {
            MovingAverageKind::Simple => simple_moving_average(closes, self.period),
            MovingAverageKind::Exponential => exponential_moving_average(closes, self.period),
        };
        MovingAverageSeries { spec: *self, values }
    }
}

impl fmt::Display for MovingAverageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.period, self.kind.suffix())
    }
}

impl FromStr for MovingAverageSpec {
    type Err = ParseSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        let malformed = || ParseSpecError::Malformed(label.to_string());

        let (period, suffix) = label.split_once('-').ok_or_else(malformed)?;
        let kind = match suffix.trim().to_ascii_uppercase().as_str() {
            "SMA" => MovingAverageKind::Simple,
            "EMA" => MovingAverageKind::Exponential,
            _ => return Err(malformed()),
        };
        let period: usize = period.trim().parse().map_err(|_| malformed())?;
        let period =
            NonZeroUsize::new(period).ok_or_else(|| ParseSpecError::ZeroPeriod(label.to_string()))?;

        Ok(Self::new(kind, period))
    }
}

impl TryFrom<String> for MovingAverageSpec {
    type Error = ParseSpecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MovingAverageSpec> for String {
    fn from(spec: MovingAverageSpec) -> Self {
        spec.label()
    }
}

/// Simple moving average aligned to `closes`; `None` for the first `period - 1` bars.
///
/// Each window is summed on its own rather than maintained as a running sum, so the
/// first defined value is exactly the mean of the first `period` closes.
pub fn simple_moving_average(closes: &[f64], period: NonZeroUsize) -> Vec<Option<f64>> {
    let p = period.get();
    let warm_up = (p - 1).min(closes.len());

    std::iter::repeat_n(None, warm_up)
        .chain(
            closes
                .windows(p)
                .map(|window| Some(window.iter().sum::<f64>() / p as f64)),
        )
        .collect()
}

/// Exponentially smoothed closes: `out[0] = closes[0]`,
/// `out[i] = alpha * closes[i] + (1 - alpha) * out[i - 1]`.
pub fn exponential_smoothing(closes: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(closes.len());
    let mut prev: Option<f64> = None;
    for &close in closes {
        let value = match prev {
            None => close,
            Some(prev) => alpha * close + (1.0 - alpha) * prev,
        };
        out.push(value);
        prev = Some(value);
    }
    out
}

/// Smoothing factor for an exponential average spanning `period` bars.
pub fn ema_alpha(period: NonZeroUsize) -> f64 {
    2.0 / (period.get() as f64 + 1.0)
}

/// Exponential moving average aligned to `closes`, with the first `period - 1`
/// values masked as warm-up.
pub fn exponential_moving_average(closes: &[f64], period: NonZeroUsize) -> Vec<Option<f64>> {
    let warm_up = period.get() - 1;
    exponential_smoothing(closes, ema_alpha(period))
        .into_iter()
        .enumerate()
        .map(|(i, v)| (i >= warm_up).then_some(v))
        .collect()
}

/// One computed average aligned to its source series.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverageSeries {
    pub spec: MovingAverageSpec,
    pub values: Vec<Option<f64>>,
}

impl MovingAverageSeries {
    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }
}

/// Computes every spec over the closes of `series`, preserving spec order.
pub fn compute_all(series: &BarSeries, specs: &[MovingAverageSpec]) -> Vec<MovingAverageSeries> {
    let closes = series.closes();
    specs.iter().map(|spec| spec.compute(&closes)).collect()
}

/// Not enough bars for the longest requested average.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("insufficient history: {required} bars required, {available} available")]
pub struct InsufficientHistory {
    pub required: usize,
    pub available: usize,
}

/// An average restricted to the pruned window; every value is defined.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedAverage {
    pub spec: MovingAverageSpec,
    pub values: Vec<f64>,
}

/// The trailing bars of a series on which every requested average is defined,
/// together with those averages. Average order is the configured scan order.
#[derive(Debug, Clone, PartialEq)]
pub struct PrunedSeries {
    symbol: String,
    bars: Vec<Bar>,
    averages: Vec<AlignedAverage>,
}

impl PrunedSeries {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn averages(&self) -> &[AlignedAverage] {
        &self.averages
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(Bar::session_date).collect()
    }

    pub fn average(&self, spec: &MovingAverageSpec) -> Option<&AlignedAverage> {
        self.averages.iter().find(|a| a.spec == *spec)
    }
}

/// Computes `specs` over `series` and drops every bar where any of them is still
/// warming up.
///
/// Consumes the series: the surviving bars move into the result.
pub fn prune(
    series: BarSeries,
    specs: &[MovingAverageSpec],
) -> Result<PrunedSeries, InsufficientHistory> {
    let required = specs
        .iter()
        .map(|s| s.period().get())
        .max()
        .unwrap_or(1);
    let available = series.len();
    // `required >= 1`, so an accepted series always keeps at least one bar.
    if available < required {
        return Err(InsufficientHistory {
            required,
            available,
        });
    }

    let start = required - 1;
    let averages = compute_all(&series, specs)
        .into_iter()
        .map(|ma| AlignedAverage {
            spec: ma.spec,
            values: ma.values.into_iter().skip(start).flatten().collect(),
        })
        .collect();

    let BarSeries { symbol, bars, .. } = series;
    Ok(PrunedSeries {
        symbol,
        bars: bars.into_iter().skip(start).collect(),
        averages,
    })
}
