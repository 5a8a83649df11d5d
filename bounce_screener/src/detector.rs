//! Bounce detection over a warm-up-pruned series.

use chrono::NaiveDate;

use crate::moving_average::{MovingAverageSpec, PrunedSeries};

/// Low tolerance of the superseded near-touch rule: the low may sit up to 2% above
/// the average.
pub const NEAR_TOUCH_TOLERANCE: f64 = 0.02;

/// Bars inspected by the pierce rule, counted back from the latest session.
pub const PIERCE_LOOKBACK: usize = 2;

/// Which bounce condition to apply.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BounceRule {
    /// One of the last two bars traded below the average and closed above it:
    /// `low < ma && close > ma`, both strict.
    #[default]
    Pierce,

    /// Superseded rule. The latest bar closed above the average and its low came
    /// within `tolerance` of it from above: `low <= ma * (1 + tolerance) && close > ma`.
    NearTouch { tolerance: f64 },
}

impl BounceRule {
    pub fn near_touch() -> Self {
        BounceRule::NearTouch {
            tolerance: NEAR_TOUCH_TOLERANCE,
        }
    }

    fn lookback(&self) -> usize {
        match self {
            BounceRule::Pierce => PIERCE_LOOKBACK,
            BounceRule::NearTouch { .. } => 1,
        }
    }

    fn matches(&self, low: f64, close: f64, average: f64) -> bool {
        match *self {
            BounceRule::Pierce => low < average && close > average,
            BounceRule::NearTouch { tolerance } => {
                low <= average * (1.0 + tolerance) && close > average
            }
        }
    }
}

/// A bounce found on one bar against one average.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub spec: MovingAverageSpec,
    /// Index into [`PrunedSeries::bars`].
    pub bar_index: usize,
    pub date: NaiveDate,
    /// Close of the triggering bar.
    pub close: f64,
    /// Value of the triggering average on that bar.
    pub average: f64,
}

/// Scans the trailing bars of `pruned` oldest first and, within each bar, the
/// averages in configured order. The first match wins.
///
/// Series shorter than the rule's lookback are scanned in full; an empty series
/// never matches.
pub fn detect(pruned: &PrunedSeries, rule: BounceRule) -> Option<Detection> {
    let bars = pruned.bars();
    let start = bars.len().saturating_sub(rule.lookback());

    for (bar_index, bar) in bars.iter().enumerate().skip(start) {
        for average in pruned.averages() {
            let Some(&value) = average.values.get(bar_index) else {
                continue;
            };
            if rule.matches(bar.low, bar.close, value) {
                return Some(Detection {
                    spec: average.spec,
                    bar_index,
                    date: bar.session_date(),
                    close: bar.close,
                    average: value,
                });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use market_data_ingestor::models::{bar::Bar, bar_series::BarSeries, timeframe::TimeFrame};
    use std::num::NonZeroUsize;

    use super::*;
    use crate::moving_average::prune;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    /// Flat closes at 100 with the trailing bars replaced by `(low, close)` pairs.
    fn series_with_tail(len: usize, tail: &[(f64, f64)]) -> BarSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 5, 0, 0).unwrap();
        let mut bars: Vec<Bar> = (0..len)
            .map(|i| Bar {
                timestamp: start + Duration::days(i as i64),
                open: 100.0,
                high: 100.5,
                low: 99.5,
                close: 100.0,
                volume: 1_000.0,
                trade_count: None,
                vwap: None,
            })
            .collect();
        let offset = len - tail.len();
        for (i, &(low, close)) in tail.iter().enumerate() {
            let bar = &mut bars[offset + i];
            bar.low = low;
            bar.close = close;
            bar.high = close.max(bar.high);
        }
        BarSeries::new("TEST", TimeFrame::day(), bars)
    }

    #[test]
    fn no_match_when_lows_stay_above() {
        let series = series_with_tail(3, &[(101.0, 102.0), (101.0, 102.0)]);
        let pruned = prune(series, &[MovingAverageSpec::simple(nz(1))]).unwrap();
        assert!(detect(&pruned, BounceRule::Pierce).is_none());
    }

    #[test]
    fn single_bar_is_still_scanned() {
        // A period-1 average equals the close, so the strict close test fails.
        let series = series_with_tail(1, &[(99.0, 101.0)]);
        let pruned = prune(series, &[MovingAverageSpec::exponential(nz(1))]).unwrap();
        assert_eq!(pruned.len(), 1);
        assert!(detect(&pruned, BounceRule::Pierce).is_none());
    }

    #[test]
    fn near_touch_checks_only_latest_bar() {
        let specs = [MovingAverageSpec::simple(nz(10))];

        // Latest bar: low 101.5 within 2% above the ~100.x average, close above it.
        let series = series_with_tail(12, &[(99.0, 101.0), (101.5, 102.0)]);
        let pruned = prune(series, &specs).unwrap();
        let hit = detect(&pruned, BounceRule::near_touch()).unwrap();
        assert_eq!(hit.bar_index, pruned.len() - 1);
        assert_eq!(hit.close, 102.0);

        // Same tail, but the latest bar's low is far above: the older bar would pass
        // the pierce rule, the near-touch rule never looks at it.
        let series = series_with_tail(12, &[(99.0, 101.0), (110.0, 111.0)]);
        let pruned = prune(series, &specs).unwrap();
        assert!(detect(&pruned, BounceRule::near_touch()).is_none());
        assert!(detect(&pruned, BounceRule::Pierce).is_some());
    }

    #[test]
    fn near_touch_boundary_is_inclusive() {
        let rule = BounceRule::NearTouch { tolerance: 0.5 };
        assert!(rule.matches(150.0, 101.0, 100.0));
        assert!(!rule.matches(150.5, 151.0, 100.0));
        assert!(!rule.matches(90.0, 100.0, 100.0));
    }
}
