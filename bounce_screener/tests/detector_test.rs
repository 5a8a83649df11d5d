mod common;
use common::{bounce_off_50_sma, flat_bars, with_tail};

use std::num::NonZeroUsize;

use bounce_screener::{
    detector::{BounceRule, detect},
    moving_average::{MovingAverageSpec, prune},
};
use market_data_ingestor::models::{bar::Bar, bar_series::BarSeries, timeframe::TimeFrame};

fn sma(period: usize) -> MovingAverageSpec {
    MovingAverageSpec::simple(NonZeroUsize::new(period).unwrap())
}

fn ema(period: usize) -> MovingAverageSpec {
    MovingAverageSpec::exponential(NonZeroUsize::new(period).unwrap())
}

fn series(bars: Vec<Bar>) -> BarSeries {
    BarSeries::new("TEST", TimeFrame::day(), bars)
}

#[test]
fn pierce_on_second_to_last_bar() {
    let pruned = prune(series(bounce_off_50_sma()), &[sma(50)]).unwrap();
    let hit = detect(&pruned, BounceRule::Pierce).unwrap();

    assert_eq!(hit.spec.label(), "50-SMA");
    assert_eq!(hit.close, 101.0);
    assert_eq!(hit.average, 100.0);
    assert_eq!(hit.bar_index, pruned.len() - 2);
    assert_eq!(hit.date, pruned.bars()[hit.bar_index].session_date());
}

#[test]
fn low_equal_to_average_does_not_pierce() {
    // 5-SMA on the last bar is (4 * 100 + 105) / 5 = 101, exactly the low.
    let bars = with_tail(flat_bars(20), &[(101.0, 105.0)]);
    let pruned = prune(series(bars), &[sma(5)]).unwrap();
    assert_eq!(pruned.average(&sma(5)).unwrap().values.last(), Some(&101.0));
    assert!(detect(&pruned, BounceRule::Pierce).is_none());
}

#[test]
fn close_equal_to_average_does_not_recover() {
    // Flat closes: every average equals the close while lows sit below it.
    let pruned = prune(series(flat_bars(20)), &[sma(5), sma(10)]).unwrap();
    assert!(detect(&pruned, BounceRule::Pierce).is_none());
}

#[test]
fn bars_older_than_two_sessions_are_ignored() {
    // The pierce happens three bars back; the last two bars stay above.
    let bars = with_tail(
        flat_bars(20),
        &[(99.0, 101.0), (101.5, 102.0), (102.5, 103.0)],
    );
    let pruned = prune(series(bars), &[sma(5)]).unwrap();
    assert!(detect(&pruned, BounceRule::Pierce).is_none());
}

#[test]
fn earliest_bar_wins_over_spec_order() {
    // Both recent bars pierce the 10-SMA; the older bar is reported.
    let bars = with_tail(flat_bars(20), &[(99.0, 101.0), (99.5, 101.5)]);
    let pruned = prune(series(bars), &[sma(10)]).unwrap();
    let hit = detect(&pruned, BounceRule::Pierce).unwrap();
    assert_eq!(hit.bar_index, pruned.len() - 2);
    assert_eq!(hit.close, 101.0);
}

#[test]
fn spec_order_decides_within_a_bar() {
    let bars = bounce_off_50_sma();
    for (specs, expected) in [([sma(50), ema(5)], "50-SMA"), ([ema(5), sma(50)], "5-EMA")] {
        let pruned = prune(series(bars.clone()), &specs).unwrap();
        let hit = detect(&pruned, BounceRule::Pierce).unwrap();
        assert_eq!(hit.spec.label(), expected);
        assert_eq!(hit.close, 101.0);
    }
}

#[test]
fn near_touch_is_only_used_when_selected() {
    // Low 0.5% above the 5-SMA on the last bar: a near touch, not a pierce.
    let bars = with_tail(flat_bars(20), &[(101.5, 105.0)]);
    let pruned = prune(series(bars), &[sma(5)]).unwrap();

    assert!(detect(&pruned, BounceRule::Pierce).is_none());
    let hit = detect(&pruned, BounceRule::near_touch()).unwrap();
    assert_eq!(hit.bar_index, pruned.len() - 1);
    assert_eq!(hit.average, 101.0);
}
