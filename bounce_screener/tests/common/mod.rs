#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bounce_screener::{ScreenerConfig, ValidatedConfig};
use chrono::{DateTime, TimeZone, Utc};
use market_data_ingestor::{
    models::{
        bar::Bar, bar_series::BarSeries, option::OptionContract,
        request_params::{BarsRequestParams, OptionChainRequest},
    },
    providers::{ApiSnafu, DataProvider, OptionChainProvider, ProviderError},
};

/// Fixed "now" for pipeline runs.
pub fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 21, 0, 0).unwrap()
}

/// `len` consecutive daily bars closing at 100 with lows at 99.5.
pub fn flat_bars(len: usize) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 6, 3, 20, 0, 0).unwrap();
    (0..len)
        .map(|i| Bar {
            timestamp: start + chrono::Duration::days(i as i64),
            open: 100.0,
            high: 100.5,
            low: 99.5,
            close: 100.0,
            volume: 1_000_000.0,
            trade_count: Some(5_000),
            vwap: Some(100.0),
        })
        .collect()
}

/// Replaces the trailing bars with `(low, close)` pairs.
pub fn with_tail(mut bars: Vec<Bar>, tail: &[(f64, f64)]) -> Vec<Bar> {
    let offset = bars.len() - tail.len();
    for (bar, &(low, close)) in bars[offset..].iter_mut().zip(tail) {
        bar.low = low;
        bar.close = close;
        bar.high = bar.high.max(close);
    }
    bars
}

/// 60 bars where the 50-SMA on the second-to-last bar is exactly 100 and that bar
/// traded down to 99 before closing at 101.
pub fn bounce_off_50_sma() -> Vec<Bar> {
    with_tail(flat_bars(60), &[(98.5, 99.0), (99.0, 101.0), (100.2, 100.5)])
}

pub fn config(tickers: &[&str], moving_averages: &[&str]) -> ScreenerConfig {
    ScreenerConfig {
        tickers: tickers.iter().map(|s| s.to_string()).collect(),
        moving_averages: moving_averages.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

pub fn validated(tickers: &[&str], moving_averages: &[&str]) -> ValidatedConfig {
    config(tickers, moving_averages).validate().unwrap()
}

/// Validated config scanning the whole reference catalog.
pub fn validated_catalog(tickers: &[&str]) -> ValidatedConfig {
    ScreenerConfig {
        tickers: tickers.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
    .validate()
    .unwrap()
}

#[derive(Clone)]
pub enum Script {
    Bars(Vec<Bar>),
    Delayed(Duration, Vec<Bar>),
    Fail { status: u16, message: String },
    Hang,
}

/// Bar provider answering from a per-ticker script. Unknown tickers get no series.
#[derive(Default)]
pub struct ScriptedBars {
    scripts: HashMap<String, Script>,
    calls: AtomicUsize,
}

impl ScriptedBars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, ticker: &str, script: Script) -> Self {
        self.scripts.insert(ticker.to_string(), script);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl DataProvider for ScriptedBars {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut out = Vec::new();
        for symbol in params.symbols {
            let bars = match self.scripts.get(&symbol) {
                None => continue,
                Some(Script::Bars(bars)) => bars.clone(),
                Some(Script::Delayed(delay, bars)) => {
                    tokio::time::sleep(*delay).await;
                    bars.clone()
                }
                Some(Script::Fail { status, message }) => {
                    return ApiSnafu {
                        status: *status,
                        message: message.clone(),
                    }
                    .fail();
                }
                Some(Script::Hang) => {
                    std::future::pending::<()>().await;
                    continue;
                }
            };
            out.push(BarSeries::new(symbol, params.timeframe.clone(), bars));
        }
        Ok(out)
    }
}

/// Option chain provider listing the same contracts for every underlying, narrowed
/// to the expiration bounds of each request.
#[derive(Default)]
pub struct StaticChain {
    contracts: Vec<OptionContract>,
    requests: Mutex<Vec<OptionChainRequest>>,
}

impl StaticChain {
    pub fn new(symbols: &[(&str, Option<f64>)]) -> Self {
        Self {
            contracts: symbols
                .iter()
                .map(|&(symbol, iv)| OptionContract::from_occ(symbol, iv).unwrap())
                .collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<OptionChainRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl OptionChainProvider for StaticChain {
    async fn fetch_option_chain(
        &self,
        request: OptionChainRequest,
    ) -> Result<Vec<OptionContract>, ProviderError> {
        let listed = self
            .contracts
            .iter()
            .filter(|c| request.expiration_from.is_none_or(|from| c.expiration >= from))
            .filter(|c| request.expiration_to.is_none_or(|to| c.expiration <= to))
            .cloned()
            .collect();
        self.requests.lock().unwrap().push(request);
        Ok(listed)
    }
}

/// Option chain provider whose requests never complete.
pub struct HangingChain;

#[async_trait]
impl OptionChainProvider for HangingChain {
    async fn fetch_option_chain(
        &self,
        _request: OptionChainRequest,
    ) -> Result<Vec<OptionContract>, ProviderError> {
        std::future::pending().await
    }
}

/// Option chain provider that always answers with a server error.
pub struct FailingChain;

#[async_trait]
impl OptionChainProvider for FailingChain {
    async fn fetch_option_chain(
        &self,
        _request: OptionChainRequest,
    ) -> Result<Vec<OptionContract>, ProviderError> {
        ApiSnafu {
            status: 503u16,
            message: "options feed unavailable",
        }
        .fail()
    }
}
