use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::models::bar::Bar;

#[derive(Deserialize, Debug)]
pub struct AlpacaBar {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v")]
    pub volume: f64,
    #[serde(rename = "n", default)]
    pub trade_count: Option<u64>,
    #[serde(rename = "vw", default)]
    pub vwap: Option<f64>,
}

impl From<AlpacaBar> for Bar {
    fn from(ab: AlpacaBar) -> Self {
        Bar {
            timestamp: ab.timestamp,
            open: ab.open,
            high: ab.high,
            low: ab.low,
            close: ab.close,
            volume: ab.volume,
            trade_count: ab.trade_count,
            vwap: ab.vwap,
        }
    }
}

/// One page of `GET /v2/stocks/bars`. `bars` is `null` when nothing matched.
#[derive(Deserialize, Debug)]
pub struct AlpacaResponse {
    #[serde(default)]
    pub bars: Option<IndexMap<String, Vec<AlpacaBar>>>,
    pub next_page_token: Option<String>,
}

/// Per-contract snapshot. Only the fields the screener reads are modelled.
#[derive(Deserialize, Debug)]
pub struct AlpacaOptionSnapshot {
    #[serde(rename = "impliedVolatility", default)]
    pub implied_volatility: Option<f64>,
}

/// One page of `GET /v1beta1/options/snapshots/{underlying}`.
#[derive(Deserialize, Debug)]
pub struct AlpacaOptionSnapshotsResponse {
    #[serde(default)]
    pub snapshots: Option<IndexMap<String, AlpacaOptionSnapshot>>,
    pub next_page_token: Option<String>,
}
