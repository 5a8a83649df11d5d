//! Alpaca Market Data REST API (v2 stock bars, v1beta1 option snapshots).

pub mod params;
pub mod provider;
pub mod response;

pub use params::{AlpacaBarsParams, Feed, OptionsFeed};
pub use provider::{AlpacaProvider, AlpacaProviderConfig};
