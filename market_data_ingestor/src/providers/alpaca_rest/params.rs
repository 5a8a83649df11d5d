use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::{
    models::{
        asset::AssetClass,
        option::OptionKind,
        request_params::{BarsRequestParams, OptionChainRequest, ProviderParams},
        timeframe::TimeFrame,
    },
    providers::{ProviderError, ValidationSnafu},
};

/// Largest page the bars endpoint serves.
pub const MAX_BARS_PAGE: u32 = 10_000;
/// Largest page the option snapshots endpoint serves.
pub const MAX_SNAPSHOTS_PAGE: u32 = 1_000;

/// Specifies the corporate action adjustment for stock data.
///
/// Defaults to `Split` so that averages spanning a split compare like with like.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    Raw,
    #[default]
    Split,
    Dividend,
    All,
}

impl Adjustment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Adjustment::Raw => "raw",
            Adjustment::Split => "split",
            Adjustment::Dividend => "dividend",
            Adjustment::All => "all",
        }
    }
}

/// Specifies the source feed for stock data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    #[default]
    Sip,
    Iex,
    Otc,
}

impl Feed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feed::Sip => "sip",
            Feed::Iex => "iex",
            Feed::Otc => "otc",
        }
    }
}

/// Specifies the source feed for option data. `Opra` requires a paid subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OptionsFeed {
    #[default]
    Indicative,
    Opra,
}

impl OptionsFeed {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionsFeed::Indicative => "indicative",
            OptionsFeed::Opra => "opra",
        }
    }
}

/// Specifies the sort order for the bars.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sort {
    #[default]
    Asc,
    Desc,
}

impl Sort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sort::Asc => "asc",
            Sort::Desc => "desc",
        }
    }
}

/// Alpaca-specific parameters for a bars request.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AlpacaBarsParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<Adjustment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed: Option<Feed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,
}

/// Rejects timeframes the bars endpoint does not serve.
pub fn validate_timeframe(timeframe: &TimeFrame) -> Result<(), ProviderError> {
    if let Err(e) = timeframe.validate() {
        return ValidationSnafu {
            message: e.to_string(),
        }
        .fail();
    }
    Ok(())
}

/// The stock bars endpoint only serves US equities.
pub fn validate_asset_class(asset_class: AssetClass) -> Result<(), ProviderError> {
    if asset_class != AssetClass::UsEquity {
        return ValidationSnafu {
            message: format!("Alpaca stock bars do not cover {asset_class:?}"),
        }
        .fail();
    }
    Ok(())
}

/// Builds the query string for `GET /v2/stocks/bars`, without the page token.
///
/// Explicit [`AlpacaBarsParams`] win over `default_feed`.
pub fn construct_params(params: &BarsRequestParams, default_feed: Feed) -> Vec<(String, String)> {
    let alpaca = match &params.provider_specific {
        ProviderParams::Alpaca(p) => p.clone(),
        ProviderParams::None => AlpacaBarsParams::default(),
    };

    let mut query = vec![
        ("symbols".to_string(), params.symbols.join(",")),
        ("timeframe".to_string(), params.timeframe.to_string()),
        (
            "start".to_string(),
            params.start.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        (
            "end".to_string(),
            params.end.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        (
            "adjustment".to_string(),
            alpaca.adjustment.unwrap_or_default().as_str().to_string(),
        ),
        (
            "feed".to_string(),
            alpaca.feed.unwrap_or(default_feed).as_str().to_string(),
        ),
        (
            "limit".to_string(),
            alpaca.limit.unwrap_or(MAX_BARS_PAGE).min(MAX_BARS_PAGE).to_string(),
        ),
        (
            "sort".to_string(),
            alpaca.sort.unwrap_or_default().as_str().to_string(),
        ),
    ];
    if let Some(currency) = alpaca.currency {
        query.push(("currency".to_string(), currency));
    }
    query
}

/// Builds the query string for `GET /v1beta1/options/snapshots/{underlying}`,
/// without the page token.
pub fn construct_option_params(
    request: &OptionChainRequest,
    feed: OptionsFeed,
) -> Vec<(String, String)> {
    let mut query = vec![
        ("feed".to_string(), feed.as_str().to_string()),
        ("limit".to_string(), MAX_SNAPSHOTS_PAGE.to_string()),
    ];
    if let Some(kind) = request.kind {
        let side = match kind {
            OptionKind::Call => "call",
            OptionKind::Put => "put",
        };
        query.push(("type".to_string(), side.to_string()));
    }
    if let Some(from) = request.expiration_from {
        query.push((
            "expiration_date_gte".to_string(),
            from.format("%Y-%m-%d").to_string(),
        ));
    }
    if let Some(to) = request.expiration_to {
        query.push((
            "expiration_date_lte".to_string(),
            to.format("%Y-%m-%d").to_string(),
        ));
    }
    query
}

/// Underlying symbols end up in the URL path; keep them to the characters
/// equity tickers actually use.
pub fn validate_underlying(underlying: &str) -> Result<(), ProviderError> {
    let valid = !underlying.is_empty()
        && underlying
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if !valid {
        return ValidationSnafu {
            message: format!("invalid underlying symbol '{underlying}'"),
        }
        .fail();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;
    use crate::models::timeframe::TimeFrameUnit;

    fn lookup<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
        query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_construct_params_defaults() {
        let end = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();
        let params = BarsRequestParams::trailing_daily("AAPL", end, 365);
        let query = construct_params(&params, Feed::Iex);

        assert_eq!(lookup(&query, "symbols"), Some("AAPL"));
        assert_eq!(lookup(&query, "timeframe"), Some("1Day"));
        assert_eq!(lookup(&query, "start"), Some("2024-06-02T00:00:00Z"));
        assert_eq!(lookup(&query, "end"), Some("2025-06-02T00:00:00Z"));
        assert_eq!(lookup(&query, "adjustment"), Some("split"));
        assert_eq!(lookup(&query, "feed"), Some("iex"));
        assert_eq!(lookup(&query, "limit"), Some("10000"));
        assert_eq!(lookup(&query, "sort"), Some("asc"));
        assert_eq!(lookup(&query, "currency"), None);
    }

    #[test]
    fn test_construct_params_provider_specific_overrides() {
        let mut params = BarsRequestParams::trailing_daily("MSFT", Utc::now(), 30);
        params.symbols.push("GOOGL".to_string());
        params.provider_specific = ProviderParams::Alpaca(AlpacaBarsParams {
            feed: Some(Feed::Sip),
            sort: Some(Sort::Desc),
            limit: Some(50_000),
            currency: Some("USD".to_string()),
            adjustment: Some(Adjustment::Raw),
        });
        let query = construct_params(&params, Feed::Iex);

        assert_eq!(lookup(&query, "symbols"), Some("MSFT,GOOGL"));
        assert_eq!(lookup(&query, "feed"), Some("sip"));
        assert_eq!(lookup(&query, "sort"), Some("desc"));
        assert_eq!(lookup(&query, "limit"), Some("10000"));
        assert_eq!(lookup(&query, "currency"), Some("USD"));
        assert_eq!(lookup(&query, "adjustment"), Some("raw"));
    }

    #[test]
    fn test_trailing_daily_bars_are_split_adjusted() {
        let params = BarsRequestParams::trailing_daily("NVDA", Utc::now(), 365);
        let query = construct_params(&params, Feed::Sip);
        assert_eq!(lookup(&query, "adjustment"), Some("split"));
        assert_eq!(Adjustment::default(), Adjustment::Split);
    }

    #[test]
    fn test_construct_option_params() {
        let mut request = OptionChainRequest::calls("AAPL");
        request.expiration_from = NaiveDate::from_ymd_opt(2025, 6, 2);
        let query = construct_option_params(&request, OptionsFeed::Indicative);

        assert_eq!(lookup(&query, "feed"), Some("indicative"));
        assert_eq!(lookup(&query, "type"), Some("call"));
        assert_eq!(lookup(&query, "expiration_date_gte"), Some("2025-06-02"));
        assert_eq!(lookup(&query, "expiration_date_lte"), None);
        assert_eq!(lookup(&query, "limit"), Some("1000"));

        let request = OptionChainRequest::calls("SPY").expiring_between(
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 9),
        );
        let query = construct_option_params(&request, OptionsFeed::Indicative);
        assert_eq!(lookup(&query, "expiration_date_gte"), Some("2025-06-02"));
        assert_eq!(lookup(&query, "expiration_date_lte"), Some("2025-06-09"));
    }

    #[test]
    fn test_validation() {
        assert!(validate_timeframe(&TimeFrame::day()).is_ok());
        assert!(validate_timeframe(&TimeFrame::new(2, TimeFrameUnit::Week)).is_err());
        assert!(validate_asset_class(AssetClass::UsEquity).is_ok());
        assert!(validate_asset_class(AssetClass::Futures).is_err());
        assert!(validate_underlying("BRK.B").is_ok());
        assert!(validate_underlying("AAPL/../v2").is_err());
        assert!(validate_underlying("").is_err());
    }
}
