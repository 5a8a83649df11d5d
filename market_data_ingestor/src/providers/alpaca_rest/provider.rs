use std::{num::NonZeroU32, sync::Arc};

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use indexmap::IndexMap;
use nonzero_ext::nonzero;
use reqwest::{Client, header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use shared_utils::env::get_env_var;
use snafu::ResultExt;
use tracing::debug;

use crate::{
    models::{
        bar::Bar,
        bar_series::BarSeries,
        option::OptionContract,
        request_params::{BarsRequestParams, OptionChainRequest},
    },
    providers::{
        ApiSnafu, ClientBuildSnafu, DataProvider, InvalidApiKeySnafu, MissingEnvVarSnafu,
        OptionChainProvider, ProviderError, ProviderInitError, ReqwestSnafu,
        alpaca_rest::{
            params::{
                Feed, OptionsFeed, construct_option_params, construct_params,
                validate_asset_class, validate_timeframe, validate_underlying,
            },
            response::{AlpacaBar, AlpacaOptionSnapshotsResponse, AlpacaResponse},
        },
    },
};

const BARS_URL: &str = "https://data.alpaca.markets/v2/stocks/bars";
const OPTION_SNAPSHOTS_URL: &str = "https://data.alpaca.markets/v1beta1/options/snapshots";

/// Tunables for [`AlpacaProvider`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlpacaProviderConfig {
    /// Stock feed used when a request carries no explicit feed. The free plan only
    /// serves `iex`.
    pub feed: Feed,
    pub options_feed: OptionsFeed,
    /// Shared budget across every endpoint this provider calls.
    pub requests_per_minute: NonZeroU32,
}

impl Default for AlpacaProviderConfig {
    fn default() -> Self {
        Self {
            feed: Feed::Iex,
            options_feed: OptionsFeed::Indicative,
            requests_per_minute: nonzero!(200u32),
        }
    }
}

pub struct AlpacaProvider {
    client: Client,
    limiter: Arc<DefaultDirectRateLimiter>,
    config: AlpacaProviderConfig,
    _api_key: SecretString,
    _secret_key: SecretString,
}

impl AlpacaProvider {
    /// Creates a new Alpaca provider with the default configuration.
    ///
    /// Reads API keys from the `APCA_API_KEY_ID` and `APCA_API_SECRET_KEY`
    /// environment variables.
    pub fn new() -> Result<Self, ProviderInitError> {
        Self::with_config(AlpacaProviderConfig::default())
    }

    pub fn with_config(config: AlpacaProviderConfig) -> Result<Self, ProviderInitError> {
        let api_key =
            SecretString::new(get_env_var("APCA_API_KEY_ID").context(MissingEnvVarSnafu)?.into());
        let secret_key = SecretString::new(
            get_env_var("APCA_API_SECRET_KEY")
                .context(MissingEnvVarSnafu)?
                .into(),
        );

        let mut key_header =
            header::HeaderValue::from_str(api_key.expose_secret()).context(InvalidApiKeySnafu)?;
        key_header.set_sensitive(true);
        let mut secret_header = header::HeaderValue::from_str(secret_key.expose_secret())
            .context(InvalidApiKeySnafu)?;
        secret_header.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert("APCA-API-KEY-ID", key_header);
        headers.insert("APCA-API-SECRET-KEY", secret_header);

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context(ClientBuildSnafu)?;

        let limiter = RateLimiter::direct(Quota::per_minute(config.requests_per_minute));

        Ok(Self {
            client,
            limiter: Arc::new(limiter),
            config,
            _api_key: api_key,
            _secret_key: secret_key,
        })
    }

    pub fn config(&self) -> &AlpacaProviderConfig {
        &self.config
    }

    /// Waits for a rate-limit slot, issues the GET and decodes a JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<T, ProviderError> {
        self.limiter.until_ready().await;

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .context(ReqwestSnafu)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return ApiSnafu {
                status: status.as_u16(),
                message,
            }
            .fail();
        }

        response.json::<T>().await.context(ReqwestSnafu)
    }
}

#[async_trait]
impl DataProvider for AlpacaProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        validate_timeframe(&params.timeframe)?;
        validate_asset_class(params.asset_class)?;

        let base_query = construct_params(&params, self.config.feed);
        let mut all_bars: IndexMap<String, Vec<AlpacaBar>> = IndexMap::new();
        let mut next_page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut query_params = base_query.clone();
            if let Some(token) = &next_page_token {
                query_params.push(("page_token".to_string(), token.clone()));
            }

            let page: AlpacaResponse = self.get_json(BARS_URL, &query_params).await?;
            pages += 1;

            // Merge the bars from the current page into our collection.
            for (symbol, bars) in page.bars.unwrap_or_default() {
                all_bars.entry(symbol).or_default().extend(bars);
            }

            match page.next_page_token {
                Some(token) => next_page_token = Some(token),
                None => break,
            }
        }

        debug!(
            symbols = ?params.symbols,
            pages,
            series = all_bars.len(),
            "fetched alpaca bars"
        );

        let result = all_bars
            .into_iter()
            .map(|(symbol, alpaca_bars)| {
                let bars: Vec<Bar> = alpaca_bars.into_iter().map(Bar::from).collect();
                BarSeries::new(symbol, params.timeframe.clone(), bars)
            })
            .collect();

        Ok(result)
    }
}

#[async_trait]
impl OptionChainProvider for AlpacaProvider {
    async fn fetch_option_chain(
        &self,
        request: OptionChainRequest,
    ) -> Result<Vec<OptionContract>, ProviderError> {
        validate_underlying(&request.underlying)?;

        let url = format!("{OPTION_SNAPSHOTS_URL}/{}", request.underlying);
        let base_query = construct_option_params(&request, self.config.options_feed);
        let mut contracts = Vec::new();
        let mut next_page_token: Option<String> = None;

        loop {
            let mut query_params = base_query.clone();
            if let Some(token) = &next_page_token {
                query_params.push(("page_token".to_string(), token.clone()));
            }

            let page: AlpacaOptionSnapshotsResponse = self.get_json(&url, &query_params).await?;

            for (symbol, snapshot) in page.snapshots.unwrap_or_default() {
                match OptionContract::from_occ(&symbol, snapshot.implied_volatility) {
                    Ok(contract) => contracts.push(contract),
                    Err(e) => debug!(%symbol, error = %e, "skipping unparseable option symbol"),
                }
            }

            match page.next_page_token {
                Some(token) => next_page_token = Some(token),
                None => break,
            }
        }

        debug!(
            underlying = %request.underlying,
            contracts = contracts.len(),
            "fetched alpaca option snapshots"
        );
        Ok(contracts)
    }
}
