//! Market price lookup for asset holdings.
//!
//! Stocks go through the unofficial Yahoo Finance quote endpoint with the
//! `.JK` (Jakarta exchange) suffix; crypto goes through CoinGecko's simple
//! price endpoint in IDR. A failed fetch leaves the stored price untouched.

use std::{collections::HashMap, time::Duration};

use chrono::Utc;
use ledger::{AssetKind, Money, services::AssetService};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

const YAHOO_QUOTE_URL: &str = "https://query1.finance.yahoo.com/v7/finance/quote";
const COINGECKO_PRICE_URL: &str = "https://api.coingecko.com/api/v3/simple/price";
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub(crate) enum PriceError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("no price in response for {0}")]
    Missing(String),
}

#[derive(Debug, Deserialize)]
struct YahooEnvelope {
    #[serde(rename = "quoteResponse")]
    quote_response: YahooQuoteResponse,
}

#[derive(Debug, Deserialize)]
struct YahooQuoteResponse {
    result: Vec<YahooQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooQuote {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
}

#[derive(Clone)]
pub(crate) struct PriceClient {
    http: Client,
}

impl PriceClient {
    pub(crate) fn new() -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self { http })
    }

    /// Quote for an IDX ticker, e.g. `BBCA` becomes `BBCA.JK`.
    pub(crate) async fn stock_price(&self, symbol: &str) -> Result<Money, PriceError> {
        let envelope: YahooEnvelope = self
            .http
            .get(YAHOO_QUOTE_URL)
            .query(&[("symbols", format!("{symbol}.JK"))])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let price = envelope
            .quote_response
            .result
            .first()
            .and_then(|q| q.regular_market_price)
            .filter(|p| *p > 0.0)
            .ok_or_else(|| PriceError::Missing(symbol.to_string()))?;
        Ok(Money::new(price.round() as i64))
    }

    /// CoinGecko identifies coins by lowercase id (`bitcoin`, `ethereum`).
    pub(crate) async fn crypto_price(&self, symbol: &str) -> Result<Money, PriceError> {
        let id = symbol.to_lowercase();
        let response: HashMap<String, HashMap<String, f64>> = self
            .http
            .get(COINGECKO_PRICE_URL)
            .query(&[("ids", id.as_str()), ("vs_currencies", "idr")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let price = response
            .get(&id)
            .and_then(|prices| prices.get("idr"))
            .copied()
            .filter(|p| *p > 0.0)
            .ok_or_else(|| PriceError::Missing(symbol.to_string()))?;
        Ok(Money::new(price.round() as i64))
    }

    async fn fetch(&self, kind: AssetKind, symbol: &str) -> Result<Money, PriceError> {
        match kind {
            AssetKind::Stock => self.stock_price(symbol).await,
            AssetKind::Crypto => self.crypto_price(symbol).await,
        }
    }

    /// Refresh one holding. Returns whether the stored price changed;
    /// failures are logged and leave it alone.
    pub(crate) async fn sync_asset(
        &self,
        assets: &AssetService,
        asset: &ledger::assets::Model,
    ) -> Result<bool, ledger::LedgerError> {
        match self.fetch(asset.kind(), &asset.symbol).await {
            Ok(price) => {
                assets.apply_price(asset.id, price, Utc::now()).await?;
                debug!(symbol = %asset.symbol, price = price.minor(), "price synced");
                Ok(true)
            }
            Err(err) => {
                warn!(symbol = %asset.symbol, %err, "price sync skipped");
                Ok(false)
            }
        }
    }

    /// Refresh prices for every active holding of one user. Returns how many
    /// were updated; failures are logged and skipped.
    pub(crate) async fn sync_user(
        &self,
        assets: &AssetService,
        user_id: i32,
    ) -> Result<usize, ledger::LedgerError> {
        let holdings = assets.list(user_id).await?;
        let mut updated = 0;
        for asset in holdings {
            if self.sync_asset(assets, &asset).await? {
                updated += 1;
            }
        }
        Ok(updated)
    }
}
