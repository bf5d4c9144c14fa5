//! Read-only clients for the wallet activity feed and token metrics.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use backoff::ExponentialBackoffBuilder;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::models::{MonitoredWallet, ObservedTransaction, WalletAction};

use super::types::*;

const FEED_API_BASE: &str = "https://feed-api.cielo.finance/api/v1";
const TOKEN_API_BASE: &str = "https://public-api.solscan.io";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_BUDGET: Duration = Duration::from_secs(15);

/// Client for the wallet activity feed and token metadata (read-only).
pub struct DataClient {
    client: Client,
    feed_base_url: String,
    token_base_url: String,
    api_key: String,
}

impl DataClient {
    /// Create a new data client with default endpoints.
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            feed_base_url: FEED_API_BASE.to_string(),
            token_base_url: TOKEN_API_BASE.to_string(),
            api_key,
        })
    }

    /// Create from the `CIELO_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key =
            std::env::var("CIELO_API_KEY").context("CIELO_API_KEY not set in environment")?;
        Self::new(api_key)
    }

    /// Create with custom base URLs (for testing).
    pub fn with_base_urls(feed_base_url: String, token_base_url: String, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            feed_base_url,
            token_base_url,
            api_key,
        })
    }

    /// Fetch the most recent swaps for a monitored wallet, newest first.
    pub async fn fetch_recent_transactions(
        &self,
        wallet: &MonitoredWallet,
        limit: u32,
    ) -> Result<Vec<ObservedTransaction>> {
        let url = format!(
            "{}/feed?address={}&limit={}&chain=Solana",
            self.feed_base_url, wallet.address, limit
        );

        debug!(url = %url, wallet = %wallet.tag, "Fetching wallet feed");

        let response = self.get_with_retry(&url, true).await?;
        let feed: FeedResponse = response
            .json()
            .await
            .context("Failed to parse feed response")?;

        let transactions = feed
            .transactions
            .into_iter()
            .filter_map(|t| {
                let timestamp = Utc.timestamp_opt(t.timestamp, 0).single()?;
                let wallet_action = parse_wallet_action(&t.wallet_action);

                Some(ObservedTransaction {
                    signature: t.signature,
                    wallet_address: if t.wallet.is_empty() {
                        wallet.address.clone()
                    } else {
                        t.wallet
                    },
                    token_in: t.token_a,
                    token_out: t.token_b,
                    price_at_tx: t.price_usd.unwrap_or(Decimal::ZERO),
                    liquidity_usd: t.liquidity_usd,
                    volume_usd: t.volume_usd,
                    wallet_action,
                    timestamp,
                })
            })
            .collect();

        Ok(transactions)
    }

    /// Fetch liquidity, volume, and price for a token.
    pub async fn fetch_token_metrics(&self, token: &str) -> Result<TokenMetrics> {
        let url = format!("{}/token/meta?tokenAddress={}", self.token_base_url, token);

        debug!(url = %url, "Fetching token metrics");

        let response = self.get_with_retry(&url, false).await?;
        let meta: TokenMetaResponse = response
            .json()
            .await
            .context("Failed to parse token meta response")?;

        Ok(meta.into())
    }

    /// GET with exponential backoff on transient failures. Server errors and
    /// rate limiting retry; any other non-success status is permanent.
    async fn get_with_retry(&self, url: &str, authenticated: bool) -> Result<reqwest::Response> {
        let policy = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(RETRY_BUDGET))
            .build();

        backoff::future::retry(policy, || async {
            let mut request = self.client.get(url);
            if authenticated {
                request = request.bearer_auth(&self.api_key);
            }

            let response = request
                .send()
                .await
                .map_err(|e| backoff::Error::transient(anyhow::Error::new(e)))?;

            let status = response.status();
            if status.is_server_error() || status.as_u16() == 429 {
                return Err(backoff::Error::transient(anyhow!(
                    "Request failed with {}, retrying",
                    status
                )));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(backoff::Error::permanent(anyhow!(
                    "Request failed: {} - {}",
                    status,
                    body
                )));
            }

            Ok(response)
        })
        .await
    }
}

fn parse_wallet_action(raw: &str) -> WalletAction {
    match raw {
        "" | "none" => WalletAction::None,
        "sell_partial" => WalletAction::SellPartial,
        "sell_all" => WalletAction::SellAll,
        other => {
            warn!(action = %other, "Unknown wallet action in feed");
            WalletAction::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wallet_action() {
        assert_eq!(parse_wallet_action(""), WalletAction::None);
        assert_eq!(parse_wallet_action("none"), WalletAction::None);
        assert_eq!(parse_wallet_action("sell_partial"), WalletAction::SellPartial);
        assert_eq!(parse_wallet_action("sell_all"), WalletAction::SellAll);
        assert_eq!(parse_wallet_action("mystery"), WalletAction::None);
    }

    #[test]
    fn test_feed_transaction_defaults() {
        // Absent metrics deserialize to zero, absent price to None
        let raw = r#"{"signature":"sig","tokenA":"a","tokenB":"b","timestamp":1700000000}"#;
        let tx: FeedTransaction = serde_json::from_str(raw).unwrap();

        assert_eq!(tx.liquidity_usd, Decimal::ZERO);
        assert_eq!(tx.volume_usd, Decimal::ZERO);
        assert!(tx.price_usd.is_none());
        assert!(tx.wallet_action.is_empty());
    }
}
