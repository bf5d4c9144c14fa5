//! API response types for the wallet activity feed, token metrics, and the
//! swap router.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Envelope returned by the wallet activity feed.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    pub transactions: Vec<FeedTransaction>,
}

/// One swap in a wallet's activity feed.
///
/// Liquidity and volume are frequently absent upstream; they default to
/// zero so an unknown metric can never pass the eligibility filter.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedTransaction {
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub wallet: String,
    #[serde(rename = "tokenA", default)]
    pub token_a: String,
    #[serde(rename = "tokenB", default)]
    pub token_b: String,
    #[serde(rename = "priceUSD", default)]
    pub price_usd: Option<Decimal>,
    #[serde(rename = "liquidityUSD", default)]
    pub liquidity_usd: Decimal,
    #[serde(rename = "volumeUSD", default)]
    pub volume_usd: Decimal,
    #[serde(rename = "walletAction", default)]
    pub wallet_action: String,
    #[serde(default)]
    pub timestamp: i64,
}

/// Token metadata from the token metrics endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenMetaResponse {
    #[serde(rename = "tokenAddress", default)]
    pub token_address: String,
    #[serde(rename = "priceUSD", default)]
    pub price_usd: Option<Decimal>,
    #[serde(rename = "liquidityUSD", default)]
    pub liquidity_usd: Decimal,
    #[serde(rename = "volumeUSD", default)]
    pub volume_usd: Decimal,
}

/// Liquidity, volume, and price for a token, as consumed by the bot.
#[derive(Debug, Clone)]
pub struct TokenMetrics {
    pub price_usd: Option<Decimal>,
    pub liquidity_usd: Decimal,
    pub volume_usd: Decimal,
}

impl From<TokenMetaResponse> for TokenMetrics {
    fn from(meta: TokenMetaResponse) -> Self {
        Self {
            price_usd: meta.price_usd,
            liquidity_usd: meta.liquidity_usd,
            volume_usd: meta.volume_usd,
        }
    }
}

/// Swap route from the router's `get_swap_route` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SwapRouteResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: SwapRouteData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwapRouteData {
    pub raw_tx: RawTransaction,
    #[serde(default)]
    pub quote: Option<SwapQuote>,
}

/// Unsigned transaction material inside a route response.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    #[serde(rename = "swapTransaction")]
    pub swap_transaction: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuote {
    #[serde(default)]
    pub in_amount: String,
    #[serde(default)]
    pub out_amount: String,
    #[serde(default)]
    pub price_impact_pct: Option<f64>,
}

/// Result of submitting a signed transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Option<SubmitData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitData {
    #[serde(default)]
    pub hash: String,
}
