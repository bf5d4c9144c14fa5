//! Observed swap transaction from the wallet activity feed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Follow-up action the monitored wallet took on a token it already holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletAction {
    /// Plain swap, no exit signal
    #[default]
    None,
    /// The wallet sold part of its holding
    SellPartial,
    /// The wallet exited the token completely
    SellAll,
}

impl WalletAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletAction::None => "none",
            WalletAction::SellPartial => "sell_partial",
            WalletAction::SellAll => "sell_all",
        }
    }
}

/// A swap observed in a monitored wallet's activity feed.
///
/// Produced by the data client once per poll; read-only input to the
/// decision core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedTransaction {
    /// On-chain signature, used to deduplicate across polling cycles
    pub signature: String,

    /// Wallet that performed the swap
    pub wallet_address: String,

    /// Token the wallet sold into the pool
    pub token_in: String,

    /// Token the wallet received
    pub token_out: String,

    /// Price of `token_out` in USD at transaction time (zero when the
    /// feed omitted it, which makes the transaction malformed)
    #[serde(default)]
    pub price_at_tx: Decimal,

    /// Pool liquidity in USD; zero when the feed omitted it
    #[serde(default)]
    pub liquidity_usd: Decimal,

    /// 24h traded volume in USD; zero when the feed omitted it
    #[serde(default)]
    pub volume_usd: Decimal,

    /// Exit signal carried by the feed, if any
    #[serde(default)]
    pub wallet_action: WalletAction,

    /// When the swap landed on chain
    pub timestamp: DateTime<Utc>,
}

impl ObservedTransaction {
    /// A transaction missing its price or either token id cannot be copied
    /// or priced; the orchestrator skips and reports it.
    pub fn is_malformed(&self) -> bool {
        self.price_at_tx <= Decimal::ZERO
            || self.token_in.is_empty()
            || self.token_out.is_empty()
            || self.signature.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_tx() -> ObservedTransaction {
        ObservedTransaction {
            signature: "5sig".to_string(),
            wallet_address: "wallet1".to_string(),
            token_in: "So11111111111111111111111111111111111111112".to_string(),
            token_out: "7EYnhQoR9YM3N7UoaKRoA44Uy8JeaZV3qyouov87awMs".to_string(),
            price_at_tx: dec!(0.002),
            liquidity_usd: dec!(100000),
            volume_usd: dec!(500000),
            wallet_action: WalletAction::None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_well_formed_transaction() {
        assert!(!make_tx().is_malformed());
    }

    #[test]
    fn test_missing_price_is_malformed() {
        let mut tx = make_tx();
        tx.price_at_tx = Decimal::ZERO;
        assert!(tx.is_malformed());
    }

    #[test]
    fn test_missing_token_is_malformed() {
        let mut tx = make_tx();
        tx.token_out = String::new();
        assert!(tx.is_malformed());

        let mut tx = make_tx();
        tx.signature = String::new();
        assert!(tx.is_malformed());
    }
}
