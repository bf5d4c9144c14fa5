//! Eligibility filter: liquidity and volume thresholds for copyable swaps.

use crate::models::ObservedTransaction;

use super::StrategyConfig;

/// Result of screening a transaction against the entry thresholds.
#[derive(Debug, Clone)]
pub struct FilterVerdict {
    pub eligible: bool,
    pub reason: String,
}

impl FilterVerdict {
    pub fn allow() -> Self {
        Self {
            eligible: true,
            reason: "Entry thresholds met".to_string(),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            eligible: false,
            reason: reason.into(),
        }
    }
}

/// Screen an observed swap against the liquidity and volume minimums.
///
/// Fields the feed omitted deserialize to zero, so an unknown liquidity or
/// volume always rejects rather than passing.
pub fn evaluate_eligibility(tx: &ObservedTransaction, config: &StrategyConfig) -> FilterVerdict {
    if tx.liquidity_usd < config.liquidity_min_usd || tx.volume_usd < config.volume_min_usd {
        return FilterVerdict::reject(format!(
            "Token {} rejected: liquidity ${} (min ${}), volume ${} (min ${})",
            tx.token_out,
            tx.liquidity_usd,
            config.liquidity_min_usd,
            tx.volume_usd,
            config.volume_min_usd
        ));
    }

    FilterVerdict::allow()
}

/// Convenience wrapper when the rejection reason is not needed.
pub fn is_eligible(tx: &ObservedTransaction, config: &StrategyConfig) -> bool {
    evaluate_eligibility(tx, config).eligible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WalletAction;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn make_tx(liquidity: Decimal, volume: Decimal) -> ObservedTransaction {
        ObservedTransaction {
            signature: "sig".to_string(),
            wallet_address: "wallet1".to_string(),
            token_in: "So11111111111111111111111111111111111111112".to_string(),
            token_out: "mint".to_string(),
            price_at_tx: dec!(0.5),
            liquidity_usd: liquidity,
            volume_usd: volume,
            wallet_action: WalletAction::None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_rejects_low_liquidity() {
        let config = StrategyConfig::default();
        let tx = make_tx(dec!(79999), dec!(500000));

        let verdict = evaluate_eligibility(&tx, &config);
        assert!(!verdict.eligible);
        assert!(verdict.reason.contains("liquidity"));
    }

    #[test]
    fn test_rejects_low_volume() {
        let config = StrategyConfig::default();
        assert!(!is_eligible(&make_tx(dec!(100000), dec!(299999)), &config));
    }

    #[test]
    fn test_accepts_at_thresholds() {
        let config = StrategyConfig::default();
        // Minimums are inclusive
        assert!(is_eligible(&make_tx(dec!(80000), dec!(300000)), &config));
        assert!(is_eligible(&make_tx(dec!(200000), dec!(900000)), &config));
    }

    #[test]
    fn test_missing_metrics_reject() {
        // Absent upstream fields deserialize to zero and never pass
        let config = StrategyConfig::default();
        let tx = make_tx(Decimal::ZERO, Decimal::ZERO);

        let verdict = evaluate_eligibility(&tx, &config);
        assert!(!verdict.eligible);
        assert!(verdict.reason.contains(&tx.token_out));
    }
}
