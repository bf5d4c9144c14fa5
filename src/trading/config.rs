//! Strategy configuration.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Smallest indivisible unit per whole token, matching SOL's lamports.
const BASE_UNITS_PER_TOKEN: Decimal = dec!(1_000_000_000);

/// Configuration for copy-trade screening and position management.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    // === Entry Rules ===
    /// Minimum pool liquidity in USD for a swap to be copyable
    pub liquidity_min_usd: Decimal,

    /// Minimum 24h volume in USD for a swap to be copyable
    pub volume_min_usd: Decimal,

    /// Copy-trades allowed per calendar day
    pub max_trades_per_day: u32,

    /// Fixed investment per copy-trade in USD
    pub investment_per_trade_usd: Decimal,

    /// Maximum tolerated price deviation when executing a swap, in percent
    pub slippage_percent: f64,

    // === Exit Rules ===
    /// Price multiples at which a slice of the position is sold, ascending
    pub take_profit_levels: Vec<Decimal>,

    /// Tolerated drop from the highest price seen before a full exit (0-1)
    pub stop_loss_fraction: Decimal,

    /// Share of the remaining size sold when the source wallet sells part
    /// of its own holding (0-1)
    pub mirror_partial_fraction: Decimal,

    // === Budget Policy ===
    /// Refund the day's budget slot when an execution fails after the
    /// reservation succeeded
    pub refund_failed_trades: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            liquidity_min_usd: dec!(80000),        // $80k min liquidity
            volume_min_usd: dec!(300000),          // $300k min daily volume
            max_trades_per_day: 10,
            investment_per_trade_usd: dec!(10),    // $10 per copy
            slippage_percent: 1.0,

            take_profit_levels: vec![dec!(2), dec!(5), dec!(10)],
            stop_loss_fraction: dec!(0.45),        // 45% trailing drop
            mirror_partial_fraction: dec!(0.5),

            refund_failed_trades: false,
        }
    }
}

impl StrategyConfig {
    /// Per-trade investment converted to base units for the router.
    pub fn investment_base_units(&self) -> u64 {
        to_base_units(self.investment_per_trade_usd)
    }

    /// Sum of all configured take-profit levels; the denominator of the
    /// per-level slice weights.
    pub fn take_profit_level_sum(&self) -> Decimal {
        self.take_profit_levels.iter().copied().sum()
    }
}

/// Convert a whole-token (or whole-USD) amount to base units.
pub fn to_base_units(amount: Decimal) -> u64 {
    (amount * BASE_UNITS_PER_TOKEN).to_u64().unwrap_or(0)
}
