//! Position strategy: mirror exits, tiered take-profit, trailing stop-loss.
//!
//! Each price/action update runs the same fixed sequence:
//! 1. Mirror the source wallet (a full exit short-circuits everything else)
//! 2. Tiered take-profit over all crossed levels in one batch
//! 3. Trailing stop-loss measured from the highest price seen
//!
//! The engine mutates the position in place and returns the sale orders the
//! orchestrator must execute. It performs no I/O.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::models::{Position, WalletAction};

use super::StrategyConfig;

/// Why a slice of a position was sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Source wallet exited the token completely
    MirrorFullExit,
    /// Source wallet sold part of its holding
    MirrorPartialExit,
    /// One or more take-profit levels crossed
    TakeProfit,
    /// Price fell below the trailing floor
    StopLoss,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::MirrorFullExit => "mirror_full_exit",
            ExitReason::MirrorPartialExit => "mirror_partial_exit",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::StopLoss => "stop_loss",
        }
    }
}

/// A sale the orchestrator should execute, in token units.
#[derive(Debug, Clone)]
pub struct SaleOrder {
    pub reason: ExitReason,
    pub size: Decimal,
}

/// Net effect of one strategy update.
#[derive(Debug, Clone, Default)]
pub struct UpdateOutcome {
    pub sales: Vec<SaleOrder>,
    pub closed: bool,
}

impl UpdateOutcome {
    pub fn total_sold(&self) -> Decimal {
        self.sales.iter().map(|s| s.size).sum()
    }
}

/// The position-management rules, applied per price/action update.
pub struct StrategyEngine {
    config: StrategyConfig,
}

impl StrategyEngine {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Apply one price/action update to an open position.
    ///
    /// A terminal position (closed or empty) is left untouched; the caller
    /// is expected to stop feeding it.
    pub fn apply_update(
        &self,
        position: &mut Position,
        current_price: Decimal,
        action: WalletAction,
    ) -> UpdateOutcome {
        let mut outcome = UpdateOutcome::default();

        if position.is_closed || position.size_remaining.is_zero() {
            warn!(token = %position.token, "Update fed to a terminal position, ignoring");
            return outcome;
        }

        // 1. Wallet mirroring. The premise is "follow the signal wallet",
        //    so its full exit overrides our own thresholds.
        match action {
            WalletAction::SellAll => {
                let sold = position.close();
                debug!(token = %position.token, size = %sold, "Mirroring full exit");
                outcome.sales.push(SaleOrder {
                    reason: ExitReason::MirrorFullExit,
                    size: sold,
                });
                outcome.closed = true;
                position.touch();
                return outcome;
            }
            WalletAction::SellPartial => {
                let cut = position.size_remaining * self.config.mirror_partial_fraction;
                let sold = position.reduce(cut);
                debug!(token = %position.token, size = %sold, "Mirroring partial exit");
                outcome.sales.push(SaleOrder {
                    reason: ExitReason::MirrorPartialExit,
                    size: sold,
                });
            }
            WalletAction::None => {}
        }

        // 2. Tiered take-profit: every crossed level sells a slice weighted
        //    level / sum(levels), all slices computed against the size
        //    entering this step in one batch.
        let gain = position.gain_multiple(current_price);
        let level_sum = self.config.take_profit_level_sum();
        if level_sum > Decimal::ZERO {
            let base = position.size_remaining;
            let mut slice_total = Decimal::ZERO;
            for level in self
                .config
                .take_profit_levels
                .iter()
                .copied()
                .filter(|tp| gain >= *tp)
            {
                slice_total += base * (level / level_sum);
            }

            if slice_total > Decimal::ZERO {
                let sold = position.reduce(slice_total);
                debug!(
                    token = %position.token,
                    gain = %gain,
                    size = %sold,
                    "Take-profit levels crossed"
                );
                outcome.sales.push(SaleOrder {
                    reason: ExitReason::TakeProfit,
                    size: sold,
                });
            }
        }

        // 3. Trailing stop-loss: the floor follows the highest price seen,
        //    protecting gains rather than just the entry.
        position.observe_price(current_price);
        let floor = position.highest_price_seen * (Decimal::ONE - self.config.stop_loss_fraction);
        if current_price < floor {
            let sold = position.close();
            debug!(
                token = %position.token,
                price = %current_price,
                floor = %floor,
                size = %sold,
                "Stop-loss triggered"
            );
            if sold > Decimal::ZERO {
                outcome.sales.push(SaleOrder {
                    reason: ExitReason::StopLoss,
                    size: sold,
                });
            }
        }

        if position.size_remaining.is_zero() {
            position.is_closed = true;
            outcome.closed = true;
        }

        position.touch();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn engine() -> StrategyEngine {
        StrategyEngine::new(StrategyConfig::default())
    }

    fn make_position(buy_price: Decimal, size: Decimal) -> Position {
        Position::open("mint", "wallet1", buy_price, size)
    }

    #[test]
    fn test_sell_all_closes_irrespective_of_price() {
        let engine = engine();

        for price in [dec!(0.01), dec!(1.0), dec!(50.0)] {
            let mut pos = make_position(dec!(1.0), dec!(10));
            let outcome = engine.apply_update(&mut pos, price, WalletAction::SellAll);

            assert!(outcome.closed);
            assert!(pos.is_closed);
            assert_eq!(pos.size_remaining, Decimal::ZERO);
            assert_eq!(outcome.sales.len(), 1);
            assert_eq!(outcome.sales[0].reason, ExitReason::MirrorFullExit);
            assert_eq!(outcome.sales[0].size, dec!(10));
        }
    }

    #[test]
    fn test_take_profit_first_level() {
        // buy 1.0, levels [2,5,10], stop 0.45, size 10, price 2.0:
        // sold = 10 * 2/17, remaining = 10 * 15/17, floor 1.1, stays open
        let engine = engine();
        let mut pos = make_position(dec!(1.0), dec!(10));

        let outcome = engine.apply_update(&mut pos, dec!(2.0), WalletAction::None);

        let expected_sold = dec!(10) * (dec!(2) / dec!(17));
        assert_eq!(outcome.sales.len(), 1);
        assert_eq!(outcome.sales[0].reason, ExitReason::TakeProfit);
        assert_eq!(outcome.sales[0].size, expected_sold);
        assert_eq!(pos.size_remaining, dec!(10) - expected_sold);
        assert!(pos.size_remaining > dec!(8.82) && pos.size_remaining < dec!(8.83));
        assert_eq!(pos.highest_price_seen, dec!(2.0));
        assert!(!outcome.closed);
        assert!(!pos.is_closed);
    }

    #[test]
    fn test_trailing_stop_after_peak() {
        // Continuation of the scenario above: price falls back to 1.0,
        // floor = 2.0 * 0.55 = 1.1 > 1.0, full exit
        let engine = engine();
        let mut pos = make_position(dec!(1.0), dec!(10));
        engine.apply_update(&mut pos, dec!(2.0), WalletAction::None);
        let remaining = pos.size_remaining;

        let outcome = engine.apply_update(&mut pos, dec!(1.0), WalletAction::None);

        assert!(outcome.closed);
        assert!(pos.is_closed);
        assert_eq!(pos.size_remaining, Decimal::ZERO);
        let stop = outcome
            .sales
            .iter()
            .find(|s| s.reason == ExitReason::StopLoss)
            .unwrap();
        assert_eq!(stop.size, remaining);
        // High-water mark never decreases
        assert_eq!(pos.highest_price_seen, dec!(2.0));
    }

    #[test]
    fn test_price_at_floor_stays_open() {
        let engine = engine();
        let mut pos = make_position(dec!(1.0), dec!(10));
        pos.highest_price_seen = dec!(2.0);

        // Floor is 1.1; the comparison is strict
        let outcome = engine.apply_update(&mut pos, dec!(1.1), WalletAction::None);
        assert!(!outcome.closed);
        assert!(!pos.is_closed);
    }

    #[test]
    fn test_partial_mirror_then_thresholds_same_update() {
        // sell_partial on size 10 cuts to 5.0; take-profit then applies to
        // the reduced size within the same call
        let engine = engine();
        let mut pos = make_position(dec!(1.0), dec!(10));

        let outcome = engine.apply_update(&mut pos, dec!(2.0), WalletAction::SellPartial);

        assert_eq!(outcome.sales[0].reason, ExitReason::MirrorPartialExit);
        assert_eq!(outcome.sales[0].size, dec!(5.0));

        let tp_sold = dec!(5.0) * (dec!(2) / dec!(17));
        assert_eq!(outcome.sales[1].reason, ExitReason::TakeProfit);
        assert_eq!(outcome.sales[1].size, tp_sold);
        assert_eq!(pos.size_remaining, dec!(5.0) - tp_sold);
        assert!(!outcome.closed);
    }

    #[test]
    fn test_all_levels_crossed_in_one_pass() {
        // Gain 12x crosses every level; slices sum to the whole batch
        // weight (2+5+10)/17 of the entering size, not to zero
        let engine = engine();
        let mut pos = make_position(dec!(1.0), dec!(10));

        let outcome = engine.apply_update(&mut pos, dec!(12.0), WalletAction::None);

        assert_eq!(outcome.sales.len(), 1);
        assert_eq!(outcome.sales[0].size, dec!(10));
        // Everything sold: the position became terminal
        assert_eq!(pos.size_remaining, Decimal::ZERO);
        assert!(outcome.closed);
    }

    #[test]
    fn test_size_never_increases_highest_never_decreases() {
        let engine = engine();
        let mut pos = make_position(dec!(1.0), dec!(10));

        let updates = [
            (dec!(2.0), WalletAction::None),
            (dec!(1.8), WalletAction::SellPartial),
            (dec!(2.5), WalletAction::None),
            (dec!(1.5), WalletAction::None),
        ];

        let mut last_size = pos.size_remaining;
        let mut last_high = pos.highest_price_seen;
        for (price, action) in updates {
            if pos.is_closed {
                break;
            }
            engine.apply_update(&mut pos, price, action);
            assert!(pos.size_remaining <= last_size);
            assert!(pos.highest_price_seen >= last_high);
            last_size = pos.size_remaining;
            last_high = pos.highest_price_seen;
        }
    }

    #[test]
    fn test_terminal_position_ignored() {
        let engine = engine();
        let mut pos = make_position(dec!(1.0), dec!(10));
        engine.apply_update(&mut pos, dec!(1.0), WalletAction::SellAll);

        let outcome = engine.apply_update(&mut pos, dec!(5.0), WalletAction::None);
        assert!(outcome.sales.is_empty());
        assert_eq!(pos.size_remaining, Decimal::ZERO);
    }

    #[test]
    fn test_no_action_below_first_level_above_floor() {
        let engine = engine();
        let mut pos = make_position(dec!(1.0), dec!(10));

        let outcome = engine.apply_update(&mut pos, dec!(1.5), WalletAction::None);

        assert!(outcome.sales.is_empty());
        assert!(!outcome.closed);
        assert_eq!(pos.size_remaining, dec!(10));
        assert_eq!(pos.highest_price_seen, dec!(1.5));
    }
}
