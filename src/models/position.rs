//! Open copy-position state managed by the strategy engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A position created when a copy-trade executes.
///
/// `size_remaining` only ever shrinks and `highest_price_seen` only ever
/// grows; once `size_remaining` hits zero the position is terminal and the
/// orchestrator stops feeding it updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Mint address of the held token
    pub token: String,

    /// Wallet the entry was copied from
    pub source_wallet: String,

    /// Price paid at entry, in USD per token
    pub buy_price: Decimal,

    /// Highest price observed since entry; the stop-loss floor trails this
    pub highest_price_seen: Decimal,

    /// Tokens still held
    pub size_remaining: Decimal,

    /// Terminal flag; a closed position is never updated again
    pub is_closed: bool,

    /// When the copy-trade executed
    pub opened_at: DateTime<Utc>,

    /// Last strategy update
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Open a position from an executed copy-trade.
    pub fn open(
        token: impl Into<String>,
        source_wallet: impl Into<String>,
        buy_price: Decimal,
        size: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            token: token.into(),
            source_wallet: source_wallet.into(),
            buy_price,
            highest_price_seen: buy_price,
            size_remaining: size,
            is_closed: false,
            opened_at: now,
            updated_at: now,
        }
    }

    /// Price multiple relative to entry.
    pub fn gain_multiple(&self, current_price: Decimal) -> Decimal {
        if self.buy_price.is_zero() {
            return Decimal::ZERO;
        }
        current_price / self.buy_price
    }

    /// Reduce the held size, clamped at zero. Returns the amount actually
    /// removed.
    pub fn reduce(&mut self, amount: Decimal) -> Decimal {
        let sold = amount.min(self.size_remaining).max(Decimal::ZERO);
        self.size_remaining -= sold;
        sold
    }

    /// Raise the trailing high-water mark if the price exceeds it.
    pub fn observe_price(&mut self, current_price: Decimal) {
        if current_price > self.highest_price_seen {
            self.highest_price_seen = current_price;
        }
    }

    /// Record that a strategy update ran.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Empty the position and mark it terminal.
    pub fn close(&mut self) -> Decimal {
        let sold = self.size_remaining;
        self.size_remaining = Decimal::ZERO;
        self.is_closed = true;
        sold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_open_position() {
        let pos = Position::open("mint", "wallet1", dec!(1.0), dec!(10));
        assert_eq!(pos.highest_price_seen, dec!(1.0));
        assert_eq!(pos.size_remaining, dec!(10));
        assert!(!pos.is_closed);
    }

    #[test]
    fn test_reduce_clamps_at_zero() {
        let mut pos = Position::open("mint", "wallet1", dec!(1.0), dec!(10));
        assert_eq!(pos.reduce(dec!(4)), dec!(4));
        assert_eq!(pos.size_remaining, dec!(6));

        // Over-reduction sells only what is left
        assert_eq!(pos.reduce(dec!(100)), dec!(6));
        assert_eq!(pos.size_remaining, Decimal::ZERO);
    }

    #[test]
    fn test_observe_price_is_monotonic() {
        let mut pos = Position::open("mint", "wallet1", dec!(1.0), dec!(10));
        pos.observe_price(dec!(3.0));
        assert_eq!(pos.highest_price_seen, dec!(3.0));

        pos.observe_price(dec!(2.0));
        assert_eq!(pos.highest_price_seen, dec!(3.0));
    }

    #[test]
    fn test_close_empties_position() {
        let mut pos = Position::open("mint", "wallet1", dec!(1.0), dec!(10));
        assert_eq!(pos.close(), dec!(10));
        assert_eq!(pos.size_remaining, Decimal::ZERO);
        assert!(pos.is_closed);
    }
}
