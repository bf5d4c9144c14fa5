//! Daily trade budget: caps how many copy-trades are issued per calendar day.

use chrono::NaiveDate;
use tracing::{debug, info};

/// Counter of copy-trades issued today, reset at the day boundary.
///
/// One instance exists per run, owned by the orchestrator behind a single
/// mutex when wallets are polled concurrently. Day comparison always uses a
/// caller-supplied date so a long-running loop never misses the rollover and
/// tests can inject arbitrary dates.
#[derive(Debug, Clone)]
pub struct TradeBudget {
    count: u32,
    current_day: NaiveDate,
    max_per_day: u32,
}

impl TradeBudget {
    /// Fresh budget starting with zero trades on `today`.
    pub fn new(max_per_day: u32, today: NaiveDate) -> Self {
        Self {
            count: 0,
            current_day: today,
            max_per_day,
        }
    }

    /// Rebuild a budget from checkpointed state.
    pub fn restore(max_per_day: u32, day: NaiveDate, count: u32) -> Self {
        Self {
            count: count.min(max_per_day),
            current_day: day,
            max_per_day,
        }
    }

    /// Reset the counter when the wall-clock date has advanced. Idempotent.
    pub fn roll_if_new_day(&mut self, today: NaiveDate) {
        if today != self.current_day {
            info!(
                previous_day = %self.current_day,
                day = %today,
                spent = self.count,
                "Resetting daily trade count"
            );
            self.count = 0;
            self.current_day = today;
        }
    }

    /// Reserve one trade slot for `today`.
    ///
    /// Rolls the day first, then increments iff the cap has not been
    /// reached. Returns false without mutation otherwise.
    pub fn try_reserve(&mut self, today: NaiveDate) -> bool {
        self.roll_if_new_day(today);

        if self.count >= self.max_per_day {
            debug!(count = self.count, cap = self.max_per_day, "Trade budget exhausted");
            return false;
        }

        self.count += 1;
        true
    }

    /// Return a previously reserved slot.
    ///
    /// Only meaningful on the day the reservation was made; a release after
    /// the day rolled is a no-op.
    pub fn release(&mut self, today: NaiveDate) {
        if today == self.current_day {
            self.count = self.count.saturating_sub(1);
        }
    }

    /// Trades issued on the current day.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Slots still available today. Callers must roll the day first.
    pub fn remaining(&self) -> u32 {
        self.max_per_day.saturating_sub(self.count)
    }

    /// Day the counter currently refers to.
    pub fn current_day(&self) -> NaiveDate {
        self.current_day
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_reserve_until_cap() {
        let mut budget = TradeBudget::new(3, day(1));

        assert!(budget.try_reserve(day(1)));
        assert!(budget.try_reserve(day(1)));
        assert!(budget.try_reserve(day(1)));
        assert_eq!(budget.count(), 3);

        // Cap reached: no mutation
        assert!(!budget.try_reserve(day(1)));
        assert_eq!(budget.count(), 3);
    }

    #[test]
    fn test_count_never_exceeds_cap() {
        let mut budget = TradeBudget::new(2, day(1));
        for _ in 0..10 {
            budget.try_reserve(day(1));
            assert!(budget.count() <= 2);
        }
    }

    #[test]
    fn test_rollover_resets_count() {
        let mut budget = TradeBudget::new(2, day(1));
        assert!(budget.try_reserve(day(1)));
        assert!(budget.try_reserve(day(1)));
        assert!(!budget.try_reserve(day(1)));

        // New day: counter resets regardless of prior value
        assert!(budget.try_reserve(day(2)));
        assert_eq!(budget.count(), 1);
        assert_eq!(budget.current_day(), day(2));
    }

    #[test]
    fn test_rollover_is_idempotent() {
        let mut budget = TradeBudget::new(5, day(1));
        budget.try_reserve(day(1));

        budget.roll_if_new_day(day(1));
        assert_eq!(budget.count(), 1);

        budget.roll_if_new_day(day(2));
        budget.roll_if_new_day(day(2));
        assert_eq!(budget.count(), 0);
    }

    #[test]
    fn test_last_slot_race() {
        // Two eligible transactions, one slot left: first wins, second loses
        let mut budget = TradeBudget::new(5, day(1));
        for _ in 0..4 {
            assert!(budget.try_reserve(day(1)));
        }

        assert!(budget.try_reserve(day(1)));
        assert!(!budget.try_reserve(day(1)));
    }

    #[test]
    fn test_release_refunds_same_day_only() {
        let mut budget = TradeBudget::new(2, day(1));
        assert!(budget.try_reserve(day(1)));
        budget.release(day(1));
        assert_eq!(budget.count(), 0);

        assert!(budget.try_reserve(day(1)));
        // A release after the day rolled is dropped
        budget.release(day(2));
        assert_eq!(budget.count(), 1);
    }

    #[test]
    fn test_restore_clamps_to_cap() {
        let budget = TradeBudget::restore(3, day(1), 9);
        assert_eq!(budget.count(), 3);
        assert_eq!(budget.remaining(), 0);
    }
}
