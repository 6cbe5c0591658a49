//! Risk manager.
//!
//! Single owner of the rolling daily notional counter. Enforces the
//! per-trade ceiling, the daily ceiling, and the minimum trade size.
//!
//! Capacity is taken through an atomic reserve → commit/release cycle:
//! `reserve` checks and holds capacity in one critical section, so two
//! concurrent callers can never both pass a check that together would
//! exceed the daily ceiling. `check_trade_risk` remains available as the
//! advisory, read-only form of the same rules.
//!
//! Day rollover is lazy: every counter access first compares the wall
//! clock date to the stored day and zeroes the accumulator, reservations,
//! and trade log when the date has advanced, inside the same critical
//! section as the access itself.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::types::{RiskCheckResult, RiskJournal, TradeRecord};

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Global risk ceilings, in home-asset major units.
#[derive(Debug, Clone)]
pub struct RiskLimits {
    pub max_trade_notional: Decimal,
    pub max_daily_notional: Decimal,
    pub min_trade_size: Decimal,
}

// ---------------------------------------------------------------------------
// Counter
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct DailyCounter {
    current_day: NaiveDate,
    accumulated: Decimal,
    /// Capacity held by in-flight reservations, not yet committed.
    reserved: Decimal,
    trades: Vec<TradeRecord>,
}

impl DailyCounter {
    fn fresh(day: NaiveDate) -> Self {
        Self {
            current_day: day,
            accumulated: Decimal::ZERO,
            reserved: Decimal::ZERO,
            trades: Vec::new(),
        }
    }
}

/// A held slice of daily capacity. Must be resolved with
/// [`RiskManager::commit`] after a successful execution or
/// [`RiskManager::release`] when the trade does not happen.
#[must_use = "a reservation holds daily capacity until committed or released"]
#[derive(Debug)]
pub struct TradeReservation {
    notional: Decimal,
}

impl TradeReservation {
    pub fn notional(&self) -> Decimal {
        self.notional
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Tracks the rolling daily notional and answers "is this trade allowed
/// right now". Exclusively owns the daily counter; no other component
/// mutates it.
pub struct RiskManager {
    limits: RiskLimits,
    counter: Mutex<DailyCounter>,
}

impl RiskManager {
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            limits,
            counter: Mutex::new(DailyCounter::fresh(Utc::now().date_naive())),
        }
    }

    /// Rebuild the manager from a persisted journal. A journal from an
    /// earlier day seeds an already-stale counter, which the lazy rollover
    /// zeroes on first access.
    pub fn restore(limits: RiskLimits, journal: RiskJournal) -> Self {
        info!(
            day = %journal.day,
            accumulated = %journal.accumulated_notional,
            trades = journal.trades.len(),
            "Risk counter restored from journal"
        );
        Self {
            limits,
            counter: Mutex::new(DailyCounter {
                current_day: journal.day,
                accumulated: journal.accumulated_notional,
                reserved: Decimal::ZERO,
                trades: journal.trades,
            }),
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    // -- Internal helpers ------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, DailyCounter> {
        // A poisoned counter still holds consistent numbers; keep serving.
        self.counter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn roll_if_needed(counter: &mut DailyCounter) {
        let today = Utc::now().date_naive();
        if today > counter.current_day {
            info!(
                from = %counter.current_day,
                to = %today,
                cleared = %counter.accumulated,
                "Daily risk counter rolled over"
            );
            *counter = DailyCounter::fresh(today);
        }
    }

    /// Evaluate all three rules against a counter. Never short-circuits;
    /// the caller sees every violated rule at once.
    fn evaluate(&self, counter: &DailyCounter, notional: Decimal, max_trade: Decimal) -> RiskCheckResult {
        let mut violations = Vec::new();

        if notional < self.limits.min_trade_size {
            violations.push(format!(
                "trade notional {notional} below minimum trade size {}",
                self.limits.min_trade_size
            ));
        }
        if notional > max_trade {
            violations.push(format!(
                "trade notional {notional} exceeds per-trade limit {max_trade}"
            ));
        }
        let committed_and_held = counter.accumulated + counter.reserved;
        if committed_and_held + notional > self.limits.max_daily_notional {
            violations.push(format!(
                "daily volume {committed_and_held} + {notional} exceeds daily limit {}",
                self.limits.max_daily_notional
            ));
        }

        RiskCheckResult {
            passed: violations.is_empty(),
            violations,
            current_daily_volume: counter.accumulated,
            remaining_daily_capacity: (self.limits.max_daily_notional - committed_and_held)
                .max(Decimal::ZERO),
        }
    }

    fn effective_max_trade(&self, max_trade_override: Option<Decimal>) -> Decimal {
        max_trade_override.unwrap_or(self.limits.max_trade_notional)
    }

    // -- Contract --------------------------------------------------------

    /// Advisory check: would a trade of this notional pass right now?
    /// Does not hold capacity; use [`reserve`](Self::reserve) when the
    /// answer gates an actual execution.
    pub fn check_trade_risk(
        &self,
        notional: Decimal,
        max_trade_override: Option<Decimal>,
    ) -> RiskCheckResult {
        let mut counter = self.lock();
        Self::roll_if_needed(&mut counter);
        self.evaluate(&counter, notional, self.effective_max_trade(max_trade_override))
    }

    /// Atomically check and hold daily capacity for a trade. On a passing
    /// check the capacity is reserved before the lock is dropped, so
    /// concurrent callers observe it immediately.
    pub fn reserve(
        &self,
        notional: Decimal,
        max_trade_override: Option<Decimal>,
    ) -> Result<TradeReservation, RiskCheckResult> {
        let mut counter = self.lock();
        Self::roll_if_needed(&mut counter);

        let result = self.evaluate(&counter, notional, self.effective_max_trade(max_trade_override));
        if !result.passed {
            debug!(%notional, violations = result.violations.len(), "Reservation refused");
            return Err(result);
        }

        counter.reserved += notional;
        debug!(%notional, reserved = %counter.reserved, "Capacity reserved");
        Ok(TradeReservation { notional })
    }

    /// Convert a reservation into recorded daily volume after a successful
    /// (or ambiguous) execution.
    pub fn commit(&self, reservation: TradeReservation, pair_id: &str, signature: Option<String>) {
        let mut counter = self.lock();
        Self::roll_if_needed(&mut counter);
        // A trade confirmed after midnight counts against the new day; the
        // rollover already dropped its reservation.
        counter.reserved = (counter.reserved - reservation.notional).max(Decimal::ZERO);
        counter.accumulated += reservation.notional;
        counter.trades.push(TradeRecord {
            id: Uuid::new_v4(),
            pair_id: pair_id.to_string(),
            notional: reservation.notional,
            signature,
            executed_at: Utc::now(),
        });
        info!(
            pair_id,
            notional = %reservation.notional,
            daily_volume = %counter.accumulated,
            "Trade recorded against daily counter"
        );
    }

    /// Return held capacity when the trade did not happen.
    pub fn release(&self, reservation: TradeReservation) {
        let mut counter = self.lock();
        Self::roll_if_needed(&mut counter);
        counter.reserved = (counter.reserved - reservation.notional).max(Decimal::ZERO);
        debug!(notional = %reservation.notional, "Reservation released");
    }

    /// Record an executed trade directly. Must only be called after a
    /// successful execution, never speculatively; execution paths that
    /// reserved first should use [`commit`](Self::commit) instead.
    pub fn record_trade(&self, notional: Decimal, pair_id: &str, signature: Option<String>) {
        let mut counter = self.lock();
        Self::roll_if_needed(&mut counter);
        counter.accumulated += notional;
        counter.trades.push(TradeRecord {
            id: Uuid::new_v4(),
            pair_id: pair_id.to_string(),
            notional,
            signature,
            executed_at: Utc::now(),
        });
        info!(pair_id, %notional, daily_volume = %counter.accumulated, "Trade recorded");
    }

    /// Notional recorded against the ceiling so far today.
    pub fn daily_volume(&self) -> Decimal {
        let mut counter = self.lock();
        Self::roll_if_needed(&mut counter);
        counter.accumulated
    }

    /// Daily capacity not yet recorded or held by a reservation.
    pub fn remaining_capacity(&self) -> Decimal {
        let mut counter = self.lock();
        Self::roll_if_needed(&mut counter);
        (self.limits.max_daily_notional - counter.accumulated - counter.reserved)
            .max(Decimal::ZERO)
    }

    /// Manually zero the counter and trade log for the current day.
    pub fn reset_daily_counters(&self) {
        let mut counter = self.lock();
        warn!(cleared = %counter.accumulated, "Daily risk counters manually reset");
        *counter = DailyCounter::fresh(Utc::now().date_naive());
    }

    /// Snapshot the counter for persistence.
    pub fn snapshot(&self) -> RiskJournal {
        let mut counter = self.lock();
        Self::roll_if_needed(&mut counter);
        RiskJournal {
            day: counter.current_day,
            accumulated_notional: counter.accumulated,
            trades: counter.trades.clone(),
        }
    }

    /// Force the stored day (for rollover tests).
    #[cfg(test)]
    pub fn force_day(&self, day: NaiveDate) {
        self.lock().current_day = day;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
