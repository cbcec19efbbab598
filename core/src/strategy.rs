//! Concurrency strategy abstraction.
//!
//! A strategy is the only way seats are debited or credited. All variants
//! share one contract: no overbooking and no lost update under any number of
//! concurrent callers on the same event. They differ only in mechanism:
//!
//! | Kind         | Mechanism                                  | Under contention        |
//! |--------------|--------------------------------------------|-------------------------|
//! | `locking`    | exclusive row hold, check, write, release  | callers queue           |
//! | `atomic`     | one conditional `UPDATE`                   | store serializes writes |
//! | `optimistic` | read revision, compare-and-set, retry      | losers retry (bounded)  |
//!
//! Implementations live in `seat-inventory-runtime`.

use crate::error::InventoryError;
use crate::ledger::SeatLedger;
use crate::types::EventId;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Debits and credits seats on an event's ledger.
pub trait ConcurrencyStrategy: Send + Sync {
    /// Which variant this is.
    fn kind(&self) -> StrategyKind;

    /// Take `seats` from the event's available pool.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if `seats == 0`
    /// - `InsufficientCapacity` if fewer than `seats` remain
    /// - `LedgerNotFound` if the event does not exist
    /// - `ConcurrentUpdateConflict` / `Timeout` if contention could not be resolved in bounds
    fn debit(&self, event_id: EventId, seats: u32) -> BoxFuture<'_, Result<SeatLedger, InventoryError>>;

    /// Return `seats` to the event's available pool.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if `seats == 0`
    /// - `LedgerNotFound` if the event does not exist
    /// - `ConcurrentUpdateConflict` / `Timeout` if contention could not be resolved in bounds
    fn credit(&self, event_id: EventId, seats: u32) -> BoxFuture<'_, Result<SeatLedger, InventoryError>>;
}

/// Names of the available strategies, as used in configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Pessimistic row hold
    Locking,
    /// Single conditional update
    Atomic,
    /// Revision compare-and-set with bounded retries
    Optimistic,
}

impl StrategyKind {
    /// All variants, for tests and benchmarks that exercise each one.
    pub const ALL: [Self; 3] = [Self::Locking, Self::Atomic, Self::Optimistic];

    /// Configuration / metrics label
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Locking => "locking",
            Self::Atomic => "atomic",
            Self::Optimistic => "optimistic",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "locking" | "pessimistic" => Ok(Self::Locking),
            "atomic" | "conditional" => Ok(Self::Atomic),
            "optimistic" | "retry" => Ok(Self::Optimistic),
            other => Err(format!("Unknown concurrency strategy: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_kind_parsing() {
        assert_eq!("Locking".parse::<StrategyKind>(), Ok(StrategyKind::Locking));
        assert_eq!(" conditional ".parse::<StrategyKind>(), Ok(StrategyKind::Atomic));
        assert_eq!("optimistic".parse::<StrategyKind>(), Ok(StrategyKind::Optimistic));
        assert!("eventual".parse::<StrategyKind>().is_err());
        for kind in StrategyKind::ALL {
            assert_eq!(kind.as_str().parse::<StrategyKind>(), Ok(kind));
        }
    }
}
