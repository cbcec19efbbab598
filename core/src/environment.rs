//! Injected dependencies: time and booking code generation.
//!
//! Both are traits so tests can substitute deterministic implementations
//! (`FixedClock`, `SequentialCodeGenerator` in `seat-inventory-testing`).

use crate::types::{BookingCode, BookingKind};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Clock trait - abstracts time operations for testability
///
/// # Examples
///
/// ```
/// use seat_inventory_core::environment::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// let _now = clock.now();
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Produces customer-facing booking codes.
///
/// Codes only need to be unique; the store's uniqueness constraint is the
/// final arbiter and the coordinator regenerates on collision.
pub trait CodeGenerator: Send + Sync {
    /// Generate a new code for a booking of the given kind.
    fn generate(&self, kind: BookingKind) -> BookingCode;
}

/// `PREFIX-XXXXXXXX` codes built from the first eight hex digits of a v4 UUID.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self, kind: BookingKind) -> BookingCode {
        let uuid = Uuid::new_v4().simple().to_string();
        let suffix: String = uuid.chars().take(8).collect();
        BookingCode::new(format!("{}-{}", kind.code_prefix(), suffix.to_uppercase()))
    }
}
