//! `stockledger-movements`: the immutable stock movement ledger.
//!
//! A [`Movement`] is one ledger entry recording a stock change and its cause.
//! Its direction (IN/OUT) is always derived from the cause at write time and
//! is never an independently settable field; [`MovementCause::direction`] is
//! the single source of truth for the sign of every stock change.

pub mod cause;
pub mod cost;
pub mod movement;

pub use cause::{Direction, MovementCause};
pub use cost::{COST_SCALE, weighted_average_cost};
pub use movement::Movement;
