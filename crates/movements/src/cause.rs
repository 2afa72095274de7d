use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockledger_core::DomainError;

/// Direction of a stock change.
///
/// Never persisted or accepted independently of a cause; see
/// [`MovementCause::direction`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::In => Direction::Out,
            Direction::Out => Direction::In,
        }
    }

    /// Signed multiplier for stock arithmetic.
    pub fn sign(self) -> i64 {
        match self {
            Direction::In => 1,
            Direction::Out => -1,
        }
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        })
    }
}

/// Fixed enumeration of business events that move stock.
///
/// The enumeration is closed: an unknown cause cannot exist past the parse
/// boundary ([`FromStr`] / serde reject it), so every stored movement has a
/// well-defined direction by construction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementCause {
    Sale,
    PurchaseReceipt,
    AdjustmentIn,
    AdjustmentOut,
    TransferIn,
    TransferOut,
    ReturnIn,
    ReturnOut,
    Damage,
    Shrinkage,
}

impl MovementCause {
    /// Every cause, for exhaustive table-driven tests.
    pub const ALL: [MovementCause; 10] = [
        MovementCause::Sale,
        MovementCause::PurchaseReceipt,
        MovementCause::AdjustmentIn,
        MovementCause::AdjustmentOut,
        MovementCause::TransferIn,
        MovementCause::TransferOut,
        MovementCause::ReturnIn,
        MovementCause::ReturnOut,
        MovementCause::Damage,
        MovementCause::Shrinkage,
    ];

    /// Map a cause to its direction.
    ///
    /// This match is the single source of truth for the sign of a stock
    /// change. No other component may compute direction independently.
    pub fn direction(self) -> Direction {
        match self {
            MovementCause::PurchaseReceipt
            | MovementCause::AdjustmentIn
            | MovementCause::TransferIn
            | MovementCause::ReturnIn => Direction::In,

            MovementCause::Sale
            | MovementCause::AdjustmentOut
            | MovementCause::TransferOut
            | MovementCause::ReturnOut
            | MovementCause::Damage
            | MovementCause::Shrinkage => Direction::Out,
        }
    }

    /// Whether this cause may drive stock below zero.
    ///
    /// Only outbound adjustments (correcting a prior counting error) may do
    /// so, and only when the caller passes an explicit override.
    pub fn may_drive_negative(self) -> bool {
        matches!(self, MovementCause::AdjustmentOut)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MovementCause::Sale => "sale",
            MovementCause::PurchaseReceipt => "purchase_receipt",
            MovementCause::AdjustmentIn => "adjustment_in",
            MovementCause::AdjustmentOut => "adjustment_out",
            MovementCause::TransferIn => "transfer_in",
            MovementCause::TransferOut => "transfer_out",
            MovementCause::ReturnIn => "return_in",
            MovementCause::ReturnOut => "return_out",
            MovementCause::Damage => "damage",
            MovementCause::Shrinkage => "shrinkage",
        }
    }
}

impl core::fmt::Display for MovementCause {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementCause {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MovementCause::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| DomainError::unknown_cause(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn inbound_causes_map_to_in() {
        for cause in [
            MovementCause::PurchaseReceipt,
            MovementCause::AdjustmentIn,
            MovementCause::TransferIn,
            MovementCause::ReturnIn,
        ] {
            assert_eq!(cause.direction(), Direction::In, "{cause}");
        }
    }

    #[test]
    fn outbound_causes_map_to_out() {
        for cause in [
            MovementCause::Sale,
            MovementCause::AdjustmentOut,
            MovementCause::TransferOut,
            MovementCause::ReturnOut,
            MovementCause::Damage,
            MovementCause::Shrinkage,
        ] {
            assert_eq!(cause.direction(), Direction::Out, "{cause}");
        }
    }

    #[test]
    fn unknown_cause_fails_never_defaults() {
        let err = "restock".parse::<MovementCause>().unwrap_err();
        assert_eq!(
            err,
            stockledger_core::DomainError::UnknownCause("restock".to_string())
        );
    }

    #[test]
    fn string_form_round_trips_for_every_cause() {
        for cause in MovementCause::ALL {
            assert_eq!(cause.as_str().parse::<MovementCause>().unwrap(), cause);
        }
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&MovementCause::PurchaseReceipt).unwrap();
        assert_eq!(json, "\"purchase_receipt\"");
        let json = serde_json::to_string(&Direction::Out).unwrap();
        assert_eq!(json, "\"OUT\"");
    }

    proptest! {
        /// Direction resolution is deterministic: same cause, same direction,
        /// on every call.
        #[test]
        fn direction_is_deterministic(idx in 0usize..MovementCause::ALL.len()) {
            let cause = MovementCause::ALL[idx];
            prop_assert_eq!(cause.direction(), cause.direction());
        }

        /// Arbitrary strings outside the enumeration never parse.
        #[test]
        fn arbitrary_strings_do_not_parse(s in "[a-z_]{1,24}") {
            let known = MovementCause::ALL.iter().any(|c| c.as_str() == s);
            prop_assert_eq!(s.parse::<MovementCause>().is_ok(), known);
        }
    }
}
