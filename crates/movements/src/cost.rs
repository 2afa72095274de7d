//! Weighted-average unit cost.
//!
//! Recomputed on every receipt event as a quantity-weighted blend of the
//! current cost and the received cost. Pure and stateless; safe to call
//! concurrently.

use rust_decimal::{Decimal, RoundingStrategy};

use stockledger_core::DomainError;

/// Fixed currency precision for unit costs.
pub const COST_SCALE: u32 = 4;

/// Blend the current weighted-average cost with a receipt.
///
/// `new = (current_qty * current_cost + received_qty * received_cost)
///        / (current_qty + received_qty)`,
/// rounded half-to-even to [`COST_SCALE`] places so repeated receipts do not
/// accumulate a rounding bias.
pub fn weighted_average_cost(
    current_qty: i64,
    current_cost: Decimal,
    received_qty: i64,
    received_cost: Decimal,
) -> Result<Decimal, DomainError> {
    if current_qty < 0 || received_qty < 0 {
        return Err(DomainError::validation(format!(
            "cost input quantities must be non-negative (current {current_qty}, received {received_qty})"
        )));
    }
    if current_cost < Decimal::ZERO || received_cost < Decimal::ZERO {
        return Err(DomainError::validation(
            "cost input costs must be non-negative",
        ));
    }

    let total_qty = current_qty + received_qty;
    if total_qty == 0 {
        return Err(DomainError::validation(
            "cannot average cost over zero combined quantity",
        ));
    }

    let blended = (Decimal::from(current_qty) * current_cost
        + Decimal::from(received_qty) * received_cost)
        / Decimal::from(total_qty);

    Ok(blended.round_dp_with_strategy(COST_SCALE, RoundingStrategy::MidpointNearestEven))
}
