use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_auth::PrincipalId;
use stockledger_core::{DomainError, MovementId, ProductId, ReferenceId};

use crate::cause::{Direction, MovementCause};

/// One immutable ledger entry recording a stock change.
///
/// Movements are created once and never mutated; a correction is a new
/// movement that references and reverses the original. The only field that
/// ever changes after creation is the `reversed` mark, set when a reversal
/// is recorded against this entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub cause: MovementCause,
    /// Derived at construction from `cause` (and flipped for reversals).
    pub direction: Direction,
    /// Always positive; the sign lives in `direction`.
    pub quantity: i64,
    pub stock_before: i64,
    pub stock_after: i64,
    /// Originating business transaction (sale, receiving event, batch).
    pub reference: ReferenceId,
    pub recorded_by: PrincipalId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
    /// True when this entry compensates another movement.
    pub reversal: bool,
    /// The movement this entry reverses, when `reversal` is set.
    pub reverses: Option<MovementId>,
    /// Set once a reversal has been recorded against this entry.
    pub reversed: bool,
}

impl Movement {
    /// Record a new movement for a business event.
    ///
    /// Direction comes from the cause; `stock_after` is computed, never
    /// supplied. Negative-stock policy is enforced by the record manager,
    /// not here, because only it knows whether an override applies.
    pub fn record(
        id: MovementId,
        product_id: ProductId,
        cause: MovementCause,
        quantity: i64,
        stock_before: i64,
        reference: ReferenceId,
        recorded_by: PrincipalId,
        reason: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if quantity <= 0 {
            return Err(DomainError::validation(format!(
                "movement quantity must be positive, got {quantity}"
            )));
        }

        let direction = cause.direction();
        let stock_after = stock_before + direction.sign() * quantity;

        Ok(Self {
            id,
            product_id,
            cause,
            direction,
            quantity,
            stock_before,
            stock_after,
            reference,
            recorded_by,
            reason: reason.into(),
            occurred_at,
            reversal: false,
            reverses: None,
            reversed: false,
        })
    }

    /// Build the compensating entry for this movement.
    ///
    /// The reversal keeps the original cause and quantity, flips the
    /// direction, and links back to the original. `stock_before` is the
    /// product's stock at reversal time, which may differ from the
    /// original's `stock_after` if other operations committed in between.
    pub fn reversal_of(
        &self,
        id: MovementId,
        stock_before: i64,
        recorded_by: PrincipalId,
        reason: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        let direction = self.direction.opposite();
        Self {
            id,
            product_id: self.product_id,
            cause: self.cause,
            direction,
            quantity: self.quantity,
            stock_before,
            stock_after: stock_before + direction.sign() * self.quantity,
            reference: self.reference,
            recorded_by,
            reason: reason.into(),
            occurred_at,
            reversal: true,
            reverses: Some(self.id),
            reversed: false,
        }
    }

    /// `stock_after == stock_before ± quantity`, sign per direction.
    pub fn balances(&self) -> bool {
        self.stock_after == self.stock_before + self.direction.sign() * self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cause: MovementCause, quantity: i64, stock_before: i64) -> Movement {
        Movement::record(
            MovementId::new(),
            ProductId::new(),
            cause,
            quantity,
            stock_before,
            ReferenceId::new(),
            PrincipalId::new(),
            "test",
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn sale_decrements_stock() {
        let m = sample(MovementCause::Sale, 3, 10);
        assert_eq!(m.direction, Direction::Out);
        assert_eq!(m.stock_after, 7);
        assert!(m.balances());
    }

    #[test]
    fn receipt_increments_stock() {
        let m = sample(MovementCause::PurchaseReceipt, 25, 75);
        assert_eq!(m.direction, Direction::In);
        assert_eq!(m.stock_after, 100);
        assert!(m.balances());
    }

    #[test]
    fn rejects_zero_and_negative_quantities() {
        for quantity in [0, -1, -50] {
            let err = Movement::record(
                MovementId::new(),
                ProductId::new(),
                MovementCause::Sale,
                quantity,
                10,
                ReferenceId::new(),
                PrincipalId::new(),
                "test",
                Utc::now(),
            )
            .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
    }

    #[test]
    fn reversal_flips_direction_and_links_original() {
        let original = sample(MovementCause::Sale, 3, 10);
        let reversal = original.reversal_of(
            MovementId::new(),
            7,
            PrincipalId::new(),
            "void",
            Utc::now(),
        );

        assert_eq!(reversal.direction, Direction::In);
        assert_eq!(reversal.quantity, 3);
        assert_eq!(reversal.stock_after, 10);
        assert_eq!(reversal.reverses, Some(original.id));
        assert!(reversal.reversal);
        assert!(reversal.balances());
        // The original is never edited; reversal is a second ledger entry.
        assert!(!original.reversal);
    }
}
