use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_auth::PrincipalId;
use stockledger_core::{DomainError, MovementId, ProductId, PurchaseOrderId, ReceivingRecordId};

/// Physical condition of goods on arrival.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineCondition {
    Good,
    Damaged,
}

/// One product line of a receiving event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivingLine {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Supplier unit cost for this delivery; when present it feeds the
    /// weighted-average cost recomputation.
    pub unit_cost: Option<Decimal>,
    pub condition: LineCondition,
    pub batch: Option<String>,
    pub expiry: Option<NaiveDate>,
}

impl ReceivingLine {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
            unit_cost: None,
            condition: LineCondition::Good,
            batch: None,
            expiry: None,
        }
    }

    pub fn with_unit_cost(mut self, unit_cost: Decimal) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }
}

/// One physical receipt event against a purchase order.
///
/// Many records attach to one order over its partial-receiving lifecycle;
/// each line produces exactly one inventory movement, referenced in
/// `movement_ids` after the event is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivingRecord {
    pub id: ReceivingRecordId,
    pub purchase_order_id: PurchaseOrderId,
    pub received_by: PrincipalId,
    pub lines: Vec<ReceivingLine>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub movement_ids: Vec<MovementId>,
}

impl ReceivingRecord {
    pub fn new(
        id: ReceivingRecordId,
        purchase_order_id: PurchaseOrderId,
        received_by: PrincipalId,
        lines: Vec<ReceivingLine>,
        notes: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if lines.is_empty() {
            return Err(DomainError::validation(
                "receiving event must have at least one line",
            ));
        }
        for line in &lines {
            if line.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "received quantity must be positive for product {}",
                    line.product_id
                )));
            }
            if line.unit_cost.is_some_and(|c| c < Decimal::ZERO) {
                return Err(DomainError::validation(format!(
                    "unit cost cannot be negative for product {}",
                    line.product_id
                )));
            }
        }

        Ok(Self {
            id,
            purchase_order_id,
            received_by,
            lines,
            notes,
            occurred_at,
            movement_ids: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rejects_empty_and_non_positive_lines() {
        let err = ReceivingRecord::new(
            ReceivingRecordId::new(),
            PurchaseOrderId::new(),
            PrincipalId::new(),
            vec![],
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = ReceivingRecord::new(
            ReceivingRecordId::new(),
            PurchaseOrderId::new(),
            PrincipalId::new(),
            vec![ReceivingLine::new(ProductId::new(), 0)],
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn accepts_costed_lines() {
        let record = ReceivingRecord::new(
            ReceivingRecordId::new(),
            PurchaseOrderId::new(),
            PrincipalId::new(),
            vec![ReceivingLine::new(ProductId::new(), 10).with_unit_cost(dec!(4.50))],
            Some("dock B".to_string()),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(record.lines.len(), 1);
        assert!(record.movement_ids.is_empty());
    }
}
