use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_auth::PrincipalId;
use stockledger_core::{DomainError, ProductId, PurchaseOrderId, SupplierId};

use crate::state_machine::{self, TransitionError};

/// Purchase order lifecycle status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    PendingApproval,
    Approved,
    SentToSupplier,
    PartiallyReceived,
    FullyReceived,
    Cancelled,
    Closed,
}

impl PurchaseOrderStatus {
    pub const ALL: [PurchaseOrderStatus; 8] = [
        PurchaseOrderStatus::Draft,
        PurchaseOrderStatus::PendingApproval,
        PurchaseOrderStatus::Approved,
        PurchaseOrderStatus::SentToSupplier,
        PurchaseOrderStatus::PartiallyReceived,
        PurchaseOrderStatus::FullyReceived,
        PurchaseOrderStatus::Cancelled,
        PurchaseOrderStatus::Closed,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Cancelled | PurchaseOrderStatus::Closed
        )
    }

    /// Statuses from which a receiving event may book goods.
    pub fn allows_receiving(self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Approved
                | PurchaseOrderStatus::SentToSupplier
                | PurchaseOrderStatus::PartiallyReceived
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "draft",
            PurchaseOrderStatus::PendingApproval => "pending_approval",
            PurchaseOrderStatus::Approved => "approved",
            PurchaseOrderStatus::SentToSupplier => "sent_to_supplier",
            PurchaseOrderStatus::PartiallyReceived => "partially_received",
            PurchaseOrderStatus::FullyReceived => "fully_received",
            PurchaseOrderStatus::Cancelled => "cancelled",
            PurchaseOrderStatus::Closed => "closed",
        }
    }
}

impl core::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for PurchaseOrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                DomainError::validation(format!("unknown purchase order status '{s}'"))
            })
    }
}

/// One ordered product line with its cumulative received quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub ordered: i64,
    pub received: i64,
    pub unit_cost: Decimal,
}

impl OrderLine {
    /// Ordered minus cumulative received. Negative after a confirmed
    /// over-receipt.
    pub fn pending(&self) -> i64 {
        self.ordered - self.received
    }
}

/// Append-only audit row for one status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: PurchaseOrderStatus,
    pub to: PurchaseOrderStatus,
    pub changed_by: PrincipalId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Purchase order: created in `draft`, mutated only via validated
/// transitions, terminal in `cancelled` or `closed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub status: PurchaseOrderStatus,
    pub lines: Vec<OrderLine>,
    /// Append-only; never truncated or rewritten.
    pub history: Vec<StatusTransition>,
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by the store on every write.
    pub version: u64,
}

impl PurchaseOrder {
    pub fn create(
        id: PurchaseOrderId,
        supplier_id: SupplierId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            supplier_id,
            status: PurchaseOrderStatus::Draft,
            lines: Vec::new(),
            history: Vec::new(),
            created_at,
            version: 0,
        }
    }

    /// Add a line. Only legal while the order is still a draft.
    pub fn add_line(
        &mut self,
        product_id: ProductId,
        ordered: i64,
        unit_cost: Decimal,
    ) -> Result<&OrderLine, DomainError> {
        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::invariant(
                "cannot modify purchase order lines after draft",
            ));
        }
        if ordered <= 0 {
            return Err(DomainError::validation("ordered quantity must be positive"));
        }
        if unit_cost < Decimal::ZERO {
            return Err(DomainError::validation("unit cost cannot be negative"));
        }
        if self.line(product_id).is_some() {
            return Err(DomainError::validation(format!(
                "product {product_id} already has a line on this order"
            )));
        }

        let line_no = (self.lines.len() as u32) + 1;
        self.lines.push(OrderLine {
            line_no,
            product_id,
            ordered,
            received: 0,
            unit_cost,
        });
        Ok(self.lines.last().expect("line just pushed"))
    }

    pub fn line(&self, product_id: ProductId) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    /// Book a received quantity against a line's cumulative counter.
    ///
    /// Over-receipt gating (warning + confirmation) happens in validation
    /// before this is called; the counter itself accepts any positive
    /// quantity so a confirmed over-receipt is recorded truthfully.
    pub fn record_receipt(&mut self, product_id: ProductId, quantity: i64) -> Result<(), DomainError> {
        if quantity <= 0 {
            return Err(DomainError::validation(
                "received quantity must be positive",
            ));
        }
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id)
            .ok_or_else(|| {
                DomainError::validation(format!("product {product_id} is not on this order"))
            })?;
        line.received += quantity;
        Ok(())
    }

    /// True when every line's pending quantity is zero or below.
    pub fn is_fully_received(&self) -> bool {
        !self.lines.is_empty() && self.lines.iter().all(|l| l.pending() <= 0)
    }

    /// True once any quantity has been received on any line.
    pub fn has_any_receipt(&self) -> bool {
        self.lines.iter().any(|l| l.received > 0)
    }

    /// Perform a table-legal transition, appending the audit row.
    ///
    /// Callers are expected to have run [`state_machine::validate`] first
    /// (permission + preconditions); the table check is re-asserted here so
    /// an illegal move can never mutate the order.
    pub fn apply_transition(
        &mut self,
        to: PurchaseOrderStatus,
        changed_by: PrincipalId,
        reason: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<StatusTransition, TransitionError> {
        if !state_machine::can_transition(self.status, to) {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                to,
            });
        }

        let transition = StatusTransition {
            from: self.status,
            to,
            changed_by,
            reason: reason.into(),
            occurred_at,
        };
        self.status = to;
        self.history.push(transition.clone());
        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft_order() -> PurchaseOrder {
        PurchaseOrder::create(PurchaseOrderId::new(), SupplierId::new(), Utc::now())
    }

    #[test]
    fn starts_in_draft_with_no_history() {
        let po = draft_order();
        assert_eq!(po.status, PurchaseOrderStatus::Draft);
        assert!(po.history.is_empty());
        assert!(!po.is_fully_received());
    }

    #[test]
    fn lines_only_editable_in_draft() {
        let mut po = draft_order();
        let product = ProductId::new();
        po.add_line(product, 100, dec!(2.50)).unwrap();

        po.apply_transition(
            PurchaseOrderStatus::PendingApproval,
            PrincipalId::new(),
            "submit",
            Utc::now(),
        )
        .unwrap();

        let err = po.add_line(ProductId::new(), 10, dec!(1)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn rejects_duplicate_product_lines() {
        let mut po = draft_order();
        let product = ProductId::new();
        po.add_line(product, 100, dec!(2.50)).unwrap();
        assert!(po.add_line(product, 50, dec!(2.50)).is_err());
    }

    #[test]
    fn pending_tracks_cumulative_receipts() {
        let mut po = draft_order();
        let product = ProductId::new();
        po.add_line(product, 100, dec!(2.50)).unwrap();

        po.record_receipt(product, 75).unwrap();
        assert_eq!(po.line(product).unwrap().pending(), 25);
        assert!(po.has_any_receipt());
        assert!(!po.is_fully_received());

        po.record_receipt(product, 25).unwrap();
        assert_eq!(po.line(product).unwrap().pending(), 0);
        assert!(po.is_fully_received());
    }

    #[test]
    fn confirmed_over_receipt_is_recorded_truthfully() {
        let mut po = draft_order();
        let product = ProductId::new();
        po.add_line(product, 100, dec!(2.50)).unwrap();

        po.record_receipt(product, 150).unwrap();
        assert_eq!(po.line(product).unwrap().received, 150);
        assert_eq!(po.line(product).unwrap().pending(), -50);
        assert!(po.is_fully_received());
    }

    #[test]
    fn receipt_for_unlisted_product_is_rejected() {
        let mut po = draft_order();
        po.add_line(ProductId::new(), 100, dec!(2.50)).unwrap();
        assert!(po.record_receipt(ProductId::new(), 1).is_err());
    }

    #[test]
    fn illegal_transition_does_not_mutate() {
        let mut po = draft_order();
        let err = po
            .apply_transition(
                PurchaseOrderStatus::FullyReceived,
                PrincipalId::new(),
                "nope",
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition { .. }));
        assert_eq!(po.status, PurchaseOrderStatus::Draft);
        assert!(po.history.is_empty());
    }

    #[test]
    fn history_is_append_only_across_lifecycle() {
        let mut po = draft_order();
        po.add_line(ProductId::new(), 10, dec!(1)).unwrap();
        let actor = PrincipalId::new();

        for to in [
            PurchaseOrderStatus::PendingApproval,
            PurchaseOrderStatus::Approved,
            PurchaseOrderStatus::SentToSupplier,
        ] {
            po.apply_transition(to, actor, "step", Utc::now()).unwrap();
        }

        assert_eq!(po.history.len(), 3);
        assert_eq!(po.history[0].from, PurchaseOrderStatus::Draft);
        assert_eq!(po.history[2].to, PurchaseOrderStatus::SentToSupplier);
    }
}
