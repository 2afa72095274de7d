//! Audit sink for ledger and lifecycle events.
//!
//! Every movement and every status change is reported here in addition to
//! being persisted. The default sink writes structured tracing events; tests
//! use the in-memory sink to assert on the emitted trail.

use std::sync::Mutex;

use stockledger_core::PurchaseOrderId;
use stockledger_movements::Movement;
use stockledger_purchasing::StatusTransition;

/// Consumer of audit events. Implementations must not fail: auditing is
/// observational and never vetoes the operation that produced the event.
pub trait AuditSink: Send + Sync {
    fn movement_recorded(&self, movement: &Movement);

    fn status_changed(&self, order_id: PurchaseOrderId, transition: &StatusTransition);

    /// A product was placed on hold after an unrecoverable rollback failure.
    fn product_held(&self, movement: &Movement, reason: &str);
}

impl<S> AuditSink for std::sync::Arc<S>
where
    S: AuditSink + ?Sized,
{
    fn movement_recorded(&self, movement: &Movement) {
        (**self).movement_recorded(movement)
    }

    fn status_changed(&self, order_id: PurchaseOrderId, transition: &StatusTransition) {
        (**self).status_changed(order_id, transition)
    }

    fn product_held(&self, movement: &Movement, reason: &str) {
        (**self).product_held(movement, reason)
    }
}

/// Emits audit events as structured tracing events on the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn movement_recorded(&self, movement: &Movement) {
        tracing::info!(
            target: "audit",
            movement_id = %movement.id,
            product_id = %movement.product_id,
            cause = movement.cause.as_str(),
            direction = ?movement.direction,
            quantity = movement.quantity,
            stock_before = movement.stock_before,
            stock_after = movement.stock_after,
            reference = %movement.reference,
            recorded_by = %movement.recorded_by,
            reversal = movement.reversal,
            "movement recorded"
        );
    }

    fn status_changed(&self, order_id: PurchaseOrderId, transition: &StatusTransition) {
        tracing::info!(
            target: "audit",
            order_id = %order_id,
            from = transition.from.as_str(),
            to = transition.to.as_str(),
            changed_by = %transition.changed_by,
            reason = %transition.reason,
            "purchase order status changed"
        );
    }

    fn product_held(&self, movement: &Movement, reason: &str) {
        tracing::error!(
            target: "audit",
            movement_id = %movement.id,
            product_id = %movement.product_id,
            reason,
            "product placed on hold"
        );
    }
}

/// Audit event captured by [`InMemoryAuditSink`].
#[derive(Debug, Clone)]
pub enum AuditEvent {
    MovementRecorded(Movement),
    StatusChanged {
        order_id: PurchaseOrderId,
        transition: StatusTransition,
    },
    ProductHeld {
        movement: Movement,
        reason: String,
    },
}

/// Test sink that captures events for assertions.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn push(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn movement_recorded(&self, movement: &Movement) {
        self.push(AuditEvent::MovementRecorded(movement.clone()));
    }

    fn status_changed(&self, order_id: PurchaseOrderId, transition: &StatusTransition) {
        self.push(AuditEvent::StatusChanged {
            order_id,
            transition: transition.clone(),
        });
    }

    fn product_held(&self, movement: &Movement, reason: &str) {
        self.push(AuditEvent::ProductHeld {
            movement: movement.clone(),
            reason: reason.to_string(),
        });
    }
}
