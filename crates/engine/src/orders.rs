//! Purchase order status transitions against the store.
//!
//! Explicit user-driven transitions and the automatic receiving-driven ones
//! go through the same [`OrderStatusService::execute`], so the validation
//! logic cannot diverge between the two paths.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use stockledger_auth::Principal;
use stockledger_core::{Clock, PurchaseOrderId};
use stockledger_purchasing::{PurchaseOrder, PurchaseOrderStatus, StatusTransition, state_machine};
use stockledger_store::{AuditSink, InventoryStore, StoreError};

use crate::error::EngineError;
use crate::retry::RetryPolicy;

/// Validated, audited, CAS-persisted order status changes.
pub struct OrderStatusService<S> {
    store: S,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl<S: InventoryStore> OrderStatusService<S> {
    pub fn new(
        store: S,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            audit,
            clock,
            retry,
        }
    }

    /// Validate and apply one transition in memory, without persisting.
    ///
    /// Rejects with no mutation on an illegal table move, a missing
    /// permission, or a failed precondition.
    pub fn execute(
        order: &mut PurchaseOrder,
        to: PurchaseOrderStatus,
        principal: &Principal,
        reason: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<StatusTransition, EngineError> {
        state_machine::validate(order, to, principal)?;
        let transition =
            order.apply_transition(to, principal.principal_id, reason, occurred_at)?;
        Ok(transition)
    }

    /// Load, transition and persist an order.
    #[instrument(skip(self, principal, reason), fields(order_id = %order_id, to = to.as_str()), err)]
    pub fn transition(
        &self,
        order_id: PurchaseOrderId,
        to: PurchaseOrderStatus,
        principal: &Principal,
        reason: &str,
    ) -> Result<PurchaseOrder, EngineError> {
        let mut attempt = 1;
        loop {
            let mut order = self
                .store
                .get_purchase_order(order_id)?
                .ok_or_else(|| EngineError::NotFound(format!("purchase order {order_id}")))?;
            let expected_version = order.version;

            let transition =
                Self::execute(&mut order, to, principal, reason, self.clock.now())?;

            match self.store.update_purchase_order(&order, expected_version) {
                Ok(()) => {
                    self.audit.status_changed(order.id, &transition);
                    order.version = expected_version + 1;
                    return Ok(order);
                }
                Err(StoreError::Conflict(_)) if attempt < self.retry.max_attempts => {
                    self.retry.pause(attempt);
                    attempt += 1;
                }
                Err(StoreError::Conflict(_)) => {
                    return Err(EngineError::Conflict {
                        entity: format!("purchase order {order_id}"),
                        attempts: attempt,
                    });
                }
                Err(e) => return Err(EngineError::Store(e)),
            }
        }
    }
}
