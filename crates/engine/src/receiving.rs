//! End-to-end receiving workflow.
//!
//! One receiving event: permission gate, pending-quantity validation
//! (over-receipt needs explicit confirmation), all-or-nothing engine apply
//! with the receiving record id as the movement reference, received-counter
//! update, automatic status transition, and finally the durable
//! `ReceivingRecord` carrying the resulting movement ids.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use stockledger_auth::{Principal, authorize, perms};
use stockledger_core::{Clock, DomainError, MovementId, PurchaseOrderId, ReceivingRecordId};
use stockledger_movements::{MovementCause, weighted_average_cost};
use stockledger_purchasing::{
    PurchaseOrder, PurchaseOrderStatus, ReceivingLine, ReceivingRecord, TransitionError,
};
use stockledger_store::{AuditSink, InventoryStore, StoreError};

use crate::engine::{InventoryUpdateEngine, MovementLine};
use crate::error::EngineError;
use crate::orders::OrderStatusService;
use crate::retry::RetryPolicy;
use crate::validation::{OverReceiptWarning, StockValidationService};

/// Outcome of one committed receiving event.
#[derive(Debug)]
pub struct ReceiveResult {
    pub record_id: ReceivingRecordId,
    pub order: PurchaseOrder,
    pub movement_ids: Vec<MovementId>,
    /// Over-receipt warnings the caller explicitly confirmed.
    pub confirmed_warnings: Vec<OverReceiptWarning>,
}

/// Receiving façade over validation, the update engine and the order state
/// machine.
pub struct ReceivingService<S> {
    validation: StockValidationService<S>,
    engine: InventoryUpdateEngine<S>,
    store: S,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl<S: InventoryStore> ReceivingService<S> {
    pub fn new(
        validation: StockValidationService<S>,
        engine: InventoryUpdateEngine<S>,
        store: S,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            validation,
            engine,
            store,
            audit,
            clock,
            retry,
        }
    }

    /// Book one physical receipt against a purchase order.
    ///
    /// The record (and its id) comes from the caller: the id is the
    /// operation's idempotency key, so a retry of the same record after a
    /// transient failure replays the committed movements instead of booking
    /// the goods twice.
    ///
    /// On engine failure nothing transitions: stock was rolled back and the
    /// error names the failing line. On success the order's received
    /// counters advance and the status moves to `partially_received` or
    /// `fully_received` through the same execute path as explicit
    /// transitions.
    #[instrument(
        skip(self, record, principal),
        fields(
            order_id = %record.purchase_order_id,
            record_id = %record.id,
            line_count = record.lines.len(),
            confirm_over_receipt,
        ),
        err
    )]
    pub fn receive_goods(
        &self,
        mut record: ReceivingRecord,
        principal: &Principal,
        confirm_over_receipt: bool,
    ) -> Result<ReceiveResult, EngineError> {
        authorize(principal, &perms::RECEIVE_GOODS).map_err(|_| EngineError::Unauthorized {
            required: perms::RECEIVE_GOODS.as_str().to_string(),
        })?;

        let order_id = record.purchase_order_id;
        let order = self
            .store
            .get_purchase_order(order_id)?
            .ok_or_else(|| EngineError::NotFound(format!("purchase order {order_id}")))?;

        // Replay of an already-booked receipt. Checked before the status
        // gate: the retry of a completing receipt arrives after the order
        // left a receivable status.
        if let Some(existing) = self.find_record(order_id, record.id)? {
            return Ok(ReceiveResult {
                record_id: existing.id,
                order,
                movement_ids: existing.movement_ids,
                confirmed_warnings: Vec::new(),
            });
        }

        if !order.status.allows_receiving() {
            return Err(EngineError::Transition(TransitionError::Precondition(
                format!("order status '{}' does not allow receiving", order.status),
            )));
        }

        let validation = self.validation.validate_receipt(&order, &record.lines)?;
        if !validation.warnings.is_empty() && !confirm_over_receipt {
            return Err(EngineError::UnconfirmedOverReceipt(validation.warnings));
        }

        let movement_lines = coalesce_lines(&record.lines)?;

        let result = self.engine.apply(
            record.id.into(),
            &movement_lines,
            MovementCause::PurchaseReceipt,
            principal.principal_id,
            &format!("receipt {} against order {order_id}", record.id),
        )?;
        record.movement_ids = result.into_movement_ids()?;

        let order = self.book_receipt(order_id, &record, principal, self.clock.now())?;

        match self.store.insert_receiving_record(&record) {
            // A concurrent retry of the same record won the insert race.
            Ok(()) | Err(StoreError::Duplicate(_)) => {}
            Err(e) => return Err(e.into()),
        }

        Ok(ReceiveResult {
            record_id: record.id,
            order,
            movement_ids: record.movement_ids,
            confirmed_warnings: validation.warnings,
        })
    }

    fn find_record(
        &self,
        order_id: PurchaseOrderId,
        record_id: ReceivingRecordId,
    ) -> Result<Option<ReceivingRecord>, EngineError> {
        Ok(self
            .store
            .receiving_records_for_order(order_id)?
            .into_iter()
            .find(|r| r.id == record_id))
    }

    /// Advance the order's received counters and status under CAS.
    ///
    /// Fresh-read loop: a concurrent receipt against the same order loses
    /// the version race and retries against the updated counters.
    fn book_receipt(
        &self,
        order_id: PurchaseOrderId,
        record: &ReceivingRecord,
        principal: &Principal,
        occurred_at: DateTime<Utc>,
    ) -> Result<PurchaseOrder, EngineError> {
        let mut attempt = 1;
        loop {
            let mut order = self
                .store
                .get_purchase_order(order_id)?
                .ok_or_else(|| EngineError::NotFound(format!("purchase order {order_id}")))?;
            let expected_version = order.version;

            for line in &record.lines {
                order.record_receipt(line.product_id, line.quantity)?;
            }

            let transitions = self.advance_status(&mut order, principal, occurred_at)?;

            match self.store.update_purchase_order(&order, expected_version) {
                Ok(()) => {
                    for transition in &transitions {
                        self.audit.status_changed(order.id, transition);
                    }
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

    /// Automatic receiving-driven transitions, through the shared execute
    /// path.
    ///
    /// The table has no `approved -> fully_received` edge, so a single
    /// receipt that completes a just-approved order passes through
    /// `partially_received` first; both hops land in the audit history.
    fn advance_status(
        &self,
        order: &mut PurchaseOrder,
        principal: &Principal,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<stockledger_purchasing::StatusTransition>, EngineError> {
        let target = if order.is_fully_received() {
            PurchaseOrderStatus::FullyReceived
        } else {
            PurchaseOrderStatus::PartiallyReceived
        };
        if order.status == target {
            return Ok(Vec::new());
        }

        let mut transitions = Vec::new();
        if target == PurchaseOrderStatus::FullyReceived
            && order.status == PurchaseOrderStatus::Approved
        {
            transitions.push(OrderStatusService::<S>::execute(
                order,
                PurchaseOrderStatus::PartiallyReceived,
                principal,
                "goods received",
                occurred_at,
            )?);
        }
        transitions.push(OrderStatusService::<S>::execute(
            order,
            target,
            principal,
            "goods received",
            occurred_at,
        )?);
        Ok(transitions)
    }
}

/// One movement per product.
///
/// Split-batch lines for the same product are summed and their supplier
/// costs blended by quantity, so the movement dedup key
/// (reference, product, cause) stays unique within one receipt while the
/// full quantity is applied. Lines for one product must either all carry a
/// unit cost or none; a partial blend would misprice the movement.
fn coalesce_lines(lines: &[ReceivingLine]) -> Result<Vec<MovementLine>, EngineError> {
    let mut coalesced: Vec<MovementLine> = Vec::new();
    for line in lines {
        match coalesced.iter_mut().find(|l| l.product_id == line.product_id) {
            Some(existing) => {
                existing.unit_cost = match (existing.unit_cost, line.unit_cost) {
                    (Some(current), Some(received)) => Some(weighted_average_cost(
                        existing.quantity,
                        current,
                        line.quantity,
                        received,
                    )?),
                    (None, None) => None,
                    _ => {
                        return Err(EngineError::Domain(DomainError::validation(format!(
                            "split lines for product {} must either all carry a unit cost or none",
                            line.product_id
                        ))));
                    }
                };
                existing.quantity += line.quantity;
            }
            None => coalesced.push(MovementLine {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_cost: line.unit_cost,
                allow_negative: false,
            }),
        }
    }
    Ok(coalesced)
}
