//! All-or-nothing application of multi-line operations.
//!
//! One operation (a sale's lines, one receiving event's lines) is applied
//! line by line in the caller's order. Lines do not share a native store
//! transaction, so atomicity is compensating: the first failure stops the
//! loop and every already-committed line is reversed in strict reverse
//! order. Crash tolerance between "movement committed" and "reversal issued"
//! rests on the movement dedup key, which makes re-driving the same
//! operation safe.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, instrument, warn};

use stockledger_auth::PrincipalId;
use stockledger_core::{MovementId, ProductId, ReferenceId};
use stockledger_movements::{Movement, MovementCause};
use stockledger_store::{AuditSink, InventoryStore, StoreError};

use crate::error::EngineError;
use crate::manager::{MovementRecordManager, MovementRequest};
use crate::retry::RetryPolicy;

/// One line of an operation.
#[derive(Debug, Clone)]
pub struct MovementLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_cost: Option<Decimal>,
    pub allow_negative: bool,
}

impl MovementLine {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
            unit_cost: None,
            allow_negative: false,
        }
    }
}

/// Per-line outcome inside an [`UpdateResult`].
#[derive(Debug)]
pub struct LineOutcome {
    pub product_id: ProductId,
    pub movement_id: Option<MovementId>,
    pub error: Option<String>,
}

/// Result of applying one operation.
///
/// `success: false` means the operation failed and its committed lines were
/// rolled back; the failing line and the count of lines committed before it
/// are reported so the caller can say exactly what happened.
#[derive(Debug)]
pub struct UpdateResult {
    pub operation: ReferenceId,
    pub success: bool,
    pub lines: Vec<LineOutcome>,
    pub failed_line: Option<usize>,
    pub processed_before_failure: usize,
    pub error: Option<EngineError>,
}

impl UpdateResult {
    pub fn movement_ids(&self) -> Vec<MovementId> {
        self.lines.iter().filter_map(|l| l.movement_id).collect()
    }

    /// Consume the result, yielding the movement ids on success and the
    /// line-specific error otherwise.
    pub fn into_movement_ids(self) -> Result<Vec<MovementId>, EngineError> {
        if self.success {
            Ok(self.movement_ids())
        } else {
            Err(self.error.unwrap_or_else(|| {
                EngineError::Store(StoreError::Backend(
                    "operation failed without a recorded cause".to_string(),
                ))
            }))
        }
    }
}

/// Orchestrates one logical operation across N product lines.
pub struct InventoryUpdateEngine<S> {
    manager: MovementRecordManager<S>,
    audit: Arc<dyn AuditSink>,
    retry: RetryPolicy,
}

impl<S: InventoryStore> InventoryUpdateEngine<S> {
    pub fn new(
        manager: MovementRecordManager<S>,
        audit: Arc<dyn AuditSink>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            manager,
            audit,
            retry,
        }
    }

    pub fn manager(&self) -> &MovementRecordManager<S> {
        &self.manager
    }

    fn store(&self) -> &S {
        self.manager.store()
    }

    /// Apply every line of one operation, or none.
    ///
    /// Returns `Ok` with a failure result when the operation failed but the
    /// rollback completed; returns `Err(CriticalIntegrity)` only when a
    /// reversal itself failed and the affected product was placed on hold.
    #[instrument(
        skip(self, lines),
        fields(operation = %operation, cause = cause.as_str(), line_count = lines.len()),
        err
    )]
    pub fn apply(
        &self,
        operation: ReferenceId,
        lines: &[MovementLine],
        cause: MovementCause,
        principal_id: PrincipalId,
        reason: &str,
    ) -> Result<UpdateResult, EngineError> {
        let mut outcomes: Vec<LineOutcome> = Vec::with_capacity(lines.len());
        let mut committed: Vec<Movement> = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            let request = MovementRequest {
                product_id: line.product_id,
                cause,
                quantity: line.quantity,
                reference: operation,
                reason: reason.to_string(),
                unit_cost: line.unit_cost,
                allow_negative: line.allow_negative,
            };

            let failure = match self.manager.create_movement(&request, principal_id) {
                Ok(movement) => match self.verify_line(&movement) {
                    Ok(()) => {
                        outcomes.push(LineOutcome {
                            product_id: line.product_id,
                            movement_id: Some(movement.id),
                            error: None,
                        });
                        committed.push(movement);
                        continue;
                    }
                    Err(e) => e,
                },
                Err(e) => e,
            };

            warn!(
                operation = %operation,
                line = index,
                product_id = %line.product_id,
                error = %failure,
                "line failed, rolling back committed lines"
            );
            outcomes.push(LineOutcome {
                product_id: line.product_id,
                movement_id: None,
                error: Some(failure.to_string()),
            });

            let processed_before_failure = committed.len();
            self.roll_back(&committed, principal_id, operation)?;

            return Ok(UpdateResult {
                operation,
                success: false,
                lines: outcomes,
                failed_line: Some(index),
                processed_before_failure,
                error: Some(failure),
            });
        }

        Ok(UpdateResult {
            operation,
            success: true,
            lines: outcomes,
            failed_line: None,
            processed_before_failure: 0,
            error: None,
        })
    }

    /// Reverse every non-reversed movement of one operation, newest first.
    ///
    /// Used to void an already-committed operation (e.g. cancelling a sale).
    #[instrument(skip(self), fields(operation = %operation), err)]
    pub fn rollback(
        &self,
        operation: ReferenceId,
        principal_id: PrincipalId,
        reason: &str,
    ) -> Result<Vec<Movement>, EngineError> {
        let movements = self.store().movements_for_reference(operation)?;
        let targets: Vec<Movement> = movements
            .into_iter()
            .filter(|m| !m.reversal && !m.reversed)
            .collect();
        if targets.is_empty() {
            return Err(EngineError::NotFound(format!(
                "reversible movements for operation {operation}"
            )));
        }

        let mut reversals = Vec::with_capacity(targets.len());
        for original in targets.iter().rev() {
            let reversal = self
                .manager
                .reverse_movement(original, principal_id, reason)
                .map_err(|e| self.escalate(original, e))?;
            reversals.push(reversal);
        }
        Ok(reversals)
    }

    /// Post-commit verification.
    ///
    /// Re-read the product and compare against the movement's expected
    /// `stock_after`; on mismatch, re-read once more before judging. A
    /// mismatch is only fatal when the movement row itself is absent, which
    /// means the commit did not actually happen; a present movement with a
    /// different on-hand just means a later writer legitimately moved the
    /// counter.
    fn verify_line(&self, movement: &Movement) -> Result<(), EngineError> {
        for _ in 0..2 {
            let product = self.store().get_product(movement.product_id)?.ok_or_else(
                || EngineError::NotFound(format!("product {}", movement.product_id)),
            )?;
            if product.on_hand == movement.stock_after {
                return Ok(());
            }
            if self.store().get_movement(movement.id)?.is_some() {
                return Ok(());
            }
        }

        Err(EngineError::Store(StoreError::Backend(format!(
            "movement {} reported committed but is not present",
            movement.id
        ))))
    }

    /// Roll back the committed prefix of a failed operation, newest first.
    fn roll_back(
        &self,
        committed: &[Movement],
        principal_id: PrincipalId,
        operation: ReferenceId,
    ) -> Result<(), EngineError> {
        for movement in committed.iter().rev() {
            self.manager
                .reverse_movement(movement, principal_id, format!("rollback of {operation}"))
                .map_err(|e| self.escalate(movement, e))?;
        }
        Ok(())
    }

    /// A reversal failed: freeze the product and surface the integrity
    /// breach. Never silently ignored.
    fn escalate(&self, movement: &Movement, cause: EngineError) -> EngineError {
        let reason = format!(
            "failed to reverse movement {}: {cause}",
            movement.id
        );
        error!(
            product_id = %movement.product_id,
            movement_id = %movement.id,
            error = %cause,
            "reversal failed, placing product on hold"
        );
        self.audit.product_held(movement, &reason);

        if let Err(hold_err) = self.place_hold(movement.product_id, &reason) {
            error!(
                product_id = %movement.product_id,
                error = %hold_err,
                "could not persist product hold"
            );
        }

        EngineError::CriticalIntegrity {
            product: movement.product_id,
            reason,
        }
    }

    fn place_hold(&self, product_id: ProductId, reason: &str) -> Result<(), EngineError> {
        let mut attempt = 1;
        loop {
            let mut product = self
                .store()
                .get_product(product_id)?
                .ok_or_else(|| EngineError::NotFound(format!("product {product_id}")))?;
            product.on_hold = Some(reason.to_string());

            match self.store().update_product(&product, product.version) {
                Ok(()) => return Ok(()),
                Err(StoreError::Conflict(_)) if attempt < self.retry.max_attempts => {
                    self.retry.pause(attempt);
                    attempt += 1;
                }
                Err(e) => return Err(EngineError::Store(e)),
            }
        }
    }
}
