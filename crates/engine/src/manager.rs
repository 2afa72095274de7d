//! Movement creation and reversal under optimistic concurrency.
//!
//! The manager is the only writer of ledger entries. It resolves direction
//! from the cause, enforces the negative-stock policy, recomputes the
//! weighted-average cost for costed receipts, and commits the movement and
//! the product projection as one conditional write. CAS losers re-read and
//! retry within the policy's budget.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::instrument;

use stockledger_auth::PrincipalId;
use stockledger_core::{Clock, MovementId, ProductId, ReferenceId};
use stockledger_movements::{Direction, Movement, MovementCause, weighted_average_cost};
use stockledger_products::Product;
use stockledger_store::{AuditSink, InventoryStore, StoreError};

use crate::error::EngineError;
use crate::retry::RetryPolicy;

/// Request to record one movement.
#[derive(Debug, Clone)]
pub struct MovementRequest {
    pub product_id: ProductId,
    pub cause: MovementCause,
    pub quantity: i64,
    /// Originating business transaction; part of the dedup key, so it must
    /// be stable across retries of the same logical operation.
    pub reference: ReferenceId,
    pub reason: String,
    /// Supplier unit cost; when present on an inbound movement the product's
    /// weighted-average cost is recomputed at apply time.
    pub unit_cost: Option<Decimal>,
    /// Permit stock to go negative. Honored only for causes that allow it
    /// (outbound adjustments correcting prior counting errors).
    pub allow_negative: bool,
}

impl MovementRequest {
    pub fn new(
        product_id: ProductId,
        cause: MovementCause,
        quantity: i64,
        reference: ReferenceId,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            product_id,
            cause,
            quantity,
            reference,
            reason: reason.into(),
            unit_cost: None,
            allow_negative: false,
        }
    }
}

/// Creates and reverses ledger entries against the store.
pub struct MovementRecordManager<S> {
    store: S,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl<S: InventoryStore> MovementRecordManager<S> {
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

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Record one movement, idempotently.
    ///
    /// A retry of the same logical operation (same reference, product and
    /// cause) returns the already-committed movement instead of
    /// double-applying the stock change.
    #[instrument(
        skip(self, request),
        fields(
            product_id = %request.product_id,
            cause = request.cause.as_str(),
            quantity = request.quantity,
            reference = %request.reference,
        ),
        err
    )]
    pub fn create_movement(
        &self,
        request: &MovementRequest,
        recorded_by: PrincipalId,
    ) -> Result<Movement, EngineError> {
        if let Some(existing) = self.find_existing(request)? {
            return Ok(existing);
        }

        let mut attempt = 1;
        loop {
            let product = self.load_active_product(request.product_id)?;

            let movement = Movement::record(
                MovementId::new(),
                request.product_id,
                request.cause,
                request.quantity,
                product.on_hand,
                request.reference,
                recorded_by,
                request.reason.clone(),
                self.clock.now(),
            )?;

            if movement.stock_after < 0
                && !(request.cause.may_drive_negative() && request.allow_negative)
            {
                return Err(EngineError::NegativeStock {
                    product: request.product_id,
                    stock_after: movement.stock_after,
                });
            }

            let mut updated = product.clone();
            updated.on_hand = movement.stock_after;
            if movement.direction == Direction::In {
                if let Some(received_cost) = request.unit_cost {
                    // Blend against the quantity this write commits, not the
                    // validation-time snapshot.
                    updated.unit_cost = weighted_average_cost(
                        product.on_hand,
                        product.unit_cost,
                        movement.quantity,
                        received_cost,
                    )?;
                }
            }

            match self
                .store
                .record_movement(&movement, &updated, product.version)
            {
                Ok(()) => {
                    self.audit.movement_recorded(&movement);
                    return Ok(movement);
                }
                Err(StoreError::Conflict(_)) if attempt < self.retry.max_attempts => {
                    self.retry.pause(attempt);
                    attempt += 1;
                }
                Err(StoreError::Conflict(_)) => {
                    return Err(EngineError::Conflict {
                        entity: format!("product {}", request.product_id),
                        attempts: attempt,
                    });
                }
                Err(StoreError::Duplicate(_)) => {
                    // A concurrent retry of the same operation won the race.
                    return self.find_existing(request)?.ok_or_else(|| {
                        EngineError::Store(StoreError::Duplicate(format!(
                            "movement for reference {} product {} cause {} exists but is not resolvable",
                            request.reference,
                            request.product_id,
                            request.cause.as_str()
                        )))
                    });
                }
                Err(e) => return Err(EngineError::Store(e)),
            }
        }
    }

    /// Create the compensating entry for `original` and mark it reversed.
    ///
    /// Reversals restore ledger truth, so they skip the negative-stock check
    /// and the hold/retired gates. Reversing an already-reversed movement
    /// returns the existing reversal idempotently.
    #[instrument(
        skip(self, original, reason),
        fields(original_id = %original.id, product_id = %original.product_id),
        err
    )]
    pub fn reverse_movement(
        &self,
        original: &Movement,
        recorded_by: PrincipalId,
        reason: impl Into<String>,
    ) -> Result<Movement, EngineError> {
        if original.reversed {
            if let Some(existing) = self.find_reversal(original)? {
                return Ok(existing);
            }
        }

        let reason = reason.into();
        let mut attempt = 1;
        loop {
            let product = self
                .store
                .get_product(original.product_id)?
                .ok_or_else(|| {
                    EngineError::NotFound(format!("product {}", original.product_id))
                })?;

            let reversal = original.reversal_of(
                MovementId::new(),
                product.on_hand,
                recorded_by,
                reason.clone(),
                self.clock.now(),
            );

            let mut updated = product.clone();
            updated.on_hand = reversal.stock_after;

            match self
                .store
                .record_reversal(&reversal, &updated, product.version)
            {
                Ok(()) => {
                    self.audit.movement_recorded(&reversal);
                    return Ok(reversal);
                }
                Err(StoreError::Conflict(_)) if attempt < self.retry.max_attempts => {
                    self.retry.pause(attempt);
                    attempt += 1;
                }
                Err(StoreError::Conflict(_)) => {
                    return Err(EngineError::Conflict {
                        entity: format!("product {}", original.product_id),
                        attempts: attempt,
                    });
                }
                Err(e) => return Err(EngineError::Store(e)),
            }
        }
    }

    fn find_existing(&self, request: &MovementRequest) -> Result<Option<Movement>, EngineError> {
        let existing =
            self.store
                .find_movement(request.reference, request.product_id, request.cause)?;
        Ok(existing.filter(|m| !m.reversed))
    }

    fn find_reversal(&self, original: &Movement) -> Result<Option<Movement>, EngineError> {
        let movements = self.store.movements_for_reference(original.reference)?;
        Ok(movements
            .into_iter()
            .find(|m| m.reversal && m.reverses == Some(original.id)))
    }

    fn load_active_product(&self, product_id: ProductId) -> Result<Product, EngineError> {
        let product = self
            .store
            .get_product(product_id)?
            .ok_or_else(|| EngineError::NotFound(format!("product {product_id}")))?;
        if let Some(reason) = &product.on_hold {
            return Err(EngineError::ProductOnHold {
                product: product_id,
                reason: reason.clone(),
            });
        }
        if product.retired {
            return Err(EngineError::ProductRetired {
                product: product_id,
            });
        }
        Ok(product)
    }
}
