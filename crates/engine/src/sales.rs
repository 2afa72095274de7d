//! Point-of-sale stock deduction and voiding.

use tracing::instrument;

use stockledger_auth::{Principal, authorize, perms};
use stockledger_core::{MovementId, SaleId};
use stockledger_movements::MovementCause;
use stockledger_store::InventoryStore;

use crate::engine::{InventoryUpdateEngine, MovementLine};
use crate::error::EngineError;
use crate::validation::{self, SaleLine, StockValidationService};

/// Outcome of a committed sale.
#[derive(Debug)]
pub struct SaleResult {
    pub sale_id: SaleId,
    pub movement_ids: Vec<MovementId>,
}

/// Sale entry point: permission gate, availability pre-check, then the
/// all-or-nothing engine apply.
pub struct SaleProcessor<S> {
    validation: StockValidationService<S>,
    engine: InventoryUpdateEngine<S>,
}

impl<S: InventoryStore> SaleProcessor<S> {
    pub fn new(
        validation: StockValidationService<S>,
        engine: InventoryUpdateEngine<S>,
    ) -> Self {
        Self { validation, engine }
    }

    /// Deduct stock for every line of a sale.
    ///
    /// The sale id doubles as the movement reference, so retrying a sale
    /// whose first attempt partially succeeded is safe: committed lines are
    /// returned idempotently rather than re-applied.
    #[instrument(skip(self, lines, principal), fields(sale_id = %sale_id, line_count = lines.len()), err)]
    pub fn process_sale(
        &self,
        sale_id: SaleId,
        lines: &[SaleLine],
        principal: &Principal,
    ) -> Result<SaleResult, EngineError> {
        authorize(principal, &perms::PROCESS_SALE).map_err(|_| EngineError::Unauthorized {
            required: perms::PROCESS_SALE.as_str().to_string(),
        })?;

        let validation = self.validation.validate_sale(lines)?;
        if !validation.is_ok() {
            return Err(EngineError::InsufficientStock(validation.failures));
        }

        // One movement per product: duplicate cart lines were summed, so the
        // dedup key (reference, product, cause) stays unique within the sale.
        let movement_lines: Vec<MovementLine> = validation::aggregate_sale_lines(lines)?
            .into_iter()
            .map(|(product_id, quantity)| MovementLine::new(product_id, quantity))
            .collect();

        let result = self.engine.apply(
            sale_id.into(),
            &movement_lines,
            MovementCause::Sale,
            principal.principal_id,
            &format!("sale {sale_id}"),
        )?;

        Ok(SaleResult {
            sale_id,
            movement_ids: result.into_movement_ids()?,
        })
    }

    /// Void a committed sale: every non-reversed movement of the sale gains
    /// a linked reversal and stock returns to where it was. The original
    /// entries are never edited.
    #[instrument(skip(self, principal, reason), fields(sale_id = %sale_id), err)]
    pub fn void_sale(
        &self,
        sale_id: SaleId,
        principal: &Principal,
        reason: &str,
    ) -> Result<Vec<MovementId>, EngineError> {
        authorize(principal, &perms::VOID_SALE).map_err(|_| EngineError::Unauthorized {
            required: perms::VOID_SALE.as_str().to_string(),
        })?;

        let reversals = self
            .engine
            .rollback(sale_id.into(), principal.principal_id, reason)?;
        Ok(reversals.into_iter().map(|m| m.id).collect())
    }
}
