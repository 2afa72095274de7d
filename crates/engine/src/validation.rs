//! Pre-flight stock validation.
//!
//! Reads are snapshot reads; they exist to reject obviously-bad requests
//! cheaply and to give callers actionable detail (shortfall, last-known
//! availability). The record manager re-validates under the conditional
//! write, which is what actually closes the race window.

use stockledger_core::ProductId;
use stockledger_purchasing::{PurchaseOrder, ReceivingLine};
use stockledger_store::InventoryStore;

use crate::error::EngineError;

/// One requested sale line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// A line that cannot be covered by current stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineFailure {
    pub product_id: ProductId,
    /// Total requested across duplicate cart lines for this product.
    pub requested: i64,
    /// Last-known available quantity at validation time.
    pub available: i64,
    pub shortfall: i64,
}

impl core::fmt::Display for LineFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "product {} requested {} but only {} available (short {})",
            self.product_id, self.requested, self.available, self.shortfall
        )
    }
}

/// Non-blocking over-receipt notice; the caller decides via its
/// confirmation flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverReceiptWarning {
    pub product_id: ProductId,
    pub receiving: i64,
    pub pending: i64,
}

impl core::fmt::Display for OverReceiptWarning {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "product {} receiving {} against pending {}",
            self.product_id, self.receiving, self.pending
        )
    }
}

/// Outcome of a validation pass. Failures block; warnings defer to the
/// caller's confirmation.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub failures: Vec<LineFailure>,
    pub warnings: Vec<OverReceiptWarning>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Read-only availability and receipt checks.
pub struct StockValidationService<S> {
    store: S,
}

impl<S: InventoryStore> StockValidationService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Check each sale line against current stock.
    ///
    /// Duplicate product lines are summed before comparison: a cart holding
    /// the same product twice must be checked as one total, not twice
    /// against the same snapshot.
    pub fn validate_sale(&self, lines: &[SaleLine]) -> Result<ValidationResult, EngineError> {
        let mut result = ValidationResult::default();
        for (product_id, requested) in aggregate_sale_lines(lines)? {
            let product = self
                .store
                .get_product(product_id)?
                .ok_or_else(|| EngineError::NotFound(format!("product {product_id}")))?;
            if requested > product.on_hand {
                result.failures.push(LineFailure {
                    product_id,
                    requested,
                    available: product.on_hand,
                    shortfall: requested - product.on_hand,
                });
            }
        }
        Ok(result)
    }

    /// Check receipt lines against the order's pending quantities.
    ///
    /// Split-batch lines for the same product are summed and compared as one
    /// total, the same way sale lines are. A total exceeding its pending
    /// quantity yields a warning, not a failure; over-receipt is legal once
    /// explicitly confirmed. A line for a product not on the order is a hard
    /// error.
    pub fn validate_receipt(
        &self,
        order: &PurchaseOrder,
        lines: &[ReceivingLine],
    ) -> Result<ValidationResult, EngineError> {
        let mut totals: Vec<(ProductId, i64)> = Vec::new();
        for line in lines {
            match totals.iter_mut().find(|(id, _)| *id == line.product_id) {
                Some((_, total)) => *total += line.quantity,
                None => totals.push((line.product_id, line.quantity)),
            }
        }

        let mut result = ValidationResult::default();
        for (product_id, receiving) in totals {
            let order_line = order.line(product_id).ok_or_else(|| {
                EngineError::Domain(stockledger_core::DomainError::validation(format!(
                    "product {product_id} is not on purchase order {}",
                    order.id
                )))
            })?;

            // Products must still resolve; retirement mid-order is caught
            // here instead of at apply time.
            self.store
                .get_product(product_id)?
                .ok_or_else(|| EngineError::NotFound(format!("product {product_id}")))?;

            let pending = order_line.pending();
            if receiving > pending {
                result.warnings.push(OverReceiptWarning {
                    product_id,
                    receiving,
                    pending,
                });
            }
        }
        Ok(result)
    }
}

/// Sum sale quantities per product, preserving first-seen order.
///
/// Both validation and movement construction consume this, so a cart holding
/// the same product on several lines yields exactly one total and, later,
/// exactly one movement per product.
pub(crate) fn aggregate_sale_lines(
    lines: &[SaleLine],
) -> Result<Vec<(ProductId, i64)>, EngineError> {
    if lines.is_empty() {
        return Err(EngineError::Domain(
            stockledger_core::DomainError::validation("sale must have at least one line"),
        ));
    }

    let mut totals: Vec<(ProductId, i64)> = Vec::new();
    for line in lines {
        if line.quantity <= 0 {
            return Err(EngineError::Domain(
                stockledger_core::DomainError::validation(format!(
                    "sale quantity must be positive for product {}",
                    line.product_id
                )),
            ));
        }
        match totals.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, total)) => *total += line.quantity,
            None => totals.push((line.product_id, line.quantity)),
        }
    }
    Ok(totals)
}
