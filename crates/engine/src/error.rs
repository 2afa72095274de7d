use thiserror::Error;

use stockledger_core::{DomainError, ProductId};
use stockledger_purchasing::TransitionError;
use stockledger_store::StoreError;

use crate::validation::{LineFailure, OverReceiptWarning};

/// Operation-level error taxonomy.
///
/// Every rejection carries the specific product/line and concrete reason.
/// Pure domain components raise [`DomainError`] and are never caught below
/// this layer; the update engine is the only place that
/// catches-and-compensates.
#[derive(Debug, Error)]
pub enum EngineError {
    /// One or more sale lines cannot be covered by current stock. Rejected
    /// before any mutation; the caller may retry with corrected input.
    #[error("insufficient stock: {}", format_failures(.0))]
    InsufficientStock(Vec<LineFailure>),

    /// Over-receipt requested without the explicit confirmation flag.
    /// Rejected before any mutation.
    #[error("over-receipt requires confirmation: {}", format_warnings(.0))]
    UnconfirmedOverReceipt(Vec<OverReceiptWarning>),

    /// The movement would drive stock negative and its cause does not permit
    /// that (or no override was supplied).
    #[error("movement would drive product {product} to {stock_after}")]
    NegativeStock { product: ProductId, stock_after: i64 },

    /// The product is frozen pending manual reconciliation.
    #[error("product {product} is on hold: {reason}")]
    ProductOnHold { product: ProductId, reason: String },

    /// New movements are rejected on retired products.
    #[error("product {product} is retired")]
    ProductRetired { product: ProductId },

    /// Concurrent writers exhausted the retry budget. Retryable by the
    /// caller.
    #[error("write conflict on {entity} after {attempts} attempts")]
    Conflict { entity: String, attempts: u32 },

    /// Illegal or unauthorized state-machine move. Raised before mutation.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Deterministic domain failure (validation, invariant).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Infrastructure failure. When raised from the update engine it means
    /// failed-with-rollback-complete; timeouts are treated identically to
    /// write failures.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A compensating rollback itself failed. The affected product has been
    /// placed on hold and requires manual reconciliation.
    #[error("integrity failure on product {product}, placed on hold: {reason}")]
    CriticalIntegrity { product: ProductId, reason: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("missing permission '{required}'")]
    Unauthorized { required: String },
}

impl EngineError {
    /// Whether the caller may usefully retry the same operation as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Conflict { .. } | EngineError::Store(StoreError::Timeout(_))
        )
    }
}

fn format_failures(failures: &[LineFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_warnings(warnings: &[OverReceiptWarning]) -> String {
    warnings
        .iter()
        .map(|w| w.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
