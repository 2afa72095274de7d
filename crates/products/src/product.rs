use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, ProductId};

/// Catalog product with its materialized stock position.
///
/// `on_hand` and `unit_cost` are projections of the movement ledger; callers
/// never write them directly. Products are logically retired, not deleted,
/// so ledger references stay resolvable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    /// Current on-hand quantity. Non-negative except after a sanctioned
    /// outbound adjustment with an explicit override.
    pub on_hand: i64,
    /// Current weighted-average unit cost.
    pub unit_cost: Decimal,
    /// Reorder threshold.
    pub min_stock: i64,
    pub retired: bool,
    /// Set when a failed rollback left this product in an unverified state.
    /// All further movements are rejected until manually reconciled.
    pub on_hold: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by the store on every write.
    pub version: u64,
}

impl Product {
    /// Create a product at catalog entry, with zero stock and zero cost.
    pub fn new(
        id: ProductId,
        sku: impl Into<String>,
        name: impl Into<String>,
        min_stock: i64,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let sku = sku.into();
        let name = name.into();

        if sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if min_stock < 0 {
            return Err(DomainError::validation("min_stock cannot be negative"));
        }

        Ok(Self {
            id,
            sku,
            name,
            on_hand: 0,
            unit_cost: Decimal::ZERO,
            min_stock,
            retired: false,
            on_hold: None,
            created_at,
            version: 0,
        })
    }

    pub fn is_below_min_stock(&self) -> bool {
        self.on_hand < self.min_stock
    }

    /// Logical retirement. The row stays so old movements keep resolving.
    pub fn retire(&mut self) {
        self.retired = true;
    }
}
