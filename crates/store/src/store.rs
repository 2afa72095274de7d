use chrono::{DateTime, Utc};

use stockledger_core::{MovementId, ProductId, PurchaseOrderId, ReferenceId};
use stockledger_movements::{Movement, MovementCause};
use stockledger_products::Product;
use stockledger_purchasing::{PurchaseOrder, ReceivingRecord};

use crate::error::StoreError;

/// Inclusive time window for history queries. Open ends mean unbounded.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|f| at >= f) && self.to.is_none_or(|t| at <= t)
    }
}

/// Offset pagination for history queries.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

/// Transactional row store for products, movements, orders and receipts.
///
/// ## Design
///
/// - **Conditional writes**: every `update_*` and `record_*` method takes the
///   version the caller read; the store rejects the write with
///   [`StoreError::Conflict`] if the row has moved. This gives per-product
///   linearizability of the stock counter without any in-process lock.
/// - **Append-only ledger**: movements are inserted, never updated or
///   deleted. The single sanctioned mutation is the `reversed` mark set by
///   [`InventoryStore::record_reversal`].
/// - **Dedup key**: a non-reversal movement is unique per
///   `(reference, product, cause)`. [`InventoryStore::record_movement`]
///   reports a second insert as [`StoreError::Duplicate`] so retried
///   operations stay idempotent.
/// - **Per-line transactions**: `record_movement` / `record_reversal`
///   persist the ledger row and the product row as one atomic unit. Lines of
///   a multi-line operation do **not** share a transaction; the update
///   engine compensates across lines instead.
pub trait InventoryStore: Send + Sync {
    // ── products ────────────────────────────────────────────────────────

    fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Conditional write: succeeds only if the stored version equals
    /// `expected_version`, and bumps the stored version to
    /// `expected_version + 1`.
    fn update_product(&self, product: &Product, expected_version: u64) -> Result<(), StoreError>;

    // ── movements ───────────────────────────────────────────────────────

    /// Atomically insert a movement and conditionally write its product row.
    fn record_movement(
        &self,
        movement: &Movement,
        product: &Product,
        expected_version: u64,
    ) -> Result<(), StoreError>;

    /// Atomically insert a reversal movement, conditionally write its
    /// product row, and mark the original movement as reversed.
    fn record_reversal(
        &self,
        reversal: &Movement,
        product: &Product,
        expected_version: u64,
    ) -> Result<(), StoreError>;

    fn get_movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError>;

    /// Look up the non-reversal movement for a dedup key, if any.
    fn find_movement(
        &self,
        reference: ReferenceId,
        product_id: ProductId,
        cause: MovementCause,
    ) -> Result<Option<Movement>, StoreError>;

    /// All movements of one business transaction, in creation order.
    fn movements_for_reference(
        &self,
        reference: ReferenceId,
    ) -> Result<Vec<Movement>, StoreError>;

    /// Movement ledger for one product, reverse-chronological, paginated.
    fn movement_history(
        &self,
        product_id: ProductId,
        range: TimeRange,
        page: Page,
    ) -> Result<Vec<Movement>, StoreError>;

    // ── purchase orders ─────────────────────────────────────────────────

    fn insert_purchase_order(&self, order: &PurchaseOrder) -> Result<(), StoreError>;

    fn get_purchase_order(
        &self,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, StoreError>;

    /// Conditional write with the same version semantics as
    /// [`InventoryStore::update_product`].
    fn update_purchase_order(
        &self,
        order: &PurchaseOrder,
        expected_version: u64,
    ) -> Result<(), StoreError>;

    // ── receiving records ───────────────────────────────────────────────

    fn insert_receiving_record(&self, record: &ReceivingRecord) -> Result<(), StoreError>;

    /// All receipt events booked against one order, in occurrence order.
    fn receiving_records_for_order(
        &self,
        order_id: PurchaseOrderId,
    ) -> Result<Vec<ReceivingRecord>, StoreError>;
}

impl<S> InventoryStore for std::sync::Arc<S>
where
    S: InventoryStore + ?Sized,
{
    fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        (**self).insert_product(product)
    }

    fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).get_product(id)
    }

    fn update_product(&self, product: &Product, expected_version: u64) -> Result<(), StoreError> {
        (**self).update_product(product, expected_version)
    }

    fn record_movement(
        &self,
        movement: &Movement,
        product: &Product,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        (**self).record_movement(movement, product, expected_version)
    }

    fn record_reversal(
        &self,
        reversal: &Movement,
        product: &Product,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        (**self).record_reversal(reversal, product, expected_version)
    }

    fn get_movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        (**self).get_movement(id)
    }

    fn find_movement(
        &self,
        reference: ReferenceId,
        product_id: ProductId,
        cause: MovementCause,
    ) -> Result<Option<Movement>, StoreError> {
        (**self).find_movement(reference, product_id, cause)
    }

    fn movements_for_reference(
        &self,
        reference: ReferenceId,
    ) -> Result<Vec<Movement>, StoreError> {
        (**self).movements_for_reference(reference)
    }

    fn movement_history(
        &self,
        product_id: ProductId,
        range: TimeRange,
        page: Page,
    ) -> Result<Vec<Movement>, StoreError> {
        (**self).movement_history(product_id, range, page)
    }

    fn insert_purchase_order(&self, order: &PurchaseOrder) -> Result<(), StoreError> {
        (**self).insert_purchase_order(order)
    }

    fn get_purchase_order(
        &self,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, StoreError> {
        (**self).get_purchase_order(id)
    }

    fn update_purchase_order(
        &self,
        order: &PurchaseOrder,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        (**self).update_purchase_order(order, expected_version)
    }

    fn insert_receiving_record(&self, record: &ReceivingRecord) -> Result<(), StoreError> {
        (**self).insert_receiving_record(record)
    }

    fn receiving_records_for_order(
        &self,
        order_id: PurchaseOrderId,
    ) -> Result<Vec<ReceivingRecord>, StoreError> {
        (**self).receiving_records_for_order(order_id)
    }
}
