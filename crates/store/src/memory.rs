use std::collections::HashMap;
use std::sync::RwLock;

use stockledger_core::{MovementId, ProductId, PurchaseOrderId, ReceivingRecordId, ReferenceId};
use stockledger_movements::{Movement, MovementCause};
use stockledger_products::Product;
use stockledger_purchasing::{PurchaseOrder, ReceivingRecord};

use crate::error::StoreError;
use crate::store::{InventoryStore, Page, TimeRange};

#[derive(Default)]
struct Inner {
    products: HashMap<ProductId, Product>,
    movements: HashMap<MovementId, Movement>,
    /// Insertion order of the ledger, for stable reference queries.
    movement_order: Vec<MovementId>,
    orders: HashMap<PurchaseOrderId, PurchaseOrder>,
    receipts: HashMap<ReceivingRecordId, ReceivingRecord>,
}

/// In-memory store for tests and examples.
///
/// One lock guards all tables so the composite writes (`record_movement`,
/// `record_reversal`) are atomic the same way a Postgres transaction is.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }
}

fn check_version(actual: u64, expected: u64, what: &str) -> Result<(), StoreError> {
    if actual != expected {
        return Err(StoreError::Conflict(format!(
            "{what}: expected version {expected}, found {actual}"
        )));
    }
    Ok(())
}

fn apply_product(inner: &mut Inner, product: &Product, expected_version: u64) -> Result<(), StoreError> {
    let stored = inner
        .products
        .get_mut(&product.id)
        .ok_or_else(|| StoreError::NotFound(format!("product {}", product.id)))?;
    check_version(stored.version, expected_version, "product")?;

    *stored = product.clone();
    stored.version = expected_version + 1;
    Ok(())
}

fn dedup_hit(inner: &Inner, movement: &Movement) -> bool {
    inner.movements.values().any(|m| {
        !m.reversal
            && m.reference == movement.reference
            && m.product_id == movement.product_id
            && m.cause == movement.cause
    })
}

impl InventoryStore for InMemoryStore {
    fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if inner.products.contains_key(&product.id) {
            return Err(StoreError::Duplicate(format!("product {}", product.id)));
        }
        inner.products.insert(product.id, product.clone());
        Ok(())
    }

    fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    fn update_product(&self, product: &Product, expected_version: u64) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        apply_product(&mut inner, product, expected_version)
    }

    fn record_movement(
        &self,
        movement: &Movement,
        product: &Product,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if !movement.reversal && dedup_hit(&inner, movement) {
            return Err(StoreError::Duplicate(format!(
                "movement for reference {} product {} cause {}",
                movement.reference,
                movement.product_id,
                movement.cause.as_str()
            )));
        }

        apply_product(&mut inner, product, expected_version)?;
        inner.movements.insert(movement.id, movement.clone());
        inner.movement_order.push(movement.id);
        Ok(())
    }

    fn record_reversal(
        &self,
        reversal: &Movement,
        product: &Product,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let original_id = reversal.reverses.ok_or_else(|| {
            StoreError::Backend("reversal movement is missing its original link".to_string())
        })?;

        let mut inner = self.write()?;
        if !inner.movements.contains_key(&original_id) {
            return Err(StoreError::NotFound(format!("movement {original_id}")));
        }

        apply_product(&mut inner, product, expected_version)?;
        inner.movements.insert(reversal.id, reversal.clone());
        inner.movement_order.push(reversal.id);
        if let Some(original) = inner.movements.get_mut(&original_id) {
            original.reversed = true;
        }
        Ok(())
    }

    fn get_movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        Ok(self.read()?.movements.get(&id).cloned())
    }

    fn find_movement(
        &self,
        reference: ReferenceId,
        product_id: ProductId,
        cause: MovementCause,
    ) -> Result<Option<Movement>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .movements
            .values()
            .find(|m| {
                !m.reversal
                    && m.reference == reference
                    && m.product_id == product_id
                    && m.cause == cause
            })
            .cloned())
    }

    fn movements_for_reference(
        &self,
        reference: ReferenceId,
    ) -> Result<Vec<Movement>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .movement_order
            .iter()
            .filter_map(|id| inner.movements.get(id))
            .filter(|m| m.reference == reference)
            .cloned()
            .collect())
    }

    fn movement_history(
        &self,
        product_id: ProductId,
        range: TimeRange,
        page: Page,
    ) -> Result<Vec<Movement>, StoreError> {
        let inner = self.read()?;
        let mut rows: Vec<Movement> = inner
            .movements
            .values()
            .filter(|m| m.product_id == product_id && range.contains(m.occurred_at))
            .cloned()
            .collect();
        // Newest first; ties broken by id so pagination is stable.
        rows.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then(b.id.cmp(&a.id)));
        Ok(rows.into_iter().skip(page.offset).take(page.limit).collect())
    }

    fn insert_purchase_order(&self, order: &PurchaseOrder) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if inner.orders.contains_key(&order.id) {
            return Err(StoreError::Duplicate(format!("purchase order {}", order.id)));
        }
        inner.orders.insert(order.id, order.clone());
        Ok(())
    }

    fn get_purchase_order(
        &self,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, StoreError> {
        Ok(self.read()?.orders.get(&id).cloned())
    }

    fn update_purchase_order(
        &self,
        order: &PurchaseOrder,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let stored = inner
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| StoreError::NotFound(format!("purchase order {}", order.id)))?;
        check_version(stored.version, expected_version, "purchase order")?;

        *stored = order.clone();
        stored.version = expected_version + 1;
        Ok(())
    }

    fn insert_receiving_record(&self, record: &ReceivingRecord) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if inner.receipts.contains_key(&record.id) {
            return Err(StoreError::Duplicate(format!(
                "receiving record {}",
                record.id
            )));
        }
        inner.receipts.insert(record.id, record.clone());
        Ok(())
    }

    fn receiving_records_for_order(
        &self,
        order_id: PurchaseOrderId,
    ) -> Result<Vec<ReceivingRecord>, StoreError> {
        let inner = self.read()?;
        let mut records: Vec<ReceivingRecord> = inner
            .receipts
            .values()
            .filter(|r| r.purchase_order_id == order_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use stockledger_auth::PrincipalId;

    fn seeded_product(store: &InMemoryStore) -> Product {
        let product =
            Product::new(ProductId::new(), "WID-1", "Widget", 0, Utc::now()).unwrap();
        store.insert_product(&product).unwrap();
        product
    }

    fn sale_movement(product: &Product, quantity: i64) -> Movement {
        Movement::record(
            MovementId::new(),
            product.id,
            MovementCause::Sale,
            quantity,
            product.on_hand,
            ReferenceId::new(),
            PrincipalId::new(),
            "test sale",
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn conditional_update_rejects_stale_version() {
        let store = InMemoryStore::new();
        let mut product = seeded_product(&store);

        product.on_hand = 10;
        store.update_product(&product, 0).unwrap();

        // Second writer still holds version 0.
        let err = store.update_product(&product, 0).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let stored = store.get_product(product.id).unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.on_hand, 10);
    }

    #[test]
    fn record_movement_commits_ledger_and_product_together() {
        let store = InMemoryStore::new();
        let mut product = seeded_product(&store);
        product.on_hand = 10;
        store.update_product(&product, 0).unwrap();
        product.version = 1;

        let movement = sale_movement(&product, 3);
        product.on_hand = movement.stock_after;
        store.record_movement(&movement, &product, 1).unwrap();

        assert!(store.get_movement(movement.id).unwrap().is_some());
        let stored = store.get_product(product.id).unwrap().unwrap();
        assert_eq!(stored.on_hand, 7);
        assert_eq!(stored.version, 2);
    }

    #[test]
    fn record_movement_with_stale_version_writes_nothing() {
        let store = InMemoryStore::new();
        let product = seeded_product(&store);
        let movement = sale_movement(&product, 3);

        let err = store.record_movement(&movement, &product, 99).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(store.get_movement(movement.id).unwrap().is_none());
    }

    #[test]
    fn duplicate_dedup_key_is_rejected() {
        let store = InMemoryStore::new();
        let mut product = seeded_product(&store);
        product.on_hand = 10;
        store.update_product(&product, 0).unwrap();
        product.version = 1;

        let movement = sale_movement(&product, 3);
        product.on_hand = movement.stock_after;
        store.record_movement(&movement, &product, 1).unwrap();

        // Same reference, product and cause but a fresh movement id.
        let mut retry = movement.clone();
        retry.id = MovementId::new();
        let err = store.record_movement(&retry, &product, 2).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[test]
    fn record_reversal_marks_the_original() {
        let store = InMemoryStore::new();
        let mut product = seeded_product(&store);
        product.on_hand = 10;
        store.update_product(&product, 0).unwrap();
        product.version = 1;

        let movement = sale_movement(&product, 3);
        product.on_hand = movement.stock_after;
        store.record_movement(&movement, &product, 1).unwrap();
        product.version = 2;

        let reversal = movement.reversal_of(
            MovementId::new(),
            product.on_hand,
            PrincipalId::new(),
            "void",
            Utc::now(),
        );
        product.on_hand = reversal.stock_after;
        store.record_reversal(&reversal, &product, 2).unwrap();

        let original = store.get_movement(movement.id).unwrap().unwrap();
        assert!(original.reversed);
        let stored = store.get_product(product.id).unwrap().unwrap();
        assert_eq!(stored.on_hand, 10);
    }

    #[test]
    fn history_is_reverse_chronological_and_paginated() {
        let store = InMemoryStore::new();
        let mut product = seeded_product(&store);
        let base = Utc::now();

        for i in 0..5i64 {
            let mut m = sale_movement(&product, 1);
            m.cause = MovementCause::PurchaseReceipt;
            m.direction = m.cause.direction();
            m.stock_before = product.on_hand;
            m.stock_after = product.on_hand + 1;
            m.occurred_at = base + Duration::seconds(i);
            m.reference = ReferenceId::new();
            product.on_hand = m.stock_after;
            store.record_movement(&m, &product, product.version).unwrap();
            product.version += 1;
        }

        let page = store
            .movement_history(
                product.id,
                TimeRange::all(),
                Page {
                    limit: 2,
                    offset: 1,
                },
            )
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].occurred_at, base + Duration::seconds(3));
        assert_eq!(page[1].occurred_at, base + Duration::seconds(2));

        let windowed = store
            .movement_history(
                product.id,
                TimeRange {
                    from: Some(base + Duration::seconds(4)),
                    to: None,
                },
                Page::default(),
            )
            .unwrap();
        assert_eq!(windowed.len(), 1);
    }
}
