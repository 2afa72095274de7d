//! Postgres-backed inventory store.
//!
//! ## Error mapping
//!
//! | SQLx error | Postgres code | StoreError | Scenario |
//! |------------|---------------|------------|----------|
//! | Database (unique violation) | `23505` | `Duplicate` | Dedup key or primary key already present |
//! | Database (other) | any other | `Backend` | Constraint or engine failure |
//! | PoolTimedOut | n/a | `Timeout` | No connection available in time |
//! | RowNotFound | n/a | `NotFound` | Referenced row missing |
//! | Other | n/a | `Backend` | Network errors, pool closed, etc. |
//!
//! Conditional updates (`... WHERE id = $n AND version = $m`) that match zero
//! rows are reported as `Conflict` when the row exists and `NotFound` when it
//! does not.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use tracing::instrument;
use uuid::Uuid;

use stockledger_auth::PrincipalId;
use stockledger_core::{
    MovementId, ProductId, PurchaseOrderId, ReceivingRecordId, ReferenceId, SupplierId,
};
use stockledger_movements::{Movement, MovementCause};
use stockledger_products::Product;
use stockledger_purchasing::{
    OrderLine, PurchaseOrder, PurchaseOrderStatus, ReceivingLine, ReceivingRecord,
    StatusTransition,
};

use crate::error::StoreError;
use crate::store::{InventoryStore, Page, TimeRange};

/// Postgres implementation of [`InventoryStore`].
///
/// The trait is synchronous; each trait method drives the matching async
/// inherent method to completion via [`block_on`], which moves the current
/// worker into blocking mode first so calls from async request handlers do
/// not panic. Requires the multi-thread runtime flavor.
///
/// Line-level atomicity comes from a transaction around the movement insert
/// and the conditional product update. Per-product serialization comes from
/// the version predicate, not from row locks, so writers never block each
/// other across products.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the schema if it does not exist. Intended for bootstrap and
    /// integration tests; production deployments run migrations out of band.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        // raw_sql: the DDL is several statements, which prepared queries
        // cannot carry.
        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id         UUID PRIMARY KEY,
                sku        TEXT NOT NULL,
                name       TEXT NOT NULL,
                on_hand    BIGINT NOT NULL,
                unit_cost  NUMERIC NOT NULL,
                min_stock  BIGINT NOT NULL,
                retired    BOOLEAN NOT NULL,
                on_hold    TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                version    BIGINT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS movements (
                id           UUID PRIMARY KEY,
                product_id   UUID NOT NULL REFERENCES products (id),
                cause        TEXT NOT NULL,
                direction    TEXT NOT NULL,
                quantity     BIGINT NOT NULL CHECK (quantity > 0),
                stock_before BIGINT NOT NULL,
                stock_after  BIGINT NOT NULL,
                reference    UUID NOT NULL,
                recorded_by  UUID NOT NULL,
                reason       TEXT NOT NULL,
                occurred_at  TIMESTAMPTZ NOT NULL,
                reversal     BOOLEAN NOT NULL,
                reverses     UUID REFERENCES movements (id),
                reversed     BOOLEAN NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS uq_movements_dedup
                ON movements (reference, product_id, cause)
                WHERE NOT reversal;

            CREATE INDEX IF NOT EXISTS ix_movements_product_time
                ON movements (product_id, occurred_at DESC);

            CREATE TABLE IF NOT EXISTS purchase_orders (
                id          UUID PRIMARY KEY,
                supplier_id UUID NOT NULL,
                status      TEXT NOT NULL,
                lines       JSONB NOT NULL,
                history     JSONB NOT NULL,
                created_at  TIMESTAMPTZ NOT NULL,
                version     BIGINT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS receiving_records (
                id                UUID PRIMARY KEY,
                purchase_order_id UUID NOT NULL REFERENCES purchase_orders (id),
                received_by       UUID NOT NULL,
                lines             JSONB NOT NULL,
                notes             TEXT,
                occurred_at       TIMESTAMPTZ NOT NULL,
                movement_ids      JSONB NOT NULL
            );
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    pub async fn insert_product_async(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products
                (id, sku, name, on_hand, unit_cost, min_stock, retired, on_hold, created_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.on_hand)
        .bind(product.unit_cost)
        .bind(product.min_stock)
        .bind(product.retired)
        .bind(&product.on_hold)
        .bind(product.created_at)
        .bind(product.version as i64)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    pub async fn get_product_async(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, sku, name, on_hand, unit_cost, min_stock, retired, on_hold, created_at, version
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_product", e))?;

        row.map(|r| product_from_row(&r)).transpose()
    }

    #[instrument(skip(self, product), fields(product_id = %product.id, expected_version), err)]
    pub async fn update_product_async(
        &self,
        product: &Product,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        update_product_tx(&mut tx, product, expected_version).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(
        skip(self, movement, product),
        fields(
            movement_id = %movement.id,
            product_id = %product.id,
            cause = movement.cause.as_str(),
            expected_version
        ),
        err
    )]
    pub async fn record_movement_async(
        &self,
        movement: &Movement,
        product: &Product,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        insert_movement_tx(&mut tx, movement).await?;
        update_product_tx(&mut tx, product, expected_version).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(
        skip(self, reversal, product),
        fields(
            movement_id = %reversal.id,
            reverses = ?reversal.reverses,
            product_id = %product.id,
            expected_version
        ),
        err
    )]
    pub async fn record_reversal_async(
        &self,
        reversal: &Movement,
        product: &Product,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let original_id = reversal.reverses.ok_or_else(|| {
            StoreError::Backend("reversal movement is missing its original link".to_string())
        })?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        insert_movement_tx(&mut tx, reversal).await?;
        update_product_tx(&mut tx, product, expected_version).await?;

        let marked = sqlx::query("UPDATE movements SET reversed = TRUE WHERE id = $1")
            .bind(original_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("mark_reversed", e))?;
        if marked.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("movement {original_id}")));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    pub async fn get_movement_async(
        &self,
        id: MovementId,
    ) -> Result<Option<Movement>, StoreError> {
        let row = sqlx::query(&format!(
            "{MOVEMENT_SELECT} WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_movement", e))?;

        row.map(|r| movement_from_row(&r)).transpose()
    }

    pub async fn find_movement_async(
        &self,
        reference: ReferenceId,
        product_id: ProductId,
        cause: MovementCause,
    ) -> Result<Option<Movement>, StoreError> {
        let row = sqlx::query(&format!(
            "{MOVEMENT_SELECT} WHERE reference = $1 AND product_id = $2 AND cause = $3 AND NOT reversal"
        ))
        .bind(reference.as_uuid())
        .bind(product_id.as_uuid())
        .bind(cause.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_movement", e))?;

        row.map(|r| movement_from_row(&r)).transpose()
    }

    pub async fn movements_for_reference_async(
        &self,
        reference: ReferenceId,
    ) -> Result<Vec<Movement>, StoreError> {
        let rows = sqlx::query(&format!(
            "{MOVEMENT_SELECT} WHERE reference = $1 ORDER BY id ASC"
        ))
        .bind(reference.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movements_for_reference", e))?;

        rows.iter().map(movement_from_row).collect()
    }

    pub async fn movement_history_async(
        &self,
        product_id: ProductId,
        range: TimeRange,
        page: Page,
    ) -> Result<Vec<Movement>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            {MOVEMENT_SELECT}
            WHERE product_id = $1
              AND occurred_at >= COALESCE($2, '-infinity'::timestamptz)
              AND occurred_at <= COALESCE($3, 'infinity'::timestamptz)
            ORDER BY occurred_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(product_id.as_uuid())
        .bind(range.from)
        .bind(range.to)
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movement_history", e))?;

        rows.iter().map(movement_from_row).collect()
    }

    #[instrument(skip(self, order), fields(order_id = %order.id), err)]
    pub async fn insert_purchase_order_async(
        &self,
        order: &PurchaseOrder,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO purchase_orders (id, supplier_id, status, lines, history, created_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.supplier_id.as_uuid())
        .bind(order.status.as_str())
        .bind(to_json("order lines", &order.lines)?)
        .bind(to_json("order history", &order.history)?)
        .bind(order.created_at)
        .bind(order.version as i64)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_purchase_order", e))?;
        Ok(())
    }

    pub async fn get_purchase_order_async(
        &self,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, supplier_id, status, lines, history, created_at, version
            FROM purchase_orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_purchase_order", e))?;

        row.map(|r| order_from_row(&r)).transpose()
    }

    #[instrument(skip(self, order), fields(order_id = %order.id, expected_version), err)]
    pub async fn update_purchase_order_async(
        &self,
        order: &PurchaseOrder,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE purchase_orders
            SET status = $2, lines = $3, history = $4, version = version + 1
            WHERE id = $1 AND version = $5
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(to_json("order lines", &order.lines)?)
        .bind(to_json("order history", &order.history)?)
        .bind(expected_version as i64)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_purchase_order", e))?;

        if result.rows_affected() == 0 {
            return Err(stale_write_error(
                &*self.pool,
                "purchase_orders",
                *order.id.as_uuid(),
                format!("purchase order {}", order.id),
            )
            .await?);
        }
        Ok(())
    }

    #[instrument(skip(self, record), fields(record_id = %record.id, order_id = %record.purchase_order_id), err)]
    pub async fn insert_receiving_record_async(
        &self,
        record: &ReceivingRecord,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO receiving_records
                (id, purchase_order_id, received_by, lines, notes, occurred_at, movement_ids)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.purchase_order_id.as_uuid())
        .bind(record.received_by.as_uuid())
        .bind(to_json("receiving lines", &record.lines)?)
        .bind(&record.notes)
        .bind(record.occurred_at)
        .bind(to_json("movement ids", &record.movement_ids)?)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_receiving_record", e))?;
        Ok(())
    }

    pub async fn receiving_records_for_order_async(
        &self,
        order_id: PurchaseOrderId,
    ) -> Result<Vec<ReceivingRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, purchase_order_id, received_by, lines, notes, occurred_at, movement_ids
            FROM receiving_records
            WHERE purchase_order_id = $1
            ORDER BY occurred_at ASC, id ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("receiving_records_for_order", e))?;

        rows.iter().map(receiving_record_from_row).collect()
    }

}

/// Drive a store future to completion from a synchronous caller.
///
/// `Handle::block_on` panics when invoked on a runtime worker thread, so the
/// worker is moved into blocking mode with `block_in_place` first. This
/// requires the multi-thread runtime flavor; there is no fallback runtime,
/// callers outside any tokio context get an error.
fn block_on<F, T>(fut: F) -> Result<T, StoreError>
where
    F: std::future::Future<Output = Result<T, StoreError>>,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => tokio::task::block_in_place(|| handle.block_on(fut)),
        Err(_) => Err(StoreError::Backend(
            "PostgresStore requires a tokio runtime context".to_string(),
        )),
    }
}

const MOVEMENT_SELECT: &str = r#"
    SELECT id, product_id, cause, quantity, stock_before, stock_after,
           reference, recorded_by, reason, occurred_at, reversal, reverses, reversed
    FROM movements
"#;

async fn insert_movement_tx(
    tx: &mut Transaction<'_, Postgres>,
    movement: &Movement,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO movements
            (id, product_id, cause, direction, quantity, stock_before, stock_after,
             reference, recorded_by, reason, occurred_at, reversal, reverses, reversed)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(movement.id.as_uuid())
    .bind(movement.product_id.as_uuid())
    .bind(movement.cause.as_str())
    .bind(if movement.direction == stockledger_movements::Direction::In { "IN" } else { "OUT" })
    .bind(movement.quantity)
    .bind(movement.stock_before)
    .bind(movement.stock_after)
    .bind(movement.reference.as_uuid())
    .bind(movement.recorded_by.as_uuid())
    .bind(&movement.reason)
    .bind(movement.occurred_at)
    .bind(movement.reversal)
    .bind(movement.reverses.map(|id| *id.as_uuid()))
    .bind(movement.reversed)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_movement", e))?;
    Ok(())
}

async fn update_product_tx(
    tx: &mut Transaction<'_, Postgres>,
    product: &Product,
    expected_version: u64,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET sku = $2, name = $3, on_hand = $4, unit_cost = $5, min_stock = $6,
            retired = $7, on_hold = $8, version = version + 1
        WHERE id = $1 AND version = $9
        "#,
    )
    .bind(product.id.as_uuid())
    .bind(&product.sku)
    .bind(&product.name)
    .bind(product.on_hand)
    .bind(product.unit_cost)
    .bind(product.min_stock)
    .bind(product.retired)
    .bind(&product.on_hold)
    .bind(expected_version as i64)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update_product", e))?;

    if result.rows_affected() == 0 {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
                .bind(product.id.as_uuid())
                .fetch_one(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("update_product", e))?;
        return Err(if exists {
            StoreError::Conflict(format!(
                "product {}: expected version {expected_version}",
                product.id
            ))
        } else {
            StoreError::NotFound(format!("product {}", product.id))
        });
    }
    Ok(())
}

async fn stale_write_error(
    pool: &PgPool,
    table: &str,
    id: Uuid,
    what: String,
) -> Result<StoreError, StoreError> {
    let exists: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS (SELECT 1 FROM {table} WHERE id = $1)"
    ))
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(|e| map_sqlx_error("stale_write_check", e))?;

    Ok(if exists {
        StoreError::Conflict(format!("{what}: stale version"))
    } else {
        StoreError::NotFound(what)
    })
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    Ok(Product {
        id: ProductId::from_uuid(get(row, "id")?),
        sku: get(row, "sku")?,
        name: get(row, "name")?,
        on_hand: get(row, "on_hand")?,
        unit_cost: get::<Decimal>(row, "unit_cost")?,
        min_stock: get(row, "min_stock")?,
        retired: get(row, "retired")?,
        on_hold: get(row, "on_hold")?,
        created_at: get(row, "created_at")?,
        version: get::<i64>(row, "version")? as u64,
    })
}

fn movement_from_row(row: &PgRow) -> Result<Movement, StoreError> {
    let cause = MovementCause::from_str(&get::<String>(row, "cause")?)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    let reversal: bool = get(row, "reversal")?;
    // Direction is derived, never trusted from storage.
    let direction = if reversal {
        cause.direction().opposite()
    } else {
        cause.direction()
    };

    Ok(Movement {
        id: MovementId::from_uuid(get(row, "id")?),
        product_id: ProductId::from_uuid(get(row, "product_id")?),
        cause,
        direction,
        quantity: get(row, "quantity")?,
        stock_before: get(row, "stock_before")?,
        stock_after: get(row, "stock_after")?,
        reference: ReferenceId::from_uuid(get(row, "reference")?),
        recorded_by: PrincipalId::from_uuid(get(row, "recorded_by")?),
        reason: get(row, "reason")?,
        occurred_at: get(row, "occurred_at")?,
        reversal,
        reverses: get::<Option<Uuid>>(row, "reverses")?.map(MovementId::from_uuid),
        reversed: get(row, "reversed")?,
    })
}

fn order_from_row(row: &PgRow) -> Result<PurchaseOrder, StoreError> {
    let status = PurchaseOrderStatus::from_str(&get::<String>(row, "status")?)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    let lines: Vec<OrderLine> = from_json("order lines", get(row, "lines")?)?;
    let history: Vec<StatusTransition> = from_json("order history", get(row, "history")?)?;

    Ok(PurchaseOrder {
        id: PurchaseOrderId::from_uuid(get(row, "id")?),
        supplier_id: SupplierId::from_uuid(get(row, "supplier_id")?),
        status,
        lines,
        history,
        created_at: get(row, "created_at")?,
        version: get::<i64>(row, "version")? as u64,
    })
}

fn receiving_record_from_row(row: &PgRow) -> Result<ReceivingRecord, StoreError> {
    let lines: Vec<ReceivingLine> = from_json("receiving lines", get(row, "lines")?)?;
    let movement_ids: Vec<MovementId> = from_json("movement ids", get(row, "movement_ids")?)?;

    Ok(ReceivingRecord {
        id: ReceivingRecordId::from_uuid(get(row, "id")?),
        purchase_order_id: PurchaseOrderId::from_uuid(get(row, "purchase_order_id")?),
        received_by: PrincipalId::from_uuid(get(row, "received_by")?),
        lines,
        notes: get(row, "notes")?,
        occurred_at: get(row, "occurred_at")?,
        movement_ids,
    })
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Serialization(format!("column {column}: {e}")))
}

fn to_json<T: serde::Serialize>(what: &str, value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value)
        .map_err(|e| StoreError::Serialization(format!("{what}: {e}")))
}

fn from_json<T: serde::de::DeserializeOwned>(
    what: &str,
    value: serde_json::Value,
) -> Result<T, StoreError> {
    serde_json::from_value(value)
        .map_err(|e| StoreError::Serialization(format!("{what}: {e}")))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Unique violation: primary key or the movement dedup index.
                Some("23505") => StoreError::Duplicate(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Timeout(format!("connection pool timed out in {operation}"))
        }
        sqlx::Error::RowNotFound => {
            StoreError::NotFound(format!("row not found in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

impl InventoryStore for PostgresStore {
    fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        block_on(self.insert_product_async(product))
    }

    fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        block_on(self.get_product_async(id))
    }

    fn update_product(&self, product: &Product, expected_version: u64) -> Result<(), StoreError> {
        block_on(self.update_product_async(product, expected_version))
    }

    fn record_movement(
        &self,
        movement: &Movement,
        product: &Product,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        block_on(self.record_movement_async(movement, product, expected_version))
    }

    fn record_reversal(
        &self,
        reversal: &Movement,
        product: &Product,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        block_on(self.record_reversal_async(reversal, product, expected_version))
    }

    fn get_movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        block_on(self.get_movement_async(id))
    }

    fn find_movement(
        &self,
        reference: ReferenceId,
        product_id: ProductId,
        cause: MovementCause,
    ) -> Result<Option<Movement>, StoreError> {
        block_on(self.find_movement_async(reference, product_id, cause))
    }

    fn movements_for_reference(
        &self,
        reference: ReferenceId,
    ) -> Result<Vec<Movement>, StoreError> {
        block_on(self.movements_for_reference_async(reference))
    }

    fn movement_history(
        &self,
        product_id: ProductId,
        range: TimeRange,
        page: Page,
    ) -> Result<Vec<Movement>, StoreError> {
        block_on(self.movement_history_async(product_id, range, page))
    }

    fn insert_purchase_order(&self, order: &PurchaseOrder) -> Result<(), StoreError> {
        block_on(self.insert_purchase_order_async(order))
    }

    fn get_purchase_order(
        &self,
        id: PurchaseOrderId,
    ) -> Result<Option<PurchaseOrder>, StoreError> {
        block_on(self.get_purchase_order_async(id))
    }

    fn update_purchase_order(
        &self,
        order: &PurchaseOrder,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        block_on(self.update_purchase_order_async(order, expected_version))
    }

    fn insert_receiving_record(&self, record: &ReceivingRecord) -> Result<(), StoreError> {
        block_on(self.insert_receiving_record_async(record))
    }

    fn receiving_records_for_order(
        &self,
        order_id: PurchaseOrderId,
    ) -> Result<Vec<ReceivingRecord>, StoreError> {
        block_on(self.receiving_records_for_order_async(order_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_adapter_completes_inside_a_runtime_worker() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .unwrap();
        // From a spawned task, i.e. a runtime worker thread. A plain
        // Handle::block_on here would panic.
        let value = rt.block_on(async {
            tokio::task::spawn(async { block_on(async { Ok::<_, StoreError>(42) }) })
                .await
                .unwrap()
        });
        assert_eq!(value.unwrap(), 42);
    }

    #[test]
    fn sync_adapter_requires_a_runtime_context() {
        let err = block_on(async { Ok::<_, StoreError>(()) }).unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
