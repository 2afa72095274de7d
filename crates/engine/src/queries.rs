//! Read-side operations and manual reconciliation.

use tracing::instrument;

use stockledger_auth::{Principal, authorize, perms};
use stockledger_core::ProductId;
use stockledger_movements::Movement;
use stockledger_products::Product;
use stockledger_store::{InventoryStore, Page, StoreError, TimeRange};

use crate::error::EngineError;
use crate::retry::RetryPolicy;

/// Movement ledger for one product, reverse-chronological, paginated.
pub fn movement_history<S: InventoryStore>(
    store: &S,
    product_id: ProductId,
    range: TimeRange,
    page: Page,
) -> Result<Vec<Movement>, EngineError> {
    if store.get_product(product_id)?.is_none() {
        return Err(EngineError::NotFound(format!("product {product_id}")));
    }
    Ok(store.movement_history(product_id, range, page)?)
}

/// Clear a critical-integrity hold after manual reconciliation.
///
/// Requires the reconciliation permission; ordinary movement rights are not
/// enough to unfreeze a product whose ledger needed manual repair.
#[instrument(skip(store, principal, reason, retry), fields(product_id = %product_id), err)]
pub fn release_hold<S: InventoryStore>(
    store: &S,
    product_id: ProductId,
    principal: &Principal,
    reason: &str,
    retry: RetryPolicy,
) -> Result<Product, EngineError> {
    authorize(principal, &perms::RECONCILE).map_err(|_| EngineError::Unauthorized {
        required: perms::RECONCILE.as_str().to_string(),
    })?;

    let mut attempt = 1;
    loop {
        let mut product = store
            .get_product(product_id)?
            .ok_or_else(|| EngineError::NotFound(format!("product {product_id}")))?;
        if product.on_hold.is_none() {
            return Err(EngineError::Domain(
                stockledger_core::DomainError::invariant(format!(
                    "product {product_id} is not on hold"
                )),
            ));
        }

        tracing::info!(
            product_id = %product_id,
            released_by = %principal.principal_id,
            reason,
            "releasing integrity hold"
        );
        product.on_hold = None;
        let expected_version = product.version;

        match store.update_product(&product, expected_version) {
            Ok(()) => {
                product.version = expected_version + 1;
                return Ok(product);
            }
            Err(StoreError::Conflict(_)) if attempt < retry.max_attempts => {
                retry.pause(attempt);
                attempt += 1;
            }
            Err(StoreError::Conflict(_)) => {
                return Err(EngineError::Conflict {
                    entity: format!("product {product_id}"),
                    attempts: attempt,
                });
            }
            Err(e) => return Err(EngineError::Store(e)),
        }
    }
}
