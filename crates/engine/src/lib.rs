//! `stockledger-engine`: the inventory movement and reconciliation engine.
//!
//! Orchestration layer over the domain crates and the store: availability
//! validation, idempotent movement recording, all-or-nothing multi-line
//! operations with compensating rollback, purchase order lifecycle driving,
//! and the receiving workflow.
//!
//! Layering rule: pure components (direction resolution, cost blending, the
//! transition table) raise immediately and never catch. Only
//! [`InventoryUpdateEngine`] catches-and-compensates, and only
//! [`EngineError::CriticalIntegrity`] can leave a product frozen for manual
//! reconciliation.

pub mod engine;
pub mod error;
pub mod manager;
pub mod orders;
pub mod queries;
pub mod receiving;
pub mod retry;
pub mod sales;
pub mod validation;

pub use engine::{InventoryUpdateEngine, LineOutcome, MovementLine, UpdateResult};
pub use error::EngineError;
pub use manager::{MovementRecordManager, MovementRequest};
pub use orders::OrderStatusService;
pub use queries::{movement_history, release_hold};
pub use receiving::{ReceiveResult, ReceivingService};
pub use retry::RetryPolicy;
pub use sales::{SaleProcessor, SaleResult};
pub use validation::{
    LineFailure, OverReceiptWarning, SaleLine, StockValidationService, ValidationResult,
};
