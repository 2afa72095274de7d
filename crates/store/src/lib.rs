//! `stockledger-store`: the single data-access interface.
//!
//! Exactly one production implementation ([`PostgresStore`]) and one
//! in-memory implementation ([`InMemoryStore`]) used by the test harness.
//! Which one a process uses is a wiring decision at construction time, never
//! a runtime mode flag.

pub mod audit;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use audit::{AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use error::StoreError;
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{InventoryStore, Page, TimeRange};
