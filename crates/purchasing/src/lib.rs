//! `stockledger-purchasing`: purchase orders and their lifecycle.
//!
//! The purchase order gates receiving: goods may only be booked against an
//! order whose status allows it, and every status change goes through the
//! state machine in [`state_machine`] regardless of whether a user or the
//! receiving workflow triggered it.

pub mod order;
pub mod receiving;
pub mod state_machine;

pub use order::{OrderLine, PurchaseOrder, PurchaseOrderStatus, StatusTransition};
pub use receiving::{LineCondition, ReceivingLine, ReceivingRecord};
pub use state_machine::{TransitionError, allowed_targets, can_transition, validate};
