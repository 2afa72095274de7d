//! `stockledger-products`: the product catalog record.
//!
//! A [`Product`]'s on-hand quantity and unit cost are **derived state**: the
//! movement ledger is the source of truth and the product row is a
//! materialized projection of it, mutated exclusively through movements.

pub mod product;

pub use product::Product;
