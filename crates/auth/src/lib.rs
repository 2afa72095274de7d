//! `stockledger-auth`: acting principal and permission checks.
//!
//! The engine consumes authentication as an opaque, already-resolved
//! [`Principal`] plus a pure [`authorize`] policy check. Token handling and
//! role resolution live outside this workspace.

pub mod authorize;
pub mod permissions;
pub mod principal;

pub use authorize::{AuthzError, authorize};
pub use permissions::{Permission, perms};
pub use principal::{Principal, PrincipalId};
