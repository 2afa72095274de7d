use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "inventory.sale.process").
/// A special wildcard permission `"*"` can be used by policy layers to indicate
/// "allow all" without hardcoding domain permissions into tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Well-known permissions checked by the engine.
pub mod perms {
    use super::Permission;

    pub static PROCESS_SALE: Permission = Permission::from_static("inventory.sale.process");
    pub static VOID_SALE: Permission = Permission::from_static("inventory.sale.void");
    pub static ADJUST_STOCK: Permission = Permission::from_static("inventory.stock.adjust");
    pub static RECONCILE: Permission = Permission::from_static("inventory.stock.reconcile");

    pub static RECEIVE_GOODS: Permission = Permission::from_static("purchasing.receive");
    pub static EDIT_ORDER: Permission = Permission::from_static("purchasing.order.edit");
    pub static SUBMIT_ORDER: Permission = Permission::from_static("purchasing.order.submit");
    pub static APPROVE_ORDER: Permission = Permission::from_static("purchasing.order.approve");
    pub static SEND_ORDER: Permission = Permission::from_static("purchasing.order.send");
    pub static CANCEL_ORDER: Permission = Permission::from_static("purchasing.order.cancel");
    pub static CLOSE_ORDER: Permission = Permission::from_static("purchasing.order.close");
}
