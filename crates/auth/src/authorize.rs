use std::collections::HashSet;

use thiserror::Error;

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Authorize a principal for one required permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let perms: HashSet<&str> = principal
        .permissions
        .iter()
        .map(|p| p.as_str())
        .collect();

    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PrincipalId, perms};

    #[test]
    fn grants_explicit_permission() {
        let p = Principal::new(PrincipalId::new(), vec![perms::RECEIVE_GOODS.clone()]);
        assert!(authorize(&p, &perms::RECEIVE_GOODS).is_ok());
    }

    #[test]
    fn wildcard_grants_everything() {
        let p = Principal::wildcard(PrincipalId::new());
        assert!(authorize(&p, &perms::APPROVE_ORDER).is_ok());
        assert!(authorize(&p, &perms::PROCESS_SALE).is_ok());
    }

    #[test]
    fn denies_missing_permission_with_its_name() {
        let p = Principal::new(PrincipalId::new(), vec![perms::PROCESS_SALE.clone()]);
        let err = authorize(&p, &perms::APPROVE_ORDER).unwrap_err();
        assert_eq!(
            err,
            AuthzError::Forbidden("purchasing.order.approve".to_string())
        );
    }
}
