//! Purchase order state machine.
//!
//! [`can_transition`] is the pure transition table; [`validate`] layers actor
//! permission and business preconditions on top. Both the explicit
//! status-change operation and the automatic receiving-driven transitions go
//! through the same pair, so the two paths cannot diverge.

use thiserror::Error;

use stockledger_auth::{Permission, Principal, authorize, perms};

use crate::order::{PurchaseOrder, PurchaseOrderStatus};

/// Error raised for an illegal or unauthorized state-machine move.
///
/// Always raised before any mutation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: PurchaseOrderStatus,
        to: PurchaseOrderStatus,
    },

    #[error("unauthorized transition: missing permission '{required}'")]
    Unauthorized { required: String },

    #[error("transition precondition failed: {0}")]
    Precondition(String),
}

/// Legal targets for each status. The whole lifecycle in one table.
pub fn allowed_targets(from: PurchaseOrderStatus) -> &'static [PurchaseOrderStatus] {
    use PurchaseOrderStatus::*;
    match from {
        Draft => &[PendingApproval, Cancelled],
        PendingApproval => &[Approved, Draft, Cancelled],
        Approved => &[SentToSupplier, PartiallyReceived, Cancelled],
        SentToSupplier => &[PartiallyReceived, FullyReceived, Cancelled],
        PartiallyReceived => &[FullyReceived, Cancelled],
        FullyReceived => &[Closed],
        Cancelled => &[],
        Closed => &[],
    }
}

/// Pure table lookup. Anything not explicitly listed is illegal, including
/// every self-transition and every move out of a terminal status.
pub fn can_transition(from: PurchaseOrderStatus, to: PurchaseOrderStatus) -> bool {
    allowed_targets(from).contains(&to)
}

/// Permission required to move an order **into** the given status.
pub fn required_permission(to: PurchaseOrderStatus) -> &'static Permission {
    use PurchaseOrderStatus::*;
    match to {
        Draft => &perms::EDIT_ORDER,
        PendingApproval => &perms::SUBMIT_ORDER,
        Approved => &perms::APPROVE_ORDER,
        SentToSupplier => &perms::SEND_ORDER,
        PartiallyReceived | FullyReceived => &perms::RECEIVE_GOODS,
        Cancelled => &perms::CANCEL_ORDER,
        Closed => &perms::CLOSE_ORDER,
    }
}

/// Validate a transition without mutating anything: table legality, actor
/// permission for the target status, then business preconditions.
pub fn validate(
    order: &PurchaseOrder,
    to: PurchaseOrderStatus,
    principal: &Principal,
) -> Result<(), TransitionError> {
    if !can_transition(order.status, to) {
        return Err(TransitionError::InvalidTransition {
            from: order.status,
            to,
        });
    }

    authorize(principal, required_permission(to)).map_err(|_| TransitionError::Unauthorized {
        required: required_permission(to).as_str().to_string(),
    })?;

    match to {
        PurchaseOrderStatus::PendingApproval if order.lines.is_empty() => {
            Err(TransitionError::Precondition(
                "cannot submit a purchase order without lines".to_string(),
            ))
        }
        PurchaseOrderStatus::FullyReceived if !order.is_fully_received() => {
            let open: Vec<String> = order
                .lines
                .iter()
                .filter(|l| l.pending() > 0)
                .map(|l| format!("{} pending {}", l.product_id, l.pending()))
                .collect();
            Err(TransitionError::Precondition(format!(
                "cannot mark fully received with open lines: {}",
                open.join(", ")
            )))
        }
        PurchaseOrderStatus::PartiallyReceived if !order.has_any_receipt() => {
            Err(TransitionError::Precondition(
                "cannot mark partially received before any receipt".to_string(),
            ))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use stockledger_auth::PrincipalId;
    use stockledger_core::{ProductId, PurchaseOrderId, SupplierId};

    use PurchaseOrderStatus::*;

    #[test]
    fn transition_table_matches_the_order_lifecycle() {
        let allowed: &[(PurchaseOrderStatus, PurchaseOrderStatus)] = &[
            (Draft, PendingApproval),
            (Draft, Cancelled),
            (PendingApproval, Approved),
            (PendingApproval, Draft),
            (PendingApproval, Cancelled),
            (Approved, SentToSupplier),
            (Approved, PartiallyReceived),
            (Approved, Cancelled),
            (SentToSupplier, PartiallyReceived),
            (SentToSupplier, FullyReceived),
            (SentToSupplier, Cancelled),
            (PartiallyReceived, FullyReceived),
            (PartiallyReceived, Cancelled),
            (FullyReceived, Closed),
        ];

        for from in PurchaseOrderStatus::ALL {
            for to in PurchaseOrderStatus::ALL {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    can_transition(from, to),
                    expected,
                    "{from} -> {to} should be {expected}"
                );
            }
        }
    }

    #[test]
    fn self_transitions_are_all_illegal() {
        for status in PurchaseOrderStatus::ALL {
            assert!(!can_transition(status, status), "{status} -> {status}");
        }
    }

    #[test]
    fn terminal_statuses_have_no_exits() {
        for terminal in [Cancelled, Closed] {
            assert!(allowed_targets(terminal).is_empty());
        }
    }

    fn order_with_line() -> (PurchaseOrder, ProductId) {
        let mut po = PurchaseOrder::create(PurchaseOrderId::new(), SupplierId::new(), Utc::now());
        let product = ProductId::new();
        po.add_line(product, 100, Decimal::ONE).unwrap();
        (po, product)
    }

    #[test]
    fn approval_requires_the_approver_permission() {
        let (mut po, _) = order_with_line();
        po.apply_transition(PendingApproval, PrincipalId::new(), "submit", Utc::now())
            .unwrap();

        let receiver = Principal::new(PrincipalId::new(), vec![perms::RECEIVE_GOODS.clone()]);
        let err = validate(&po, Approved, &receiver).unwrap_err();
        assert_eq!(
            err,
            TransitionError::Unauthorized {
                required: "purchasing.order.approve".to_string()
            }
        );

        let approver = Principal::new(PrincipalId::new(), vec![perms::APPROVE_ORDER.clone()]);
        assert!(validate(&po, Approved, &approver).is_ok());
    }

    #[test]
    fn fully_received_requires_zero_pending_everywhere() {
        let (mut po, product) = order_with_line();
        let actor = PrincipalId::new();
        for to in [PendingApproval, Approved, SentToSupplier] {
            po.apply_transition(to, actor, "step", Utc::now()).unwrap();
        }

        let principal = Principal::wildcard(actor);
        po.record_receipt(product, 75).unwrap();
        let err = validate(&po, FullyReceived, &principal).unwrap_err();
        assert!(matches!(err, TransitionError::Precondition(_)));

        po.record_receipt(product, 25).unwrap();
        assert!(validate(&po, FullyReceived, &principal).is_ok());
    }

    #[test]
    fn submit_requires_at_least_one_line() {
        let po = PurchaseOrder::create(PurchaseOrderId::new(), SupplierId::new(), Utc::now());
        let principal = Principal::wildcard(PrincipalId::new());
        let err = validate(&po, PendingApproval, &principal).unwrap_err();
        assert!(matches!(err, TransitionError::Precondition(_)));
    }

    #[test]
    fn invalid_transition_wins_over_missing_permission() {
        let (po, _) = order_with_line();
        let nobody = Principal::new(PrincipalId::new(), vec![]);
        // Draft -> FullyReceived is off-table; reported as invalid, not unauthorized.
        let err = validate(&po, FullyReceived, &nobody).unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition { .. }));
    }
}
