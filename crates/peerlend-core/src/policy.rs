//! Stateless authorization predicates, evaluated before every mutating
//! operation. Ownership rules live here so the lifecycle code reads as
//! guard-then-transition.

use uuid::Uuid;

use peerlend_types::models::{LoanRequest, Role, User};

pub fn can_create_loan(actor: &User) -> bool {
    actor.role == Role::Borrower && actor.kyc.verified
}

pub fn can_view_open_loans(actor: &User) -> bool {
    actor.role == Role::Lender
}

pub fn can_express_interest(actor: &User) -> bool {
    actor.role == Role::Lender
}

/// A respond call is owned by the loan's borrower or by the lender currently
/// matched to it. Nobody else — admins included — may consent on a party's
/// behalf.
pub fn can_respond(actor: &User, loan: &LoanRequest) -> bool {
    match actor.role {
        Role::Borrower => loan.borrower == actor.id,
        Role::Lender => loan.matched_with == Some(actor.id),
        Role::Admin => false,
    }
}

pub fn can_administer(actor: &User) -> bool {
    actor.role == Role::Admin
}

/// Dashboards are visible to their owner and to admins.
pub fn can_view_dashboard(actor: &User, target: Uuid) -> bool {
    actor.id == target || actor.role == Role::Admin
}
