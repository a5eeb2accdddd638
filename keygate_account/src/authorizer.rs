//! The operation-level scope authorization check
//!
//! Invoked immediately before a protected operation executes. The check is
//! an explicit wrapper — [`require_scope`] takes the requirement and the
//! operation and runs the operation only if the check passes — so it
//! composes anywhere a closure does, with no runtime annotation scanning
//! involved.

use thiserror::Error;

use crate::account::ServiceAccount;
use crate::context::SecurityContext;
use crate::requirement::{InsufficientScope, ScopeRequirement};

/// A protected operation was not authorized
///
/// These failures occur after authentication, so they are precise and safe
/// to report to operators and logs.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AccessDenied {
    /// No principal has been established in the security context
    #[error("no authentication found")]
    Unauthenticated,

    /// The context holds a principal of an unexpected shape
    #[error("invalid authentication principal")]
    InvalidPrincipal,

    /// The principal does not hold every required scope
    #[error(transparent)]
    InsufficientScope(#[from] InsufficientScope),
}

/// Checks the current principal against an operation's scope requirement
///
/// An empty requirement succeeds for any authenticated principal.
///
/// # Errors
///
/// * [`AccessDenied::Unauthenticated`] if the context holds no principal
/// * [`AccessDenied::InvalidPrincipal`] if the context holds something
///   other than a [`ServiceAccount`]
/// * [`AccessDenied::InsufficientScope`] naming the missing scopes if the
///   principal does not hold every required scope
pub fn authorize<'a>(
    context: &'a SecurityContext,
    requirement: &ScopeRequirement,
) -> Result<&'a ServiceAccount, AccessDenied> {
    if !context.is_authenticated() {
        return Err(AccessDenied::Unauthenticated);
    }

    let account = context
        .principal::<ServiceAccount>()
        .ok_or(AccessDenied::InvalidPrincipal)?;

    requirement.evaluate(account.scopes())?;

    Ok(account)
}

/// Runs `operation` only if the current principal satisfies `requirement`
///
/// ```
/// use keygate_account::{require_scope, scopes, SecurityContext, ServiceAccount, ScopeRequirement};
///
/// let context = SecurityContext::with_principal(ServiceAccount::new(
///     "svc-1",
///     "Reporting",
///     scopes!["read:data"],
/// ));
///
/// let report = require_scope(
///     &context,
///     &ScopeRequirement::from_static("read:data"),
///     |account| format!("report for {}", account.client_id()),
/// )?;
/// assert_eq!(report, "report for svc-1");
/// # Ok::<(), keygate_account::AccessDenied>(())
/// ```
///
/// # Errors
///
/// Propagates the [`authorize`] failure without invoking `operation`.
pub fn require_scope<T, F>(
    context: &SecurityContext,
    requirement: &ScopeRequirement,
    operation: F,
) -> Result<T, AccessDenied>
where
    F: FnOnce(&ServiceAccount) -> T,
{
    let account = authorize(context, requirement)?;
    Ok(operation(account))
}
