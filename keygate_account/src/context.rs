//! The request-scoped security context

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A request-scoped slot holding at most one authenticated principal
///
/// One context exists per inbound request (or per logical call chain):
/// created empty, populated by the authentication layer on success, read
/// by the authorization layer, and dropped when the request completes.
/// It is an explicit value threaded through the call chain — never
/// process-wide state — so concurrent requests cannot observe each
/// other's principals.
///
/// The principal is stored type-erased. The authorization layer downcasts
/// to the principal type it expects and treats a mismatch as a failure,
/// guarding against a foreign context producer.
///
/// Cloning is cheap (the principal is behind an [`Arc`]), which lets the
/// context ride request extensions in HTTP integrations.
#[derive(Clone, Default)]
#[must_use]
pub struct SecurityContext {
    authentication: Option<Arc<dyn Any + Send + Sync>>,
}

impl fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SecurityContext")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl SecurityContext {
    /// An empty context with no principal
    #[inline]
    pub fn unauthenticated() -> Self {
        Self {
            authentication: None,
        }
    }

    /// A context holding the given principal
    pub fn with_principal<T: Any + Send + Sync>(principal: T) -> Self {
        Self {
            authentication: Some(Arc::new(principal)),
        }
    }

    /// Whether a principal has been established
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authentication.is_some()
    }

    /// The current principal, if one of the requested type is present
    #[must_use]
    pub fn principal<T: Any>(&self) -> Option<&T> {
        self.authentication
            .as_deref()
            .and_then(|p| p.downcast_ref())
    }

    /// Removes any established principal
    pub fn clear(&mut self) {
        self.authentication = None;
    }
}
