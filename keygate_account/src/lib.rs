//! Service-account authorization based on granted scopes
//!
//! This crate layers the machine-identity domain over the [`keygate`]
//! credential codec:
//!
//! * [`ServiceAccount`] — the authenticated principal: a client id, a
//!   display name, and the set of scopes it has been granted
//! * [`TokenService`] — issues credentials for a principal and parses
//!   credentials back into one, applying issuer and expiry policy
//! * [`SecurityContext`] — the request-scoped slot carrying at most one
//!   principal from the authentication layer to the authorization layer
//! * [`ScopeRequirement`] and [`authorize`]/[`require_scope`] — the
//!   operation-level gate that admits a call only when the principal holds
//!   every required scope
//!
//! Nothing here is HTTP-specific; the HTTP authentication gate lives in
//! `keygate_tower`.
//!
//! ```
//! use keygate::SecretKey;
//! use keygate_account::{
//!     authorize, scopes, SecurityContext, ServiceAccount, ScopeRequirement, TokenService,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = TokenService::new(
//!     SecretKey::generate(keygate::Algorithm::HS256)?,
//!     keygate_account::DEFAULT_ISSUER.into(),
//! );
//!
//! let account = ServiceAccount::new("svc-reporting", "Reporting", scopes!["read:data"]);
//! let credential = service.issue(&account, 300)?;
//!
//! let parsed = service.parse(&credential).expect("freshly issued");
//! let context = SecurityContext::with_principal(parsed);
//!
//! let requirement = ScopeRequirement::from_static("read:data");
//! let granted = authorize(&context, &requirement)?;
//! assert_eq!(granted.client_id().as_str(), "svc-reporting");
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod account;
mod authorizer;
mod context;
mod requirement;
pub mod scope;
mod service;

pub use account::{AccountClaims, Capabilities, ClientId, ClientIdRef, ServiceAccount};
pub use authorizer::{authorize, require_scope, AccessDenied};
pub use context::SecurityContext;
pub use requirement::{InsufficientScope, ScopeRequirement};
pub use scope::{InvalidScopeToken, ScopeSet, ScopeToken, ScopeTokenRef};
pub use service::{TokenService, DEFAULT_ISSUER};
