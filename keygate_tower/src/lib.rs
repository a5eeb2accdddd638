//! Tower middleware authenticating service-account credentials on inbound
//! HTTP requests
//!
//! The [`AuthenticationGate`] classifies each request against a set of
//! unprotected route patterns, extracts a bearer (or identity-cookie)
//! credential from protected requests, verifies it with a
//! [`TokenService`][keygate_account::TokenService], and establishes the
//! request-scoped [`SecurityContext`][keygate_account::SecurityContext]
//! consumed by the operation-level scope checks. Rejections are written as
//! `401` responses with a fixed JSON body; the inner service is only
//! invoked for requests that passed.
//!
//! ```no_run
//! use axum::{routing::get, Extension, Router};
//! use keygate::token::Issuer;
//! use keygate::SecretKey;
//! use keygate_account::{
//!     require_scope, SecurityContext, ScopeRequirement, TokenService, DEFAULT_ISSUER,
//! };
//! use keygate_tower::{AuthenticationGate, RouteMatcher};
//!
//! async fn read_data(Extension(ctx): Extension<SecurityContext>) -> Result<String, String> {
//!     require_scope(&ctx, &ScopeRequirement::from_static("read:data"), |account| {
//!         format!("data for {}", account.client_id())
//!     })
//!     .map_err(|denied| denied.to_string())
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = TokenService::new(
//!     SecretKey::from_base64("c3VwZXItc2VjcmV0LXNpZ25pbmcta2V5")?,
//!     Issuer::from_static(DEFAULT_ISSUER),
//! );
//!
//! let gate = AuthenticationGate::new(service, RouteMatcher::new(["/public/**", "/health"]))
//!     .with_identity_cookie("identity")
//!     .with_json_error_handler::<axum::body::Body>();
//!
//! let app: Router = Router::new()
//!     .route("/api/data", get(read_data))
//!     .route("/health", get(|| async { "ok" }))
//!     .layer(gate.into_layer());
//! # let _ = app;
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

mod gate;
mod routes;

pub use gate::{AuthenticationGate, JsonErrorHandler, OnAuthRejected};
pub use routes::RouteMatcher;
