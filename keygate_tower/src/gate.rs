//! The request-time authentication gate

use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Request, Response, StatusCode};
use keygate::clock::{Clock, System};
use keygate::SignedToken;
use keygate_account::{Capabilities, SecurityContext, TokenService};
use tower_http::validate_request::{ValidateRequest, ValidateRequestHeaderLayer};

use crate::routes::RouteMatcher;

const MISSING_CREDENTIAL_BODY: &str = r#"{"error":"Authentication required"}"#;
const INVALID_CREDENTIAL_BODY: &str = r#"{"error":"Invalid or expired token"}"#;

/// Authenticates inbound requests with a service-account credential
///
/// Each request moves through exactly one of three outcomes:
///
/// 1. its path matches an unprotected route pattern — passed through
///    untouched, no credential read, no context established;
/// 2. a credential is extracted and verified — a [`SecurityContext`]
///    carrying the principal and the derived [`Capabilities`] are placed
///    in the request extensions and the request is forwarded;
/// 3. otherwise — a `401` rejection is written and the inner service never
///    sees the request.
///
/// Credentials are read from the `Authorization: Bearer` header first,
/// then (when configured) from the identity cookie.
pub struct AuthenticationGate<C = System, OnError = ()> {
    service: TokenService<C>,
    routes: RouteMatcher,
    identity_cookie: Option<String>,
    on_error: OnError,
}

impl<C, OnError> Clone for AuthenticationGate<C, OnError>
where
    C: Clone,
    OnError: Clone,
{
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            routes: self.routes.clone(),
            identity_cookie: self.identity_cookie.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<C, OnError> fmt::Debug for AuthenticationGate<C, OnError>
where
    C: fmt::Debug,
    OnError: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AuthenticationGate")
            .field("service", &self.service)
            .field("routes", &self.routes)
            .field("identity_cookie", &self.identity_cookie)
            .field("on_error", &self.on_error)
            .finish()
    }
}

impl<C> AuthenticationGate<C, ()> {
    /// A gate verifying credentials with `service`, bypassing the routes
    /// matched by `routes`
    pub fn new(service: TokenService<C>, routes: RouteMatcher) -> Self {
        Self {
            service,
            routes,
            identity_cookie: None,
            on_error: (),
        }
    }
}

impl<C, OnError> AuthenticationGate<C, OnError> {
    /// Enables the fallback credential source: a cookie with the given
    /// name, consulted when no `Authorization` header is present
    #[must_use]
    pub fn with_identity_cookie(mut self, name: impl Into<String>) -> Self {
        self.identity_cookie = Some(name.into());
        self
    }

    /// Attaches a custom handler to generate the rejection responses
    pub fn with_error_handler<E>(self, on_error: E) -> AuthenticationGate<C, E> {
        AuthenticationGate {
            service: self.service,
            routes: self.routes,
            identity_cookie: self.identity_cookie,
            on_error,
        }
    }

    /// Attaches the default [`JsonErrorHandler`], generating `401`
    /// responses with a fixed JSON body
    pub fn with_json_error_handler<ResBody>(
        self,
    ) -> AuthenticationGate<C, JsonErrorHandler<ResBody>>
    where
        ResBody: From<Bytes>,
    {
        self.with_error_handler(JsonErrorHandler::new())
    }

    /// Wraps the gate in a layer for use with `Router::layer` or any
    /// tower service stack
    pub fn into_layer(self) -> ValidateRequestHeaderLayer<Self> {
        ValidateRequestHeaderLayer::custom(self)
    }
}

fn clear_authentication<B>(request: &mut Request<B>) {
    let _ = request.extensions_mut().remove::<SecurityContext>();
    let _ = request.extensions_mut().remove::<Capabilities>();
}

impl<B, C, OnError> ValidateRequest<B> for AuthenticationGate<C, OnError>
where
    C: Clock,
    OnError: OnAuthRejected,
{
    type ResponseBody = OnError::Body;

    fn validate(
        &mut self,
        request: &mut Request<B>,
    ) -> Result<(), Response<Self::ResponseBody>> {
        if self.routes.is_unprotected(request.uri().path()) {
            tracing::trace!(path = request.uri().path(), "route is unprotected");
            return Ok(());
        }

        let token =
            match extract_credential(request.headers(), self.identity_cookie.as_deref()) {
                Some(token) => token,
                None => {
                    clear_authentication(request);
                    return Err(self.on_error.on_missing_credential());
                }
            };

        if !self.service.is_valid(&token) {
            clear_authentication(request);
            return Err(self.on_error.on_invalid_credential());
        }

        let Some(account) = self.service.parse(&token) else {
            // valid at the codec level, but not an account credential
            clear_authentication(request);
            return Err(self.on_error.on_invalid_credential());
        };

        tracing::trace!(client_id = %account.client_id(), "request authenticated");

        let capabilities = account.capabilities();
        let _ = request.extensions_mut().insert(capabilities);
        let _ = request
            .extensions_mut()
            .insert(SecurityContext::with_principal(account));

        Ok(())
    }
}

fn extract_credential(
    headers: &HeaderMap,
    identity_cookie: Option<&str>,
) -> Option<SignedToken> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer);
    if bearer.is_some() {
        return bearer;
    }

    cookie_value(headers, identity_cookie?).map(SignedToken::from)
}

fn extract_bearer(auth: &str) -> Option<SignedToken> {
    if auth.len() <= 7 || !auth[..7].eq_ignore_ascii_case("bearer ") {
        return None;
    }

    Some(SignedToken::from(auth[7..].trim()))
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Handler for producing the gate's rejection responses
pub trait OnAuthRejected {
    /// The body type of the produced responses
    type Body;

    /// Response when no credential could be extracted from the request
    fn on_missing_credential(&self) -> Response<Self::Body>;

    /// Response when the extracted credential failed verification
    fn on_invalid_credential(&self) -> Response<Self::Body>;
}

/// The default rejection handler: `401` with a fixed JSON body
///
/// Produces exactly `{"error":"Authentication required"}` when no
/// credential is presented and `{"error":"Invalid or expired token"}`
/// when the credential fails verification, with
/// `Content-Type: application/json`.
pub struct JsonErrorHandler<ResBody> {
    _ty: PhantomData<fn() -> ResBody>,
}

impl<ResBody> JsonErrorHandler<ResBody> {
    /// Instantiates the handler over a given body type
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> fmt::Debug for JsonErrorHandler<ResBody> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("JsonErrorHandler")
    }
}

impl<ResBody> Default for JsonErrorHandler<ResBody> {
    #[inline]
    fn default() -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> Clone for JsonErrorHandler<ResBody> {
    #[inline]
    fn clone(&self) -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> Copy for JsonErrorHandler<ResBody> {}

impl<ResBody> OnAuthRejected for JsonErrorHandler<ResBody>
where
    ResBody: From<Bytes>,
{
    type Body = ResBody;

    fn on_missing_credential(&self) -> Response<Self::Body> {
        tracing::debug!("authentication failed: no credential presented");
        unauthorized(MISSING_CREDENTIAL_BODY)
    }

    fn on_invalid_credential(&self) -> Response<Self::Body> {
        tracing::debug!("authentication failed: invalid or expired credential");
        unauthorized(INVALID_CREDENTIAL_BODY)
    }
}

fn unauthorized<Body: From<Bytes>>(body: &'static str) -> Response<Body> {
    let mut resp = Response::new(Body::from(Bytes::from_static(body.as_bytes())));
    *resp.status_mut() = StatusCode::UNAUTHORIZED;
    let _ = resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    resp
}
