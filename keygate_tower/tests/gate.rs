use axum::body::Body;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};
use color_eyre::Result;
use http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use keygate::clock::{TestClock, UnixTime};
use keygate::token::Issuer;
use keygate::{SecretKey, SignedToken};
use keygate_account::{
    require_scope, scopes, ScopeRequirement, SecurityContext, ServiceAccount, TokenService,
    DEFAULT_ISSUER,
};
use keygate_tower::{AuthenticationGate, RouteMatcher};
use tower::ServiceExt;

fn token_service(now: u64) -> TokenService<TestClock> {
    TokenService::new(
        SecretKey::new(b"an end-to-end test secret".to_vec()),
        Issuer::from_static(DEFAULT_ISSUER),
    )
    .with_clock(TestClock::new(UnixTime(now)))
}

fn issue(scopes: keygate_account::ScopeSet) -> SignedToken {
    token_service(10_000)
        .issue(&ServiceAccount::new("svc-reporting", "Reporting", scopes), 300)
        .expect("issuance succeeds")
}

async fn read_data(Extension(ctx): Extension<SecurityContext>) -> axum::response::Response {
    scope_guarded(&ctx, &ScopeRequirement::from_static("read:data"))
}

async fn admin_write(Extension(ctx): Extension<SecurityContext>) -> axum::response::Response {
    scope_guarded(&ctx, &ScopeRequirement::from_static("admin:write"))
}

fn scope_guarded(ctx: &SecurityContext, requirement: &ScopeRequirement) -> axum::response::Response {
    match require_scope(ctx, requirement, |account| {
        format!("ok: {}", account.client_id())
    }) {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(denied) => (StatusCode::FORBIDDEN, denied.to_string()).into_response(),
    }
}

async fn public_page() -> &'static str {
    "public"
}

fn app(now: u64) -> Router {
    let gate = AuthenticationGate::new(token_service(now), RouteMatcher::new(["/public/**"]))
        .with_identity_cookie("identity")
        .with_json_error_handler::<Body>();

    Router::new()
        .route("/api/data", get(read_data))
        .route("/api/admin", get(admin_write))
        .route("/public/*rest", get(public_page))
        .layer(gate.into_layer())
}

async fn body_string(response: axum::response::Response) -> Result<String> {
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok(String::from_utf8(bytes.to_vec())?)
}

#[tokio::test]
async fn authorized_request_reaches_the_operation() -> Result<()> {
    let token = issue(scopes!["read:data"]);

    let response = app(10_000)
        .oneshot(
            Request::builder()
                .uri("/api/data")
                .header(header::AUTHORIZATION, format!("Bearer {:#}", token))
                .body(Body::empty())?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await?, "ok: svc-reporting");
    Ok(())
}

#[tokio::test]
async fn missing_scope_is_denied_naming_the_scope() -> Result<()> {
    let token = issue(scopes!["read:data"]);

    let response = app(10_000)
        .oneshot(
            Request::builder()
                .uri("/api/admin")
                .header(header::AUTHORIZATION, format!("Bearer {:#}", token))
                .body(Body::empty())?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_string(response).await?;
    assert!(body.contains("admin:write"), "body was: {body}");
    Ok(())
}

#[tokio::test]
async fn anonymous_request_to_protected_route_is_rejected() -> Result<()> {
    let response = app(10_000)
        .oneshot(Request::builder().uri("/api/data").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    assert_eq!(
        body_string(response).await?,
        r#"{"error":"Authentication required"}"#
    );
    Ok(())
}

#[tokio::test]
async fn garbage_credential_is_rejected() -> Result<()> {
    let response = app(10_000)
        .oneshot(
            Request::builder()
                .uri("/api/data")
                .header(header::AUTHORIZATION, "Bearer garbage")
                .body(Body::empty())?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_string(response).await?,
        r#"{"error":"Invalid or expired token"}"#
    );
    Ok(())
}

#[tokio::test]
async fn expired_credential_is_rejected() -> Result<()> {
    let token = issue(scopes!["read:data"]);

    // The gate's clock sits at the credential's expiry
    let response = app(10_300)
        .oneshot(
            Request::builder()
                .uri("/api/data")
                .header(header::AUTHORIZATION, format!("Bearer {:#}", token))
                .body(Body::empty())?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_string(response).await?,
        r#"{"error":"Invalid or expired token"}"#
    );
    Ok(())
}

#[tokio::test]
async fn unprotected_route_bypasses_authentication_entirely() -> Result<()> {
    let response = app(10_000)
        .oneshot(Request::builder().uri("/public/anything").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await?, "public");
    Ok(())
}

#[tokio::test]
async fn identity_cookie_authenticates_without_a_header() -> Result<()> {
    let token = issue(scopes!["read:data"]);

    let response = app(10_000)
        .oneshot(
            Request::builder()
                .uri("/api/data")
                .header(header::COOKIE, format!("identity={:#}", token))
                .body(Body::empty())?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await?, "ok: svc-reporting");
    Ok(())
}
