use axum::http::{header, HeaderValue, StatusCode};
use serde_json::json;

use otp_gate::modules::auth::model::Role;
use otp_gate::services::jwt::{JwtService, TokenConfig};

use crate::common::TestContext;

const EMAIL: &str = "a@x.com";
const PASSWORD: &str = "pw12345";

async fn signup(ctx: &TestContext) {
    ctx.server
        .post("/auth/signup")
        .json(&json!({ "email": EMAIL, "password": PASSWORD, "full_name": "A" }))
        .await
        .assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn signup_then_verify_flow() {
    let ctx = TestContext::new();
    signup(&ctx).await;

    let user = ctx.user(EMAIL).await;
    assert!(!user.is_verified);
    let code = user.otp.unwrap().code;

    ctx.server
        .post("/auth/signup/verify")
        .json(&json!({ "email": EMAIL, "otp": format!("{}x", code) }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    ctx.server
        .post("/auth/signup/verify")
        .json(&json!({ "email": EMAIL, "otp": &code }))
        .await
        .assert_status_ok();

    let again = ctx
        .server
        .post("/auth/signup/verify")
        .json(&json!({ "email": EMAIL, "otp": &code }))
        .await;
    again.assert_status_ok();
    let body: serde_json::Value = again.json();
    assert_eq!(body["message"], "Email already verified");
}

#[tokio::test]
async fn unverified_login_is_refused_without_otp() {
    let ctx = TestContext::new();
    signup(&ctx).await;
    let pending = ctx.otp(EMAIL).await;

    ctx.server
        .post("/auth/login")
        .json(&json!({ "email": EMAIL, "password": PASSWORD, "type": "user" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    assert_eq!(ctx.otp(EMAIL).await, pending);
    assert_eq!(ctx.outbox.sent_to(EMAIL).len(), 1);
}

#[tokio::test]
async fn verified_login_issues_tokens_once_per_code() {
    let ctx = TestContext::new();
    signup(&ctx).await;
    let code = ctx.otp(EMAIL).await;
    ctx.server
        .post("/auth/signup/verify")
        .json(&json!({ "email": EMAIL, "otp": code }))
        .await
        .assert_status_ok();

    ctx.server
        .post("/auth/login")
        .json(&json!({ "email": EMAIL, "password": PASSWORD, "type": "user" }))
        .await
        .assert_status(StatusCode::ACCEPTED);
    let code = ctx.otp(EMAIL).await;

    let first = ctx
        .server
        .post("/auth/login/verify")
        .json(&json!({ "email": EMAIL, "otp": &code, "type": "user" }))
        .await;
    first.assert_status_ok();
    let body: serde_json::Value = first.json();
    assert!(body["access_token"].as_str().is_some());
    assert!(first.headers().get(header::SET_COOKIE).is_some());

    ctx.server
        .post("/auth/login/verify")
        .json(&json!({ "email": EMAIL, "otp": &code, "type": "user" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn refresh_signed_under_rotated_secret_is_refused() {
    let ctx = TestContext::new();
    signup(&ctx).await;
    let user = ctx.user(EMAIL).await;

    let old = JwtService::new(&TokenConfig::new("rotated-away-secret"));
    let token = old.issue_refresh(&user.id, &[Role::User], Role::User).unwrap();

    ctx.server
        .post("/auth/refresh")
        .add_header(
            header::COOKIE,
            HeaderValue::from_str(&format!("refreshToken={}", token)).unwrap(),
        )
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
