use axum::http::{header, StatusCode};
use chrono::Duration;
use serde_json::json;

use otp_gate::modules::auth::model::{Role, UserUpdate};
use otp_gate::modules::auth::UserStore;

use crate::common::{test_email, test_password, TestContext};

async fn login_step_one(ctx: &TestContext, email: &str, password: &str, role: &str) -> axum_test::TestResponse {
    ctx.server
        .post("/auth/login")
        .json(&json!({
            "email": email,
            "password": password,
            "type": role
        }))
        .await
}

#[tokio::test]
async fn login_mails_otp_and_returns_no_tokens() {
    let ctx = TestContext::new();
    let email = test_email();
    ctx.verified_user(&email).await;

    let response = login_step_one(&ctx, &email, test_password(), "user").await;

    response.assert_status(StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json();
    assert!(body.get("access_token").is_none());
    assert!(body.get("message").is_some());

    let code = ctx.otp(&email).await;
    let last = ctx.outbox.sent_to(&email).pop().unwrap();
    assert_eq!(last.subject, "Your Login OTP");
    assert!(last.body.contains(&code));
}

#[tokio::test]
async fn login_unknown_email_and_wrong_password_look_identical() {
    let ctx = TestContext::new();
    let email = test_email();
    ctx.verified_user(&email).await;

    let wrong_password = login_step_one(&ctx, &email, "WrongPassword123!", "user").await;
    let unknown_email = login_step_one(&ctx, &test_email(), test_password(), "user").await;

    wrong_password.assert_status(StatusCode::UNAUTHORIZED);
    unknown_email.assert_status(StatusCode::UNAUTHORIZED);

    let first: serde_json::Value = wrong_password.json();
    let second: serde_json::Value = unknown_email.json();
    assert_eq!(first, second);
    assert_eq!(first["error"], "Invalid credentials");
}

#[tokio::test]
async fn login_unverified_user_returns_forbidden() {
    let ctx = TestContext::new();
    let email = test_email();
    ctx.signup(&email).await;

    let response = login_step_one(&ctx, &email, test_password(), "user").await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Account not verified");
    assert_eq!(ctx.outbox.sent_to(&email).len(), 1);
}

#[tokio::test]
async fn login_with_role_not_held_issues_no_otp() {
    let ctx = TestContext::new();
    let email = test_email();
    ctx.verified_user(&email).await;

    let response = login_step_one(&ctx, &email, test_password(), "admin").await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Invalid role for this user");
    assert!(ctx.user(&email).await.otp.is_none());
    assert_eq!(ctx.outbox.sent_to(&email).len(), 1);
}

#[tokio::test]
async fn login_with_unknown_role_returns_bad_request() {
    let ctx = TestContext::new();
    let email = test_email();
    ctx.verified_user(&email).await;

    let response = login_step_one(&ctx, &email, test_password(), "superuser").await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verify_login_returns_access_token_and_refresh_cookie() {
    let ctx = TestContext::new();
    let email = test_email();
    ctx.verified_user(&email).await;

    let response = ctx.login(&email, "user").await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 3600);
    assert!(body.get("refresh_token").is_none());

    let set_cookie = response.header(header::SET_COOKIE);
    let set_cookie = set_cookie.to_str().unwrap();
    assert!(set_cookie.starts_with("refreshToken="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Secure"));
    assert!(set_cookie.contains("SameSite=None"));
    assert!(set_cookie.contains("Path=/"));

    let claims = ctx
        .jwt
        .verify_access(body["access_token"].as_str().unwrap())
        .unwrap();
    let user = ctx.user(&email).await;
    assert_eq!(claims.sub, user.id);
    assert_eq!(claims.email, email);
    assert_eq!(claims.roles, vec![Role::User]);
    assert_eq!(claims.user_type, Role::User);
    assert!(user.otp.is_none());
}

#[tokio::test]
async fn admin_login_scopes_token_to_requested_role() {
    let ctx = TestContext::new();
    let email = test_email();
    ctx.verified_user(&email).await;
    ctx.grant_role(&email, Role::Admin).await;

    let token = ctx.access_token(&email, "ADMIN").await;

    let claims = ctx.jwt.verify_access(&token).unwrap();
    assert_eq!(claims.roles, vec![Role::Admin]);
    assert_eq!(claims.user_type, Role::Admin);
}

#[tokio::test]
async fn verify_login_with_wrong_code_returns_bad_request() {
    let ctx = TestContext::new();
    let email = test_email();
    ctx.verified_user(&email).await;
    login_step_one(&ctx, &email, test_password(), "user")
        .await
        .assert_status(StatusCode::ACCEPTED);

    let response = ctx
        .server
        .post("/auth/login/verify")
        .json(&json!({ "email": &email, "otp": "not-the-code", "type": "user" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Invalid or expired OTP");
    assert!(ctx.user(&email).await.otp.is_some());
}

#[tokio::test]
async fn verify_login_accepts_code_up_to_expiry() {
    let ctx = TestContext::new();
    let email = test_email();
    ctx.verified_user(&email).await;
    login_step_one(&ctx, &email, test_password(), "user")
        .await
        .assert_status(StatusCode::ACCEPTED);
    let code = ctx.otp(&email).await;

    ctx.clock.advance(Duration::minutes(10) - Duration::seconds(1));

    ctx.server
        .post("/auth/login/verify")
        .json(&json!({ "email": &email, "otp": code, "type": "user" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn verify_login_after_expiry_returns_bad_request() {
    let ctx = TestContext::new();
    let email = test_email();
    ctx.verified_user(&email).await;
    login_step_one(&ctx, &email, test_password(), "user")
        .await
        .assert_status(StatusCode::ACCEPTED);
    let code = ctx.otp(&email).await;

    ctx.clock.advance(Duration::minutes(10) + Duration::seconds(1));

    ctx.server
        .post("/auth/login/verify")
        .json(&json!({ "email": &email, "otp": code, "type": "user" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verify_login_rechecks_role() {
    let ctx = TestContext::new();
    let email = test_email();
    ctx.verified_user(&email).await;
    ctx.grant_role(&email, Role::Admin).await;

    login_step_one(&ctx, &email, test_password(), "admin")
        .await
        .assert_status(StatusCode::ACCEPTED);
    let code = ctx.otp(&email).await;

    let user = ctx.user(&email).await;
    ctx.store
        .update(&user.id, &UserUpdate::new().roles([Role::User].into()))
        .await
        .unwrap();

    let response = ctx
        .server
        .post("/auth/login/verify")
        .json(&json!({ "email": &email, "otp": code, "type": "admin" }))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn verify_login_for_unknown_email_returns_not_found() {
    let ctx = TestContext::new();

    ctx.server
        .post("/auth/login/verify")
        .json(&json!({ "email": test_email(), "otp": "123456", "type": "user" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn verify_login_with_signup_code_returns_forbidden() {
    let ctx = TestContext::new();
    let email = test_email();
    ctx.signup(&email).await;
    let signup_code = ctx.otp(&email).await;

    let response = ctx
        .server
        .post("/auth/login/verify")
        .json(&json!({ "email": &email, "otp": signup_code, "type": "user" }))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Account not verified");
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let user = ctx.user(&email).await;
    assert!(!user.is_verified);
    assert_eq!(user.otp.unwrap().code, signup_code);
}
