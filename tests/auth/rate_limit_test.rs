use axum::http::{HeaderName, HeaderValue, StatusCode};
use serde_json::json;

use otp_gate::AppSettings;

use crate::common::{test_email, test_password, TestContext};

fn limited_context() -> TestContext {
    TestContext::with_settings(AppSettings {
        refresh_cookie_secure: true,
        otp_rate_limit_burst: 2,
        otp_rate_limit_per_minute: 1,
    })
}

#[tokio::test]
async fn otp_routes_are_throttled_after_burst() {
    let ctx = limited_context();

    for _ in 0..2 {
        ctx.signup(&test_email()).await;
    }

    let response = ctx
        .server
        .post("/auth/signup")
        .json(&json!({ "email": test_email(), "password": test_password() }))
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Too many requests");
}

fn forwarded_for(ip: &'static str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-forwarded-for"),
        HeaderValue::from_static(ip),
    )
}

#[tokio::test]
async fn otp_routes_share_one_budget_per_client() {
    let ctx = limited_context();
    let email = test_email();
    ctx.signup(&email).await;

    ctx.server
        .post("/auth/forgot-password")
        .json(&json!({ "email": test_email(), "type": "user" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    ctx.server
        .post("/auth/login/resend-otp")
        .json(&json!({ "email": &email, "type": "user" }))
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn verification_routes_are_not_throttled() {
    let ctx = limited_context();

    for _ in 0..5 {
        ctx.server
            .post("/auth/signup/verify")
            .json(&json!({ "email": test_email(), "otp": "123456" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn one_client_burst_does_not_throttle_another() {
    let ctx = TestContext::with_settings(AppSettings::default());

    for _ in 0..10 {
        let (name, value) = forwarded_for("203.0.113.10");
        ctx.server
            .post("/auth/forgot-password")
            .add_header(name, value)
            .json(&json!({ "email": test_email(), "type": "user" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    let (name, value) = forwarded_for("203.0.113.10");
    ctx.server
        .post("/auth/forgot-password")
        .add_header(name, value)
        .json(&json!({ "email": test_email(), "type": "user" }))
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);

    let (name, value) = forwarded_for("198.51.100.20");
    ctx.server
        .post("/auth/signup")
        .add_header(name, value)
        .json(&json!({ "email": test_email(), "password": test_password() }))
        .await
        .assert_status(StatusCode::CREATED);
}
