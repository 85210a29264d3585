use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::controller;
use super::model::Role;
use crate::AppState;
use crate::services::authorization::{require_roles, RoleGate};
use crate::services::rate_limit::{create_rate_limiter, RateLimitLayer};

/// Routes under `/auth`. Everything that mails a code shares one
/// per-client limiter.
pub fn auth_routes(burst: u32, per_minute: u32) -> Router<Arc<AppState>> {
    let limiter = create_rate_limiter(burst, per_minute);

    let otp_dispatch = Router::new()
        .route("/signup", post(controller::signup))
        .route("/login", post(controller::login))
        .route("/login/resend-otp", post(controller::resend_otp))
        .route("/forgot-password", post(controller::forgot_password))
        .route_layer(RateLimitLayer::new(limiter));

    Router::new()
        .route("/signup/verify", post(controller::verify_signup))
        .route("/login/verify", post(controller::verify_login))
        .route("/refresh", post(controller::refresh))
        .route("/reset-password", post(controller::reset_password))
        .route("/me", get(controller::me))
        .merge(otp_dispatch)
}

pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(controller::admin_ping))
        .route_layer(middleware::from_fn_with_state(
            RoleGate::new([Role::Admin]),
            require_roles,
        ))
}
