use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::AppState;
use crate::modules::auth::{
    cookie::{refresh_cookie, refresh_token_from_cookies},
    interface::{AuthError, Result},
    schema::{
        AccessTokenResponse, ForgotPasswordRequest, LoginRequest, MeResponse, MessageResponse,
        ResendOtpRequest, ResetPasswordRequest, SignupRequest, VerifyLoginRequest,
        VerifySignupRequest, VerifySignupResponse,
    },
    service::SignupVerification,
};
use crate::services::authorization::CurrentUser;

/// Unwraps a JSON body and runs its validation rules. Malformed bodies come
/// back as 400 in the usual `{"error": ...}` shape.
fn validated<T: Validate>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    let Json(req) = payload.map_err(|e| AuthError::BadRequest(e.body_text()))?;
    req.validate()
        .map_err(|e| AuthError::BadRequest(e.to_string()))?;
    Ok(req)
}

/// Counts the outcome of an auth flow and passes the result through.
fn track<T>(state: &AppState, event: &str, result: Result<T>) -> Result<T> {
    let outcome = match &result {
        Ok(_) => "success",
        Err(e) => e.label(),
    };
    state.metrics.record_auth_event(event, outcome);
    result
}

// =============================================================================
// SIGNUP
// =============================================================================

pub async fn signup(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let req = validated(payload)?;

    let result = state
        .auth
        .signup(&req.email, &req.password, req.full_name)
        .await;
    track(&state, "signup", result)?;
    state.metrics.record_otp_dispatched("verify_email");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Signup successful. Check your email for the verification code.",
        }),
    ))
}

pub async fn verify_signup(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<VerifySignupRequest>, JsonRejection>,
) -> Result<Json<VerifySignupResponse>> {
    let req = validated(payload)?;

    let result = state.auth.verify_signup(&req.email, &req.otp).await;
    let response = match track(&state, "verify_signup", result)? {
        SignupVerification::Verified(user) => VerifySignupResponse {
            message: "Email verified successfully",
            user: Some(user),
        },
        SignupVerification::AlreadyVerified => VerifySignupResponse {
            message: "Email already verified",
            user: None,
        },
    };

    Ok(Json(response))
}

// =============================================================================
// LOGIN
// =============================================================================

pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let req = validated(payload)?;

    let result = state.auth.login(&req.email, &req.password, req.role).await;
    track(&state, "login", result)?;
    state.metrics.record_otp_dispatched("login");

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "OTP sent to your email",
        }),
    ))
}

pub async fn verify_login(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<VerifyLoginRequest>, JsonRejection>,
) -> Result<Response> {
    let req = validated(payload)?;

    let result = state.auth.verify_login(&req.email, &req.otp, req.role).await;
    let tokens = track(&state, "verify_login", result)?;

    let cookie = refresh_cookie(
        &tokens.refresh_token,
        state.jwt_service.refresh_token_duration_secs(),
        state.settings.refresh_cookie_secure,
    )
    .map_err(|e| AuthError::Internal(format!("refresh cookie: {}", e)))?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);

    Ok((
        StatusCode::OK,
        headers,
        Json(AccessTokenResponse {
            access_token: tokens.access_token,
            token_type: "Bearer",
            expires_in: tokens.expires_in,
        }),
    )
        .into_response())
}

pub async fn resend_otp(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ResendOtpRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let req = validated(payload)?;

    let result = state.auth.resend_otp(&req.email, req.role).await;
    track(&state, "resend_otp", result)?;
    state.metrics.record_otp_dispatched("resend");

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "OTP resent to your email",
        }),
    ))
}

// =============================================================================
// REFRESH
// =============================================================================

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AccessTokenResponse>> {
    let Some(token) = refresh_token_from_cookies(&headers) else {
        let err = AuthError::MissingCredentials("Refresh token missing");
        return track(&state, "refresh", Err(err));
    };

    let result = state.auth.refresh(&token).await;
    let grant = track(&state, "refresh", result)?;

    Ok(Json(AccessTokenResponse {
        access_token: grant.access_token,
        token_type: "Bearer",
        expires_in: grant.expires_in,
    }))
}

// =============================================================================
// PASSWORD RESET
// =============================================================================

pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let req = validated(payload)?;

    let result = state.auth.forgot_password(&req.email, req.role).await;
    track(&state, "forgot_password", result)?;
    state.metrics.record_otp_dispatched("password_reset");

    Ok(Json(MessageResponse {
        message: "Password reset code sent to your email",
    }))
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let req = validated(payload)?;

    let result = state
        .auth
        .reset_password(
            &req.email,
            &req.reset_token,
            &req.new_password,
            &req.confirm_password,
            req.role,
        )
        .await;
    track(&state, "reset_password", result)?;

    Ok(Json(MessageResponse {
        message: "Password reset successful",
    }))
}

// =============================================================================
// IDENTITY
// =============================================================================

pub async fn me(CurrentUser(identity): CurrentUser) -> Json<MeResponse> {
    Json(MeResponse {
        id: identity.subject,
        email: identity.email,
        roles: identity.roles,
        user_type: identity.user_type,
    })
}

pub async fn admin_ping(CurrentUser(identity): CurrentUser) -> Json<MessageResponse> {
    tracing::debug!(user_id = %identity.subject, "admin ping");
    Json(MessageResponse { message: "pong" })
}
