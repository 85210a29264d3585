use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::model::{UserRecord, UserUpdate};
use super::schema::ErrorResponse;
use crate::services::email::NotifyError;

// =============================================================================
// REPOSITORY TRAITS
// =============================================================================

pub type Result<T> = std::result::Result<T, AuthError>;

/// Persistent home of user records, including the transient challenge fields.
///
/// `update` must apply every change in `UserUpdate` to one record atomically.
/// Nothing stronger is assumed: read-then-update sequences may interleave.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>>;
    async fn insert(&self, user: &UserRecord) -> Result<()>;
    async fn update(&self, id: &str, changes: &UserUpdate) -> Result<()>;
}

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("User not found")]
    UserNotFound,

    /// Unknown email and wrong password share this variant on purpose.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account not verified")]
    Unverified,

    #[error("Invalid role for this user")]
    RoleMismatch,

    #[error("Insufficient privileges")]
    InsufficientPrivileges,

    #[error("{0}")]
    InvalidOrExpiredChallenge(&'static str),

    #[error("{0}")]
    InvalidToken(&'static str),

    #[error("Token expired")]
    TokenExpired,

    #[error("{0}")]
    MissingCredentials(&'static str),

    #[error("Email already registered")]
    EmailAlreadyExists,

    #[error("{0}")]
    BadRequest(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Notification error: {0}")]
    Notification(#[from] NotifyError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Unverified => StatusCode::FORBIDDEN,
            Self::RoleMismatch => StatusCode::FORBIDDEN,
            Self::InsufficientPrivileges => StatusCode::FORBIDDEN,
            Self::InvalidOrExpiredChallenge(_) => StatusCode::BAD_REQUEST,
            Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Self::TokenExpired => StatusCode::UNAUTHORIZED,
            Self::MissingCredentials(_) => StatusCode::UNAUTHORIZED,
            Self::EmailAlreadyExists => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Notification(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::UserNotFound => "not_found",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Unverified => "unverified",
            Self::RoleMismatch | Self::InsufficientPrivileges => "forbidden",
            Self::InvalidOrExpiredChallenge(_) => "invalid_challenge",
            Self::InvalidToken(_) => "invalid_token",
            Self::TokenExpired => "token_expired",
            Self::MissingCredentials(_) => "missing_credentials",
            Self::EmailAlreadyExists => "conflict",
            Self::BadRequest(_) => "bad_request",
            Self::RateLimited => "rate_limited",
            Self::Notification(_) | Self::Database(_) | Self::Internal(_) => "internal",
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }

    /// Detail safe to show to the client. Internal faults never leak.
    pub fn public_message(&self) -> String {
        match self {
            Self::Notification(_) => "Failed to send email".to_string(),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if self.is_internal() {
            tracing::error!(error = %self, "internal error while handling auth request");
        }

        (self.status_code(), Json(ErrorResponse::new(self.public_message()))).into_response()
    }
}
