use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::modules::auth::interface::AuthError;
use crate::modules::auth::model::Role;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,        // user id
    pub roles: Vec<Role>,
    #[serde(rename = "type")]
    pub user_type: Role,    // role the session was opened for
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    // Missing subject decodes as empty so the caller can reject it as a bad payload
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(rename = "type", default)]
    pub user_type: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("token invalid: {0}")]
    Invalid(jsonwebtoken::errors::Error),

    #[error("token signing failed: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

impl TokenError {
    /// Maps a verification failure onto the caller-facing error, using
    /// `invalid_detail` for anything that is not a plain expiry.
    pub fn into_auth_error(self, invalid_detail: &'static str) -> AuthError {
        match self {
            Self::Expired => AuthError::TokenExpired,
            Self::Invalid(_) => AuthError::InvalidToken(invalid_detail),
            Self::Signing(e) => AuthError::Internal(format!("token signing failed: {}", e)),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Invalid(err),
        }
    }
}

/// Signing secret and lifetimes, fixed at startup.
#[derive(Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl: Duration::hours(1),
            refresh_ttl: Duration::days(7),
        }
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

/// Stateless HS256 token issuer and verifier.
///
/// Refresh tokens are not tracked server side. A leaked refresh token stays
/// usable until it expires or the secret is rotated.
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_token_duration: Duration,
    refresh_token_duration: Duration,
}

impl JwtService {
    pub fn new(config: &TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            access_token_duration: config.access_ttl,
            refresh_token_duration: config.refresh_ttl,
        }
    }

    pub fn issue_access(
        &self,
        subject: &str,
        roles: &[Role],
        user_type: Role,
        email: &str,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let exp = now + self.access_token_duration;

        let claims = AccessClaims {
            sub: subject.to_string(),
            roles: roles.to_vec(),
            user_type,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        self.sign(&claims)
    }

    pub fn issue_refresh(
        &self,
        subject: &str,
        roles: &[Role],
        user_type: Role,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let exp = now + self.refresh_token_duration;

        let claims = RefreshClaims {
            sub: subject.to_string(),
            roles: roles.to_vec(),
            user_type,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        self.sign(&claims)
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.verify(token)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        self.verify(token)
    }

    pub fn access_token_duration_secs(&self) -> i64 {
        self.access_token_duration.num_seconds()
    }

    pub fn refresh_token_duration_secs(&self) -> i64 {
        self.refresh_token_duration.num_seconds()
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        decode::<T>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::from)
    }
}
