use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::modules::auth::interface::AuthError;
use crate::modules::auth::model::Role;
use crate::services::jwt::{AccessClaims, JwtService};

/// Caller identity taken from a verified access token.
///
/// Inserted into request extensions by [`authenticate`]; handlers read it
/// through [`CurrentUser`] or `Option<Extension<Identity>>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub roles: Vec<Role>,
    pub user_type: Role,
    pub email: String,
}

impl From<AccessClaims> for Identity {
    fn from(claims: AccessClaims) -> Self {
        Self {
            subject: claims.sub,
            roles: claims.roles,
            user_type: claims.user_type,
            email: claims.email,
        }
    }
}

/// Authenticates every request that carries a bearer token.
///
/// - `OPTIONS` preflights pass untouched.
/// - No `Authorization` header: the request continues as a guest.
/// - A token that fails verification ends the request with 401.
pub async fn authenticate(
    State(jwt): State<Arc<JwtService>>,
    mut req: Request,
    next: Next,
) -> Response {
    if req.method() == Method::OPTIONS {
        return next.run(req).await;
    }

    let verified = match bearer_token(req.headers()) {
        Ok(Some(token)) => Some(jwt.verify_access(token)),
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(error = %err, "malformed authorization header");
            return err.into_response();
        }
    };

    match verified {
        Some(Ok(claims)) => {
            let identity = Identity::from(claims);
            tracing::debug!(
                user_id = %identity.subject,
                user_type = %identity.user_type,
                "request authenticated"
            );
            req.extensions_mut().insert(identity);
        }
        Some(Err(e)) => {
            let err = e.into_auth_error("Invalid access token");
            tracing::warn!(error = %err, "access token rejected");
            return err.into_response();
        }
        None => {
            tracing::debug!("no authorization header, continuing as guest");
        }
    }

    next.run(req).await
}

/// `Ok(None)` when no credential is present at all.
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| AuthError::InvalidToken("Invalid authorization header"))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or(AuthError::InvalidToken("Invalid authorization header"))?;

    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AuthError::InvalidToken("Invalid authorization header"));
    }

    Ok(Some(token.trim()))
}

/// Extractor for handlers that need a signed-in caller. Guests get 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AuthError::MissingCredentials("Not authenticated"))
    }
}

/// Roles accepted by a [`require_roles`] route layer.
#[derive(Debug, Clone)]
pub struct RoleGate {
    allowed: Arc<[Role]>,
}

impl RoleGate {
    pub fn new(allowed: impl Into<Arc<[Role]>>) -> Self {
        Self {
            allowed: allowed.into(),
        }
    }

    pub fn allowed(&self) -> &[Role] {
        &self.allowed
    }
}

/// 401 without an identity, 403 when none of its roles is allowed.
pub fn authorize<'a>(identity: Option<&'a Identity>, allowed: &[Role]) -> Result<&'a Identity, AuthError> {
    let identity = identity.ok_or(AuthError::MissingCredentials("Not authenticated"))?;

    if !identity.roles.iter().any(|role| allowed.contains(role)) {
        return Err(AuthError::InsufficientPrivileges);
    }

    Ok(identity)
}

/// Route layer enforcing a [`RoleGate`]. Must sit inside [`authenticate`].
///
/// ```ignore
/// Router::new()
///     .route("/admin/ping", get(ping))
///     .route_layer(middleware::from_fn_with_state(RoleGate::new([Role::Admin]), require_roles))
/// ```
pub async fn require_roles(State(gate): State<RoleGate>, req: Request, next: Next) -> Response {
    if let Err(err) = authorize(req.extensions().get::<Identity>(), gate.allowed()) {
        tracing::warn!(required_roles = ?gate.allowed(), error = %err, "role check failed");
        return err.into_response();
    }

    next.run(req).await
}
