use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use super::interface::{AuthError, Result, UserStore};
use super::model::{ChallengeKind, Role, UserRecord, UserUpdate};
use super::schema::UserSummary;
use crate::services::clock::Clock;
use crate::services::email::{otp_email, MailPurpose, Notifier};
use crate::services::hashing;
use crate::services::jwt::JwtService;
use crate::services::otp::{OtpConfig, OtpManager};

#[derive(Debug)]
pub enum SignupVerification {
    Verified(UserSummary),
    AlreadyVerified,
}

#[derive(Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

#[derive(Debug)]
pub struct AccessGrant {
    pub access_token: String,
    pub expires_in: i64,
}

/// Drives signup, login, refresh and password reset.
///
/// Holds no per-user state of its own. Everything that has to survive between
/// the two steps of a flow lives on the user record, so any instance can
/// serve any step.
pub struct AuthService {
    store: Arc<dyn UserStore>,
    notifier: Arc<dyn Notifier>,
    jwt: Arc<JwtService>,
    otp: OtpManager,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        notifier: Arc<dyn Notifier>,
        jwt: Arc<JwtService>,
        otp_config: OtpConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let otp = OtpManager::new(otp_config, store.clone(), clock.clone());
        Self {
            store,
            notifier,
            jwt,
            otp,
            clock,
        }
    }

    // =========================================================================
    // SIGNUP
    // =========================================================================

    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        full_name: Option<String>,
    ) -> Result<()> {
        let email = normalize_email(email);

        if self.store.find_by_email(&email).await?.is_some() {
            tracing::warn!(%email, "signup for already registered email");
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = hashing::hash_password(password)
            .map_err(|e| AuthError::Internal(format!("password hashing failed: {}", e)))?;

        let challenge = self.otp.new_challenge();
        let code = challenge.code.clone();

        let user = UserRecord {
            id: Uuid::new_v4().to_string(),
            email,
            full_name: full_name.filter(|name| !name.trim().is_empty()),
            password_hash,
            roles: BTreeSet::from([Role::User]),
            is_verified: false,
            otp: Some(challenge),
            reset: None,
            created_at: self.clock.now(),
        };

        self.store.insert(&user).await?;
        tracing::info!(user_id = %user.id, email = %user.email, "user registered, awaiting verification");

        self.deliver(&user, MailPurpose::VerifyEmail, &code).await
    }

    /// Confirms the signup code. Calling it again after success is a no-op
    /// that reports `AlreadyVerified`.
    pub async fn verify_signup(&self, email: &str, otp: &str) -> Result<SignupVerification> {
        let user = self.require_user(email).await?;

        if user.is_verified {
            return Ok(SignupVerification::AlreadyVerified);
        }

        self.otp.validate(&user, ChallengeKind::Otp, otp).inspect_err(|_| {
            tracing::warn!(user_id = %user.id, "signup verification with invalid or expired OTP");
        })?;

        self.store
            .update(
                &user.id,
                &UserUpdate::new()
                    .mark_verified()
                    .clear_challenge(ChallengeKind::Otp),
            )
            .await?;

        tracing::info!(user_id = %user.id, "email verified");
        Ok(SignupVerification::Verified(UserSummary {
            email: user.email,
            full_name: user.full_name,
            roles: user.roles.into_iter().collect(),
        }))
    }

    // =========================================================================
    // LOGIN
    // =========================================================================

    /// Step one: password, verification and role checks, then an OTP is
    /// mailed. No token is issued here.
    pub async fn login(&self, email: &str, password: &str, role: Role) -> Result<()> {
        let email = normalize_email(email);
        tracing::info!(%email, requested_role = %role, "login attempt");

        let Some(user) = self.store.find_by_email(&email).await? else {
            tracing::warn!(%email, "login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !hashing::verify_password(password, &user.password_hash) {
            tracing::warn!(user_id = %user.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_verified {
            tracing::warn!(user_id = %user.id, "login for unverified account");
            return Err(AuthError::Unverified);
        }

        if !user.has_role(role) {
            tracing::warn!(user_id = %user.id, requested_role = %role, "login role mismatch");
            return Err(AuthError::RoleMismatch);
        }

        let code = self.otp.issue(&user, ChallengeKind::Otp).await?;
        self.deliver(&user, MailPurpose::Login, &code).await?;

        tracing::info!(user_id = %user.id, "login OTP sent");
        Ok(())
    }

    /// Step two: checks the OTP, re-checks the role, consumes the code and
    /// mints a token pair scoped to `role`.
    pub async fn verify_login(&self, email: &str, otp: &str, role: Role) -> Result<TokenPair> {
        let user = self.require_user(email).await?;

        // The OTP slot holds the signup code until the email is confirmed
        if !user.is_verified {
            tracing::warn!(user_id = %user.id, "login verification for unverified account");
            return Err(AuthError::Unverified);
        }

        self.otp.validate(&user, ChallengeKind::Otp, otp).inspect_err(|_| {
            tracing::warn!(user_id = %user.id, "login verification with invalid or expired OTP");
        })?;

        // Roles may have changed since step one
        if !user.has_role(role) {
            tracing::warn!(user_id = %user.id, requested_role = %role, "role no longer held at OTP step");
            return Err(AuthError::RoleMismatch);
        }

        self.store
            .update(&user.id, &UserUpdate::new().clear_challenge(ChallengeKind::Otp))
            .await?;

        let roles = [role];
        let access_token = self
            .jwt
            .issue_access(&user.id, &roles, role, &user.email)
            .map_err(|e| e.into_auth_error("Invalid access token"))?;
        let refresh_token = self
            .jwt
            .issue_refresh(&user.id, &roles, role)
            .map_err(|e| e.into_auth_error("Invalid refresh token"))?;

        tracing::info!(user_id = %user.id, role = %role, "login complete, tokens issued");
        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.jwt.access_token_duration_secs(),
        })
    }

    /// Mails a fresh code into the OTP slot. The reset slot is never touched.
    ///
    /// Verified accounts only get a new code while a login started with the
    /// password is still pending, so the mailbox alone never yields a token.
    pub async fn resend_otp(&self, email: &str, role: Role) -> Result<()> {
        let user = self.require_user(email).await?;

        if user.is_verified {
            if !user.has_role(role) {
                tracing::warn!(user_id = %user.id, requested_role = %role, "OTP resend role mismatch");
                return Err(AuthError::RoleMismatch);
            }

            if user.otp.is_none() {
                tracing::warn!(user_id = %user.id, "OTP resend with no login in progress");
                return Err(AuthError::BadRequest("No login in progress".to_string()));
            }
        }

        let purpose = if user.is_verified {
            MailPurpose::Resend
        } else {
            MailPurpose::VerifyEmail
        };

        let code = self.otp.issue(&user, ChallengeKind::Otp).await?;
        self.deliver(&user, purpose, &code).await?;

        tracing::info!(user_id = %user.id, "OTP resent");
        Ok(())
    }

    // =========================================================================
    // REFRESH
    // =========================================================================

    /// New access token from a refresh token. Roles are re-read from the
    /// store, so a revoked role drops out here; already issued access tokens
    /// keep working until they expire.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AccessGrant> {
        let claims = self
            .jwt
            .verify_refresh(refresh_token)
            .map_err(|e| e.into_auth_error("Invalid refresh token"))
            .inspect_err(|e| tracing::warn!(error = %e, "refresh token rejected"))?;

        if claims.sub.is_empty() {
            return Err(AuthError::BadRequest("Invalid token payload".to_string()));
        }

        let user = self
            .store
            .find_by_id(&claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let roles: Vec<Role> = user.roles.iter().copied().collect();
        let access_token = self
            .jwt
            .issue_access(&user.id, &roles, claims.user_type, &user.email)
            .map_err(|e| e.into_auth_error("Invalid access token"))?;

        tracing::info!(user_id = %user.id, "access token refreshed");
        Ok(AccessGrant {
            access_token,
            expires_in: self.jwt.access_token_duration_secs(),
        })
    }

    // =========================================================================
    // PASSWORD RESET
    // =========================================================================

    pub async fn forgot_password(&self, email: &str, role: Role) -> Result<()> {
        let user = self.require_user_with_role(email, role).await?;

        let code = self.otp.issue(&user, ChallengeKind::PasswordReset).await?;
        self.deliver(&user, MailPurpose::PasswordReset, &code).await?;

        tracing::info!(user_id = %user.id, "password reset code sent");
        Ok(())
    }

    pub async fn reset_password(
        &self,
        email: &str,
        reset_code: &str,
        new_password: &str,
        confirm_password: &str,
        role: Role,
    ) -> Result<()> {
        let user = self.require_user_with_role(email, role).await?;

        self.otp
            .validate(&user, ChallengeKind::PasswordReset, reset_code)
            .inspect_err(|_| {
                tracing::warn!(user_id = %user.id, "password reset with invalid or expired code");
            })?;

        if new_password != confirm_password {
            return Err(AuthError::BadRequest("Passwords do not match".to_string()));
        }

        let password_hash = hashing::hash_password(new_password)
            .map_err(|e| AuthError::Internal(format!("password hashing failed: {}", e)))?;

        self.store
            .update(
                &user.id,
                &UserUpdate::new()
                    .password_hash(password_hash)
                    .clear_challenge(ChallengeKind::PasswordReset),
            )
            .await?;

        tracing::info!(user_id = %user.id, "password reset");
        Ok(())
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    async fn require_user(&self, email: &str) -> Result<UserRecord> {
        self.store
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn require_user_with_role(&self, email: &str, role: Role) -> Result<UserRecord> {
        let user = self.require_user(email).await?;

        if !user.has_role(role) {
            return Err(AuthError::UserNotFound);
        }

        Ok(user)
    }

    async fn deliver(&self, user: &UserRecord, purpose: MailPurpose, code: &str) -> Result<()> {
        let body = otp_email(purpose, user.display_name(), code, self.otp.ttl());

        self.notifier
            .send(&user.email, purpose.subject(), &body)
            .await
            .inspect_err(|e| {
                tracing::error!(user_id = %user.id, error = %e, "failed to deliver one-time code");
            })?;

        Ok(())
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
