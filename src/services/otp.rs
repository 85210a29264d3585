use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::sync::Arc;

use crate::modules::auth::interface::{AuthError, Result, UserStore};
use crate::modules::auth::model::{Challenge, ChallengeKind, UserRecord, UserUpdate};
use crate::services::clock::Clock;

#[derive(Debug, Clone)]
pub struct OtpConfig {
    pub length: usize,
    pub ttl: Duration,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            length: 6,
            ttl: Duration::minutes(10),
        }
    }
}

/// Issues and checks the one-time codes kept on user records.
///
/// Both the login/signup OTP and the password reset code go through here;
/// `ChallengeKind` picks the slot, and issuing into one slot never touches
/// the other.
pub struct OtpManager {
    config: OtpConfig,
    store: Arc<dyn UserStore>,
    clock: Arc<dyn Clock>,
}

impl OtpManager {
    pub fn new(config: OtpConfig, store: Arc<dyn UserStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            store,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Builds a fresh challenge without persisting it, for records that are
    /// about to be inserted.
    pub fn new_challenge(&self) -> Challenge {
        Challenge {
            code: generate_code(self.config.length),
            expires_at: self.clock.now() + self.config.ttl,
        }
    }

    /// Generates a code, stores it on the user (replacing any code in the same
    /// slot) and returns it for delivery.
    pub async fn issue(&self, user: &UserRecord, kind: ChallengeKind) -> Result<String> {
        let challenge = self.new_challenge();
        let code = challenge.code.clone();

        self.store
            .update(&user.id, &UserUpdate::new().set_challenge(kind, challenge))
            .await?;

        tracing::debug!(user_id = %user.id, ?kind, "issued one-time code");
        Ok(code)
    }

    /// Checks `submitted` against the user's code in `kind`. Does not clear
    /// it; the caller clears the slot together with whatever the code gates.
    pub fn validate(&self, user: &UserRecord, kind: ChallengeKind, submitted: &str) -> Result<()> {
        check_challenge(user.challenge(kind), submitted, self.clock.now())
            .map_err(|_| AuthError::InvalidOrExpiredChallenge(invalid_detail(kind)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeFailure {
    Missing,
    Mismatch,
    Expired,
}

/// Pure check of a stored challenge. A code is still good at the exact
/// expiry instant and rejected one second after.
pub fn check_challenge(
    challenge: Option<&Challenge>,
    submitted: &str,
    now: DateTime<Utc>,
) -> std::result::Result<(), ChallengeFailure> {
    let challenge = challenge.ok_or(ChallengeFailure::Missing)?;

    if !constant_time_eq(challenge.code.as_bytes(), submitted.as_bytes()) {
        return Err(ChallengeFailure::Mismatch);
    }

    if now > challenge.expires_at {
        return Err(ChallengeFailure::Expired);
    }

    Ok(())
}

/// Numeric code, each digit drawn uniformly from 0-9.
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

fn invalid_detail(kind: ChallengeKind) -> &'static str {
    match kind {
        ChallengeKind::Otp => "Invalid or expired OTP",
        ChallengeKind::PasswordReset => "Invalid or expired reset token",
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}
