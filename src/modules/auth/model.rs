use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

// Case-insensitive so " Admin" from a form still selects the admin role.
impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A pending one-time code together with its expiry.
///
/// Code and expiry travel as one value, so a record can never hold one
/// without the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Which challenge slot on the user record a code lives in.
///
/// Signup verification and login share the OTP slot; password reset has its
/// own slot so the two never clobber each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    Otp,
    PasswordReset,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub password_hash: String,
    pub roles: BTreeSet<Role>,
    pub is_verified: bool,
    pub otp: Option<Challenge>,
    pub reset: Option<Challenge>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn challenge(&self, kind: ChallengeKind) -> Option<&Challenge> {
        match kind {
            ChallengeKind::Otp => self.otp.as_ref(),
            ChallengeKind::PasswordReset => self.reset.as_ref(),
        }
    }

    /// Name used in email greetings.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldChange<T> {
    Set(T),
    Clear,
}

/// Field-level changes applied to a single user record in one atomic write.
///
/// Fields left as `None` are untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub password_hash: Option<String>,
    pub is_verified: Option<bool>,
    pub roles: Option<BTreeSet<Role>>,
    pub otp: Option<FieldChange<Challenge>>,
    pub reset: Option<FieldChange<Challenge>>,
}

impl UserUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    pub fn mark_verified(mut self) -> Self {
        self.is_verified = Some(true);
        self
    }

    pub fn roles(mut self, roles: BTreeSet<Role>) -> Self {
        self.roles = Some(roles);
        self
    }

    pub fn set_challenge(mut self, kind: ChallengeKind, challenge: Challenge) -> Self {
        *self.slot(kind) = Some(FieldChange::Set(challenge));
        self
    }

    pub fn clear_challenge(mut self, kind: ChallengeKind) -> Self {
        *self.slot(kind) = Some(FieldChange::Clear);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply(&self, user: &mut UserRecord) {
        if let Some(hash) = &self.password_hash {
            user.password_hash = hash.clone();
        }
        if let Some(verified) = self.is_verified {
            user.is_verified = verified;
        }
        if let Some(roles) = &self.roles {
            user.roles = roles.clone();
        }
        apply_change(&mut user.otp, &self.otp);
        apply_change(&mut user.reset, &self.reset);
    }

    fn slot(&mut self, kind: ChallengeKind) -> &mut Option<FieldChange<Challenge>> {
        match kind {
            ChallengeKind::Otp => &mut self.otp,
            ChallengeKind::PasswordReset => &mut self.reset,
        }
    }
}

fn apply_change<T: Clone>(field: &mut Option<T>, change: &Option<FieldChange<T>>) {
    match change {
        Some(FieldChange::Set(value)) => *field = Some(value.clone()),
        Some(FieldChange::Clear) => *field = None,
        None => {}
    }
}
