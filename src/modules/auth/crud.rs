use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, MySql, Pool, QueryBuilder};
use std::collections::BTreeSet;

use super::interface::{AuthError, Result, UserStore};
use super::model::{Challenge, FieldChange, Role, UserRecord, UserUpdate};

/// Row shape of the `users` table. Roles are stored comma-separated.
#[derive(Debug, Clone, FromRow)]
struct UserRow {
    id: String,
    email: String,
    full_name: Option<String>,
    password_hash: String,
    roles: String,
    is_verified: bool,
    otp_code: Option<String>,
    otp_expiry: Option<DateTime<Utc>>,
    reset_token: Option<String>,
    reset_token_expiry: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = AuthError;

    fn try_from(row: UserRow) -> Result<Self> {
        let roles = row
            .roles
            .split(',')
            .filter(|r| !r.trim().is_empty())
            .map(|r| r.parse::<Role>())
            .collect::<std::result::Result<BTreeSet<_>, _>>()
            .map_err(|e| AuthError::Internal(format!("user {} has bad roles: {}", row.id, e)))?;

        Ok(Self {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            password_hash: row.password_hash,
            roles,
            is_verified: row.is_verified,
            otp: pair(row.otp_code, row.otp_expiry),
            reset: pair(row.reset_token, row.reset_token_expiry),
            created_at: row.created_at,
        })
    }
}

// A half-written slot (code without expiry or the reverse) is treated as empty
fn pair(code: Option<String>, expiry: Option<DateTime<Utc>>) -> Option<Challenge> {
    match (code, expiry) {
        (Some(code), Some(expires_at)) => Some(Challenge { code, expires_at }),
        _ => None,
    }
}

fn join_roles(roles: &BTreeSet<Role>) -> String {
    roles.iter().map(Role::as_str).collect::<Vec<_>>().join(",")
}

/// MySQL-backed user store.
pub struct MySqlUserStore {
    pool: Pool<MySql>,
}

impl MySqlUserStore {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for MySqlUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?")
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn insert(&self, user: &UserRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, full_name, password_hash, roles, is_verified,
                               otp_code, otp_expiry, reset_token, reset_token_expiry, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(user.email.to_lowercase())
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(join_roles(&user.roles))
        .bind(user.is_verified)
        .bind(user.otp.as_ref().map(|c| c.code.clone()))
        .bind(user.otp.as_ref().map(|c| c.expires_at))
        .bind(user.reset.as_ref().map(|c| c.code.clone()))
        .bind(user.reset.as_ref().map(|c| c.expires_at))
        .bind(user.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AuthError::EmailAlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, id: &str, changes: &UserUpdate) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        // One UPDATE statement, so all fields change together
        let mut query = QueryBuilder::<MySql>::new("UPDATE users SET ");
        let mut set = query.separated(", ");

        if let Some(hash) = &changes.password_hash {
            set.push("password_hash = ").push_bind_unseparated(hash.clone());
        }
        if let Some(verified) = changes.is_verified {
            set.push("is_verified = ").push_bind_unseparated(verified);
        }
        if let Some(roles) = &changes.roles {
            set.push("roles = ").push_bind_unseparated(join_roles(roles));
        }
        for (change, code_col, expiry_col) in [
            (&changes.otp, "otp_code", "otp_expiry"),
            (&changes.reset, "reset_token", "reset_token_expiry"),
        ] {
            match change {
                Some(FieldChange::Set(challenge)) => {
                    set.push(format!("{} = ", code_col))
                        .push_bind_unseparated(challenge.code.clone());
                    set.push(format!("{} = ", expiry_col))
                        .push_bind_unseparated(challenge.expires_at);
                }
                Some(FieldChange::Clear) => {
                    set.push(format!("{} = NULL", code_col));
                    set.push(format!("{} = NULL", expiry_col));
                }
                None => {}
            }
        }

        query.push(" WHERE id = ").push_bind(id.to_string());

        let result = query.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            // MySQL reports 0 for unchanged rows as well; confirm the row exists
            if self.find_by_id(id).await?.is_none() {
                return Err(AuthError::UserNotFound);
            }
        }

        Ok(())
    }
}
