use chrono::Duration;
use std::env;
use std::str::FromStr;

use crate::services::email::EmailConfig;
use crate::services::jwt::TokenConfig;
use crate::services::otp::OtpConfig;

/// Environment configuration
/// Loads and validates environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub access_token_expires: i64,
    pub refresh_token_expires: i64,
    pub otp_expiry_seconds: i64,
    pub otp_length: usize,
    pub database_url: Option<String>,
    pub email_api_url: Option<String>,
    pub email_api_key: Option<String>,
    pub email_sender: String,
    pub bind_addr: String,
    pub otp_rate_limit_burst: u32,
    pub otp_rate_limit_per_minute: u32,
    pub refresh_cookie_secure: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unset and blank values take the
    /// default; values that are set but malformed are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or_else(|| "JWT_SECRET must be set".to_string())?;

        let access_token_expires = parse_or(&get, "ACCESS_TOKEN_EXPIRES", 3600)?;
        let refresh_token_expires = parse_or(&get, "REFRESH_TOKEN_EXPIRES", 604_800)?;
        let otp_expiry_seconds = parse_or(&get, "OTP_EXPIRY_SECONDS", 600)?;
        let otp_length = parse_or(&get, "OTP_LENGTH", 6)?;

        if access_token_expires <= 0 || refresh_token_expires <= 0 || otp_expiry_seconds <= 0 {
            return Err("token and OTP lifetimes must be positive".to_string());
        }
        if !(4..=10).contains(&otp_length) {
            return Err("OTP_LENGTH must be between 4 and 10".to_string());
        }

        Ok(Self {
            jwt_secret,
            access_token_expires,
            refresh_token_expires,
            otp_expiry_seconds,
            otp_length,
            database_url: get("DATABASE_URL"),
            email_api_url: get("EMAIL_API_URL"),
            email_api_key: get("EMAIL_API_KEY"),
            email_sender: get("EMAIL_SENDER").unwrap_or_else(|| "no-reply@localhost".to_string()),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            otp_rate_limit_burst: parse_or(&get, "OTP_RATE_LIMIT_BURST", 10)?,
            otp_rate_limit_per_minute: parse_or(&get, "OTP_RATE_LIMIT_PER_MINUTE", 1)?,
            refresh_cookie_secure: parse_or(&get, "REFRESH_COOKIE_SECURE", true)?,
        })
    }

    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            secret: self.jwt_secret.clone(),
            access_ttl: Duration::seconds(self.access_token_expires),
            refresh_ttl: Duration::seconds(self.refresh_token_expires),
        }
    }

    pub fn otp_config(&self) -> OtpConfig {
        OtpConfig {
            length: self.otp_length,
            ttl: Duration::seconds(self.otp_expiry_seconds),
        }
    }

    /// `None` when no mail API is configured.
    pub fn email_config(&self) -> Option<EmailConfig> {
        let api_url = self.email_api_url.clone()?;
        Some(EmailConfig {
            api_url,
            api_key: self.email_api_key.clone(),
            sender: self.email_sender.clone(),
            timeout: std::time::Duration::from_secs(10),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("{} is invalid: {}", key, e)),
        None => Ok(default),
    }
}
