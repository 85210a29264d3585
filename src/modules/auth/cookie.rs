use axum::http::{
    header::{self, InvalidHeaderValue},
    HeaderMap, HeaderValue,
};

pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// `Set-Cookie` value carrying the refresh token.
///
/// `SameSite=None` lets a frontend on another origin call `/auth/refresh`;
/// browsers only honour that together with `Secure`.
pub fn refresh_cookie(token: &str, max_age_secs: i64, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{REFRESH_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=None; Max-Age={max_age_secs}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub fn refresh_token_from_cookies(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == REFRESH_COOKIE_NAME)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
