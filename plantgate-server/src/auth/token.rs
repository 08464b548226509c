//! Access-token extraction and inspection

use crate::config::AuthConfig;
use crate::core::AuthError;
use axum::http::{HeaderMap, header};
use axum_extra::extract::CookieJar;
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

/// Pulls the access token off an inbound request
///
/// Looks at `Authorization: Bearer <token>` first. Without that header, and
/// when enabled, falls back to the configured access-token cookie.
#[derive(Debug, Clone)]
pub struct TokenExtractor {
    cookie_name: Option<String>,
}

impl TokenExtractor {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            cookie_name: config
                .cookie_fallback
                .then(|| config.access_token_cookie.clone()),
        }
    }

    /// Header-only extraction
    pub fn header_only() -> Self {
        Self { cookie_name: None }
    }

    /// A present but malformed Authorization header is rejected outright
    pub fn extract(&self, headers: &HeaderMap) -> Result<String, AuthError> {
        if let Some(value) = headers.get(header::AUTHORIZATION) {
            let raw = value.to_str().map_err(|_| AuthError::MissingToken)?;
            return parse_bearer(raw)
                .map(str::to_string)
                .ok_or(AuthError::MissingToken);
        }

        if let Some(name) = &self.cookie_name {
            if let Some(token) = cookie_value(headers, name) {
                debug!("Access token taken from cookie {}", name);
                return Ok(token);
            }
        }

        Err(AuthError::MissingToken)
    }
}

fn parse_bearer(raw: &str) -> Option<&str> {
    let (scheme, token) = raw.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: Option<i64>,
}

/// Expiry of a JWT access token, read from its payload without verification
///
/// Opaque tokens and payloads without `exp` yield `None`; the identity store
/// stays the authority on validity.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claim: ExpiryClaim = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claim.exp?, 0)
}

pub fn is_expired(token: &str, now: DateTime<Utc>) -> bool {
    token_expiry(token).is_some_and(|exp| exp <= now)
}

#[cfg(test)]
pub(crate) fn fake_jwt(exp: i64) -> String {
    let header = general_purpose::URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload =
        general_purpose::URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"u1","exp":{}}}"#, exp));
    format!("{}.{}.signature", header, payload)
}
