// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session cookie contract.
//!
//! ```text
//! atelier_session=<token>; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=604800
//! ```

use axum::http::{header::COOKIE, HeaderMap, HeaderValue};

use super::AuthError;

/// Fixed cookie name carrying the session token.
pub const SESSION_COOKIE_NAME: &str = "atelier_session";

/// Absolute session lifetime: 7 days.
pub const SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

const COOKIE_ATTRIBUTES: &str = "HttpOnly; Secure; SameSite=Lax; Path=/";

const CLEARED_SESSION_COOKIE: &str =
    "atelier_session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";

/// `Set-Cookie` value installing a freshly issued token.
pub fn session_cookie(token: &str) -> Result<HeaderValue, AuthError> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE_NAME}={token}; {COOKIE_ATTRIBUTES}; Max-Age={SESSION_TTL_SECONDS}"
    ))
    .map_err(|e| AuthError::Internal(format!("invalid session cookie: {e}")))
}

/// `Set-Cookie` value that makes the browser drop the session cookie.
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static(CLEARED_SESSION_COOKIE)
}

/// Read the session token from the request's `Cookie` headers.
///
/// Empty values are treated as absent.
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE_NAME)
        .map(|(_, token)| token.trim().to_string())
        .filter(|token| !token.is_empty())
}
