// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::cookie::clear_session_cookie;
use crate::storage::StorageError;

/// Authentication error type.
///
/// `Unauthenticated` and `Forbidden` render the same response so a caller
/// cannot tell "no session" from "wrong role". The difference only shows up
/// in server logs.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No resolvable principal (missing, unknown, revoked or expired token)
    #[error("Authentication required")]
    Unauthenticated,

    /// Principal resolved but its role is not in the allowed set
    #[error("Authentication required")]
    Forbidden,

    /// Storage failure while reading or writing sessions
    #[error("Session storage failure: {0}")]
    Storage(#[from] StorageError),

    /// Token generation, hashing or other internal failure
    #[error("Internal authentication error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated | AuthError::Forbidden => "unauthenticated",
            AuthError::Storage(_) | AuthError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Unauthenticated | AuthError::Forbidden => StatusCode::UNAUTHORIZED,
            AuthError::Storage(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the response should also drop the session cookie.
    pub fn clears_session(&self) -> bool {
        matches!(self, AuthError::Unauthenticated | AuthError::Forbidden)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Authentication failed internally");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(AuthErrorBody {
            error: message,
            error_code: self.error_code().to_string(),
        });
        let mut response = (status, body).into_response();
        if self.clears_session() {
            response
                .headers_mut()
                .insert(SET_COOKIE, clear_session_cookie());
        }
        response
    }
}
