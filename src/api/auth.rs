// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registration, login, logout, session introspection and password reset.
//!
//! Handlers that sign a user in answer with the session cookie in
//! `Set-Cookie`; the token never appears in a response body.

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    accounts::SignedIn,
    auth::{
        clear_session_cookie, session_cookie, session_token_from_headers, ClientMetadata,
        OptionalAuth, Role,
    },
    error::ApiError,
    models::{
        AuthResponse, LoginRequest, MessageResponse, PasswordResetConfirmRequest,
        PasswordResetRequest, RegisterRequest, SessionResponse,
    },
    state::AppState,
};

/// Same answer whether or not the account exists.
const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for this email, a reset link has been sent.";

/// Body plus the cookie for a freshly issued session.
pub(crate) fn signed_in_response(
    status: StatusCode,
    signed_in: SignedIn,
    message: &str,
) -> Result<Response, ApiError> {
    let cookie = session_cookie(&signed_in.token).map_err(|e| {
        tracing::error!(error = %e, "Failed to build session cookie");
        ApiError::internal()
    })?;
    let body = AuthResponse {
        message: message.to_string(),
        role: signed_in.user.role,
    };
    Ok((status, [(SET_COOKIE, cookie)], Json(body)).into_response())
}

/// Register a new account.
///
/// The first account ever registered becomes ADMIN; every later one
/// becomes CONSULTANT.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    tag = "Auth",
    responses(
        (status = 201, description = "Registered and signed in", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ClientMetadata(metadata): ClientMetadata,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let signed_in = state.accounts.register(request, metadata).await?;
    let message = match signed_in.user.role {
        Role::Admin => "Admin registered",
        _ => "Consultant registered",
    };
    signed_in_response(StatusCode::CREATED, signed_in, message)
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid email or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ClientMetadata(metadata): ClientMetadata,
    Json(request): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let signed_in = state.accounts.authenticate(request, metadata).await?;
    signed_in_response(StatusCode::OK, signed_in, "Signed in")
}

/// Revoke the current session (if any) and clear the cookie.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "Auth",
    responses((status = 204, description = "Signed out"))
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = session_token_from_headers(&headers) {
        state.sessions.revoke_session(&token).map_err(|e| {
            tracing::error!(error = %e, "Failed to revoke session");
            ApiError::internal()
        })?;
    }
    Ok((StatusCode::NO_CONTENT, [(SET_COOKIE, clear_session_cookie())]))
}

/// The principal behind the current cookie, or `null`.
#[utoipa::path(
    get,
    path = "/v1/auth/session",
    tag = "Auth",
    responses((status = 200, description = "Current session", body = SessionResponse))
)]
pub async fn current_session(OptionalAuth(principal): OptionalAuth) -> Json<SessionResponse> {
    Json(SessionResponse { principal })
}

#[utoipa::path(
    post,
    path = "/v1/auth/password-reset/request",
    request_body = PasswordResetRequest,
    tag = "Auth",
    responses((status = 200, description = "Request accepted", body = MessageResponse))
)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.accounts.request_password_reset(request)?;
    Ok(Json(MessageResponse::new(RESET_REQUESTED_MESSAGE)))
}

/// Set a new password. Every session of the account is revoked.
#[utoipa::path(
    post,
    path = "/v1/auth/password-reset/confirm",
    request_body = PasswordResetConfirmRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Invalid or expired reset link")
    )
)]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetConfirmRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.accounts.confirm_password_reset(request).await?;
    Ok(Json(MessageResponse::new("Password updated")))
}
