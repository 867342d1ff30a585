// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for session-authenticated principals.
//!
//! Use the `Auth` extractor in handlers to require any authenticated role,
//! or a [`RequireRole`] alias to restrict the role set:
//!
//! ```rust,ignore
//! async fn list_invites(RequireRole(principal, _): StaffOnly) -> impl IntoResponse {
//!     // principal.role is ADMIN or CONSULTANT
//! }
//! ```
//!
//! Rejections are [`AuthError`] responses, which clear the session cookie.

use std::convert::Infallible;
use std::marker::PhantomData;

use axum::{
    extract::FromRequestParts,
    http::{header::USER_AGENT, request::Parts},
};

use super::cookie::session_token_from_headers;
use super::session::SessionMetadata;
use super::{AuthError, Principal, Role};
use crate::state::AppState;

/// Header carrying the client address chain when behind a proxy.
const X_FORWARDED_FOR: &str = "x-forwarded-for";

async fn resolve_required(
    parts: &mut Parts,
    state: &AppState,
    allowed: &[Role],
) -> Result<Principal, AuthError> {
    // Reuse a principal resolved earlier in this request
    if let Some(principal) = parts.extensions.get::<Principal>().cloned() {
        return if principal.has_any_role(allowed) {
            Ok(principal)
        } else {
            Err(AuthError::Forbidden)
        };
    }

    let token = session_token_from_headers(&parts.headers);
    let principal = state.sessions.require_role(token.as_deref(), allowed)?;
    parts.extensions.insert(principal.clone());
    Ok(principal)
}

/// Extractor for any authenticated principal.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(Auth(principal): Auth) -> Json<Principal> {
///     Json(principal)
/// }
/// ```
pub struct Auth(pub Principal);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve_required(parts, state, Role::ALL).await.map(Auth)
    }
}

/// A fixed set of admitted roles.
pub trait RolePolicy {
    const ALLOWED: &'static [Role];
}

/// Admits ADMIN only.
pub struct Admins;

impl RolePolicy for Admins {
    const ALLOWED: &'static [Role] = &[Role::Admin];
}

/// Admits ADMIN and CONSULTANT.
pub struct Staff;

impl RolePolicy for Staff {
    const ALLOWED: &'static [Role] = Role::STAFF;
}

/// Extractor that requires the principal's role to be in `P::ALLOWED`.
pub struct RequireRole<P: RolePolicy>(pub Principal, pub PhantomData<fn() -> P>);

impl<P: RolePolicy> FromRequestParts<AppState> for RequireRole<P> {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let principal = resolve_required(parts, state, P::ALLOWED).await?;
        Ok(RequireRole(principal, PhantomData))
    }
}

/// Extractor that requires admin role.
pub type AdminOnly = RequireRole<Admins>;

/// Extractor that requires admin or consultant role.
pub type StaffOnly = RequireRole<Staff>;

/// Optional authentication extractor.
///
/// Yields `None` when no valid session is present. Storage failures still
/// reject with a 500.
pub struct OptionalAuth(pub Option<Principal>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>().cloned() {
            return Ok(OptionalAuth(Some(principal)));
        }
        let token = session_token_from_headers(&parts.headers);
        Ok(OptionalAuth(state.sessions.resolve_session(token.as_deref())?))
    }
}

/// Diagnostic request metadata to record on a new session.
pub struct ClientMetadata(pub SessionMetadata);

impl<S: Send + Sync> FromRequestParts<S> for ClientMetadata {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let ip_address = header(X_FORWARDED_FOR).and_then(|chain| {
            chain
                .split(',')
                .next()
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .map(str::to_string)
        });

        Ok(ClientMetadata(SessionMetadata {
            user_agent: header(USER_AGENT.as_str()),
            ip_address,
        }))
    }
}
