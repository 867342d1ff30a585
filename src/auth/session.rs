// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Authority
//!
//! Owns session token issuance, validation, expiry and revocation, and
//! derives the [`Principal`] from a valid token.
//!
//! ## Lifecycle
//!
//! ```text
//! CREATED → VALID → { EXPIRED | REVOKED } → absent
//! ```
//!
//! - Sessions have an absolute lifetime of 7 days with no sliding renewal
//! - EXPIRED is decided at read time (`now < expires_at`); rows are not purged
//! - Only the SHA-256 digest of a token is persisted
//!
//! Resolution never mutates anything. Clearing the cookie after a failed
//! guard is the HTTP layer's job (see [`AuthError`]'s response).

use std::sync::Arc;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Duration;
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

use super::clock::Clock;
use super::cookie::SESSION_TTL_SECONDS;
use super::{AuthError, Principal, Role};
use crate::storage::{SessionStore, StoredSession, StoredUser};

/// Random bytes per token (384 bits).
const TOKEN_BYTES: usize = 48;

/// Diagnostic request metadata recorded on a session.
///
/// Never consulted for authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMetadata {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Generate an unguessable URL-safe token from the system CSPRNG.
pub fn generate_token() -> Result<String, AuthError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AuthError::Internal("system random source unavailable".to_string()))?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Storage key for a token: base64url(SHA-256(token)).
pub fn token_digest(token: &str) -> String {
    Base64UrlUnpadded::encode_string(&Sha256::digest(token.as_bytes()))
}

/// Issues, resolves and revokes sessions.
pub struct SessionAuthority {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SessionAuthority {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            ttl: Duration::seconds(SESSION_TTL_SECONDS),
        }
    }

    /// Create a session for an already-authenticated user and return its
    /// token. Storage failures propagate unretried.
    pub fn issue_session(
        &self,
        user: &StoredUser,
        metadata: SessionMetadata,
    ) -> Result<String, AuthError> {
        let token = generate_token()?;
        let now = self.clock.now();

        let session = StoredSession {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            token_digest: token_digest(&token),
            created_at: now,
            expires_at: now + self.ttl,
            user_agent: metadata.user_agent,
            ip_address: metadata.ip_address,
        };
        self.store.insert_session(&session)?;

        tracing::info!(
            user_id = %user.id,
            session_id = %session.id,
            expires_at = %session.expires_at,
            "Session issued"
        );
        Ok(token)
    }

    /// Resolve a token to its principal.
    ///
    /// Absent, unknown, revoked and expired tokens all yield `Ok(None)`.
    pub fn resolve_session(&self, token: Option<&str>) -> Result<Option<Principal>, AuthError> {
        let Some(token) = token else {
            return Ok(None);
        };
        let now = self.clock.now();

        match self.store.find_active_session(&token_digest(token), now)? {
            Some(record) => Ok(Some(Principal::from(&record.user))),
            None => {
                tracing::debug!("Session token did not resolve");
                Ok(None)
            }
        }
    }

    /// Delete the session for `token`; a no-op when absent.
    pub fn revoke_session(&self, token: &str) -> Result<(), AuthError> {
        if self.store.delete_session(&token_digest(token))? {
            tracing::info!("Session revoked");
        }
        Ok(())
    }

    /// Delete every session of a user (after a password change).
    pub fn revoke_all_for_user(&self, user_id: &str) -> Result<usize, AuthError> {
        let removed = self.store.delete_user_sessions(user_id)?;
        tracing::info!(user_id = %user_id, removed, "User sessions revoked");
        Ok(removed)
    }

    /// Resolve and check the role against `allowed`.
    pub fn require_role(
        &self,
        token: Option<&str>,
        allowed: &[Role],
    ) -> Result<Principal, AuthError> {
        let Some(principal) = self.resolve_session(token)? else {
            return Err(AuthError::Unauthenticated);
        };

        if !principal.has_any_role(allowed) {
            tracing::debug!(
                user_id = %principal.user_id,
                role = %principal.role,
                "Role not permitted for this route"
            );
            return Err(AuthError::Forbidden);
        }
        Ok(principal)
    }
}
