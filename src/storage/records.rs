// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted record shapes.
//!
//! Records are serialized as JSON values inside the embedded database. None
//! of these types are returned to API clients directly; handlers map them to
//! the response models in [`crate::models`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Role;

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredUser {
    /// Unique user identifier (UUID)
    pub id: String,
    /// Normalized login email (unique)
    pub email: String,
    /// bcrypt hash; never leaves the store except for verification
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    /// Owning consultant for clients
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consultant_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One authenticated browser/device login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredSession {
    /// Primary key; never exposed outside the server
    pub id: String,
    pub user_id: String,
    /// SHA-256 digest of the bearer token (base64url)
    pub token_digest: String,
    pub created_at: DateTime<Utc>,
    /// Absolute expiry; no sliding renewal
    pub expires_at: DateTime<Utc>,
    /// Diagnostic only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Diagnostic only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl StoredSession {
    /// A session is valid strictly before its expiry instant.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// A valid session joined with its owning user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub session: StoredSession,
    pub user: StoredUser,
}

/// Client invitation issued by a consultant or admin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredInvite {
    pub id: String,
    /// Email the invited client will register with
    pub email: String,
    /// URL-safe acceptance token (unique)
    pub token: String,
    pub role: Role,
    /// Consultant whose book the client joins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consultant_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accepted: bool,
}

impl StoredInvite {
    /// Not yet accepted and strictly before expiry.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.accepted && now < self.expires_at
    }
}

/// Pending password reset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredPasswordReset {
    pub id: String,
    pub user_id: String,
    /// SHA-256 digest of the reset token (base64url)
    pub token_digest: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// How a new user's role is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleAssignment {
    /// Self-registration: `Admin` when no user exists yet, `Consultant`
    /// otherwise. Decided inside the insert transaction.
    Bootstrap,
    /// Role fixed by the caller (invite acceptance).
    Fixed(Role),
}

impl RoleAssignment {
    /// Resolve against the number of users present when the insert commits.
    pub fn resolve(self, existing_users: u64) -> Role {
        match self {
            RoleAssignment::Bootstrap if existing_users == 0 => Role::Admin,
            RoleAssignment::Bootstrap => Role::Consultant,
            RoleAssignment::Fixed(role) => role,
        }
    }
}

/// Input for user creation.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: RoleAssignment,
    pub consultant_id: Option<String>,
}

impl NewUser {
    /// Materialize the record once the role is known.
    pub fn into_stored(self, role: Role, now: DateTime<Utc>) -> StoredUser {
        StoredUser {
            id: uuid::Uuid::new_v4().to_string(),
            email: self.email,
            password_hash: self.password_hash,
            name: self.name,
            role,
            consultant_id: self.consultant_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Data supplied by the invitee when accepting.
#[derive(Debug, Clone)]
pub struct AcceptInvite {
    pub name: String,
    pub password_hash: String,
}
