// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Store traits consumed by the session authority and account flows.
//!
//! The database handle is constructed once at startup and injected behind
//! these traits, so tests can substitute [`super::InMemoryStore`].
//!
//! Every write is a single atomic transaction. Methods that depend on time
//! take `now` from the caller instead of reading a clock themselves.

use chrono::{DateTime, Utc};

use crate::auth::Role;

use super::error::StorageResult;
use super::ownership::ClientScope;
use super::records::{
    AcceptInvite, NewUser, SessionRecord, StoredInvite, StoredPasswordReset, StoredSession,
    StoredUser,
};

/// User records. The sole writer of password hashes.
pub trait UserStore: Send + Sync {
    /// Insert a user. Fails with `StorageError::Conflict` when the email is
    /// taken. A [`super::RoleAssignment::Bootstrap`] role is resolved inside
    /// the same transaction as the insert.
    fn create_user(&self, user: NewUser, now: DateTime<Utc>) -> StorageResult<StoredUser>;

    fn find_user_by_email(&self, email: &str) -> StorageResult<Option<StoredUser>>;

    fn find_user_by_id(&self, user_id: &str) -> StorageResult<Option<StoredUser>>;

    /// Clients visible under `scope`, newest first.
    fn list_clients(&self, scope: &ClientScope) -> StorageResult<Vec<StoredUser>>;

    /// Users whose role is in `roles`, oldest first.
    fn list_users_with_roles(&self, roles: &[Role]) -> StorageResult<Vec<StoredUser>>;

    /// Cheap read probe used by the readiness endpoint.
    fn health_check(&self) -> StorageResult<()>;
}

/// Session rows, keyed by token digest.
pub trait SessionStore: Send + Sync {
    /// Fails with `StorageError::Conflict` if the digest is already present.
    fn insert_session(&self, session: &StoredSession) -> StorageResult<()>;

    /// Point lookup joined with the owning user, filtered by
    /// `now < expires_at`. Never writes.
    fn find_active_session(
        &self,
        token_digest: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<SessionRecord>>;

    /// Returns whether a row was removed.
    fn delete_session(&self, token_digest: &str) -> StorageResult<bool>;

    /// Remove every session of a user; returns how many were removed.
    fn delete_user_sessions(&self, user_id: &str) -> StorageResult<usize>;
}

/// Client invitations.
pub trait InviteStore: Send + Sync {
    fn insert_invite(&self, invite: &StoredInvite) -> StorageResult<()>;

    /// Invite with this token that is neither accepted nor expired.
    fn find_usable_invite(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<StoredInvite>>;

    /// Create the invited client and mark the invite accepted in one
    /// transaction. `Ok(None)` when the invite is unknown, accepted or
    /// expired; `StorageError::Conflict` when the email is already taken.
    fn accept_invite(
        &self,
        token: &str,
        acceptance: AcceptInvite,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<StoredUser>>;

    /// Invites created by `user_id`, newest first.
    fn list_invites_by_creator(&self, user_id: &str) -> StorageResult<Vec<StoredInvite>>;

    /// Invites inside `scope`, newest first.
    fn list_invites(&self, scope: &ClientScope) -> StorageResult<Vec<StoredInvite>>;

    /// Delete accepted or expired invites; returns how many were removed.
    fn purge_stale_invites(&self, now: DateTime<Utc>) -> StorageResult<usize>;
}

/// Password reset tokens.
pub trait ResetStore: Send + Sync {
    fn insert_reset(&self, reset: &StoredPasswordReset) -> StorageResult<()>;

    /// Replace the user's password hash and delete the reset row in one
    /// transaction. Returns the user id, or `None` if the token is unknown
    /// or expired.
    fn consume_reset(
        &self,
        token_digest: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<String>>;
}

/// Every store capability, implemented by both backends.
pub trait AuthStore: UserStore + SessionStore + InviteStore + ResetStore {}

impl<T: UserStore + SessionStore + InviteStore + ResetStore> AuthStore for T {}
