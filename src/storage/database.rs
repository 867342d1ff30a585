// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded account database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized StoredUser
//! - `user_emails`: normalized email → user_id (unique index)
//! - `sessions`: token digest → serialized StoredSession
//! - `invites`: invite token → serialized StoredInvite
//! - `password_resets`: token digest → serialized StoredPasswordReset
//!
//! redb admits a single write transaction at a time, so every
//! check-then-insert below (email uniqueness, first-user role) is atomic.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
};
use serde::de::DeserializeOwned;

use super::error::{StorageError, StorageResult};
use super::ownership::ClientScope;
use super::records::{
    AcceptInvite, NewUser, RoleAssignment, SessionRecord, StoredInvite, StoredPasswordReset,
    StoredSession, StoredUser,
};
use super::repository::{InviteStore, ResetStore, SessionStore, UserStore};
use crate::auth::Role;

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: user_id → serialized StoredUser (JSON bytes).
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Unique index: normalized email → user_id.
const USER_EMAILS: TableDefinition<&str, &str> = TableDefinition::new("user_emails");

/// Sessions: token digest → serialized StoredSession.
const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

/// Invites: acceptance token → serialized StoredInvite.
const INVITES: TableDefinition<&str, &[u8]> = TableDefinition::new("invites");

/// Password resets: token digest → serialized StoredPasswordReset.
const PASSWORD_RESETS: TableDefinition<&str, &[u8]> = TableDefinition::new("password_resets");

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

fn newest_first<T, F>(items: &mut [T], created_at: F)
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
}

// =============================================================================
// AuthDatabase
// =============================================================================

/// Embedded ACID database holding users, sessions, invites and resets.
pub struct AuthDatabase {
    db: Database,
}

impl AuthDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USER_EMAILS)?;
            let _ = write_txn.open_table(SESSIONS)?;
            let _ = write_txn.open_table(INVITES)?;
            let _ = write_txn.open_table(PASSWORD_RESETS)?;
        }
        write_txn.commit()?;

        tracing::info!(path = %path.display(), "Account database opened");
        Ok(Self { db })
    }

    fn read_user(&self, user_id: &str) -> StorageResult<Option<StoredUser>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(user_id)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    fn scan_invites<F>(&self, keep: F) -> StorageResult<Vec<StoredInvite>>
    where
        F: Fn(&StoredInvite) -> bool,
    {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(INVITES)?;
        let mut invites = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let invite: StoredInvite = decode(value.value())?;
            if keep(&invite) {
                invites.push(invite);
            }
        }
        newest_first(&mut invites, |i| i.created_at);
        Ok(invites)
    }
}

// =============================================================================
// Users
// =============================================================================

impl UserStore for AuthDatabase {
    fn create_user(&self, user: NewUser, now: DateTime<Utc>) -> StorageResult<StoredUser> {
        let write_txn = self.db.begin_write()?;
        let stored = {
            let mut users = write_txn.open_table(USERS)?;
            let mut emails = write_txn.open_table(USER_EMAILS)?;

            if emails.get(user.email.as_str())?.is_some() {
                return Err(StorageError::Conflict(format!("User with email {}", user.email)));
            }

            // Count and insert under the same write lock
            let role = user.role.resolve(users.len()?);
            let stored = user.into_stored(role, now);
            let json = serde_json::to_vec(&stored)?;
            users.insert(stored.id.as_str(), json.as_slice())?;
            emails.insert(stored.email.as_str(), stored.id.as_str())?;
            stored
        };
        write_txn.commit()?;
        Ok(stored)
    }

    fn find_user_by_email(&self, email: &str) -> StorageResult<Option<StoredUser>> {
        let user_id = {
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(USER_EMAILS)?;
            match table.get(email)? {
                Some(v) => v.value().to_string(),
                None => return Ok(None),
            }
        };
        self.read_user(&user_id)
    }

    fn find_user_by_id(&self, user_id: &str) -> StorageResult<Option<StoredUser>> {
        self.read_user(user_id)
    }

    fn list_clients(&self, scope: &ClientScope) -> StorageResult<Vec<StoredUser>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        let mut clients = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let user: StoredUser = decode(value.value())?;
            if user.role == Role::Client && scope.admits(&user) {
                clients.push(user);
            }
        }
        newest_first(&mut clients, |u| u.created_at);
        Ok(clients)
    }

    fn list_users_with_roles(&self, roles: &[Role]) -> StorageResult<Vec<StoredUser>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        let mut users = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let user: StoredUser = decode(value.value())?;
            if user.role.is_in(roles) {
                users.push(user);
            }
        }
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    fn health_check(&self) -> StorageResult<()> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        table.len()?;
        Ok(())
    }
}

// =============================================================================
// Sessions
// =============================================================================

impl SessionStore for AuthDatabase {
    fn insert_session(&self, session: &StoredSession) -> StorageResult<()> {
        let json = serde_json::to_vec(session)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSIONS)?;
            if table.get(session.token_digest.as_str())?.is_some() {
                return Err(StorageError::Conflict("Session token".to_string()));
            }
            table.insert(session.token_digest.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn find_active_session(
        &self,
        token_digest: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<SessionRecord>> {
        let read_txn = self.db.begin_read()?;
        let sessions = read_txn.open_table(SESSIONS)?;
        let session: StoredSession = match sessions.get(token_digest)? {
            Some(value) => decode(value.value())?,
            None => return Ok(None),
        };
        if !session.is_valid_at(now) {
            return Ok(None);
        }

        let users = read_txn.open_table(USERS)?;
        let user: StoredUser = match users.get(session.user_id.as_str())? {
            Some(value) => decode(value.value())?,
            None => return Ok(None),
        };

        Ok(Some(SessionRecord { session, user }))
    }

    fn delete_session(&self, token_digest: &str) -> StorageResult<bool> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(SESSIONS)?;
            let removed = table.remove(token_digest)?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(removed)
    }

    fn delete_user_sessions(&self, user_id: &str) -> StorageResult<usize> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(SESSIONS)?;

            let mut digests = Vec::new();
            for entry in table.iter()? {
                let (key, value) = entry?;
                let session: StoredSession = decode(value.value())?;
                if session.user_id == user_id {
                    digests.push(key.value().to_string());
                }
            }

            for digest in &digests {
                table.remove(digest.as_str())?;
            }
            digests.len()
        };
        write_txn.commit()?;
        Ok(removed)
    }
}

// =============================================================================
// Invites
// =============================================================================

impl InviteStore for AuthDatabase {
    fn insert_invite(&self, invite: &StoredInvite) -> StorageResult<()> {
        let json = serde_json::to_vec(invite)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(INVITES)?;
            if table.get(invite.token.as_str())?.is_some() {
                return Err(StorageError::Conflict("Invite token".to_string()));
            }
            table.insert(invite.token.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn find_usable_invite(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<StoredInvite>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(INVITES)?;
        match table.get(token)? {
            Some(value) => {
                let invite: StoredInvite = decode(value.value())?;
                Ok(invite.is_usable_at(now).then_some(invite))
            }
            None => Ok(None),
        }
    }

    fn accept_invite(
        &self,
        token: &str,
        acceptance: AcceptInvite,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<StoredUser>> {
        let write_txn = self.db.begin_write()?;
        let stored = {
            let mut invites = write_txn.open_table(INVITES)?;
            let mut users = write_txn.open_table(USERS)?;
            let mut emails = write_txn.open_table(USER_EMAILS)?;

            // Read and deserialize before mutating
            let mut invite: StoredInvite = match invites.get(token)? {
                Some(value) => decode(value.value())?,
                None => return Ok(None),
            };
            if !invite.is_usable_at(now) {
                return Ok(None);
            }
            if emails.get(invite.email.as_str())?.is_some() {
                return Err(StorageError::Conflict(format!("User with email {}", invite.email)));
            }

            let new_user = NewUser {
                email: invite.email.clone(),
                password_hash: acceptance.password_hash,
                name: acceptance.name,
                role: RoleAssignment::Fixed(invite.role),
                consultant_id: invite.consultant_id.clone(),
            };
            let role = new_user.role.resolve(users.len()?);
            let stored = new_user.into_stored(role, now);

            let user_json = serde_json::to_vec(&stored)?;
            users.insert(stored.id.as_str(), user_json.as_slice())?;
            emails.insert(stored.email.as_str(), stored.id.as_str())?;

            invite.accepted = true;
            let invite_json = serde_json::to_vec(&invite)?;
            invites.insert(token, invite_json.as_slice())?;
            stored
        };
        write_txn.commit()?;
        Ok(Some(stored))
    }

    fn list_invites_by_creator(&self, user_id: &str) -> StorageResult<Vec<StoredInvite>> {
        self.scan_invites(|invite| invite.created_by == user_id)
    }

    fn list_invites(&self, scope: &ClientScope) -> StorageResult<Vec<StoredInvite>> {
        self.scan_invites(|invite| scope.admits(invite))
    }

    fn purge_stale_invites(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(INVITES)?;

            let mut stale = Vec::new();
            for entry in table.iter()? {
                let (key, value) = entry?;
                let invite: StoredInvite = decode(value.value())?;
                if !invite.is_usable_at(now) {
                    stale.push(key.value().to_string());
                }
            }

            for token in &stale {
                table.remove(token.as_str())?;
            }
            stale.len()
        };
        write_txn.commit()?;
        Ok(removed)
    }
}

// =============================================================================
// Password resets
// =============================================================================

impl ResetStore for AuthDatabase {
    fn insert_reset(&self, reset: &StoredPasswordReset) -> StorageResult<()> {
        let json = serde_json::to_vec(reset)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PASSWORD_RESETS)?;
            if table.get(reset.token_digest.as_str())?.is_some() {
                return Err(StorageError::Conflict("Reset token".to_string()));
            }
            table.insert(reset.token_digest.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn consume_reset(
        &self,
        token_digest: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<String>> {
        let write_txn = self.db.begin_write()?;
        let user_id = {
            let mut resets = write_txn.open_table(PASSWORD_RESETS)?;
            let mut users = write_txn.open_table(USERS)?;

            let reset: StoredPasswordReset = match resets.get(token_digest)? {
                Some(value) => decode(value.value())?,
                None => return Ok(None),
            };
            if now >= reset.expires_at {
                return Ok(None);
            }

            let mut user: StoredUser = match users.get(reset.user_id.as_str())? {
                Some(value) => decode(value.value())?,
                None => return Err(StorageError::NotFound(format!("User {}", reset.user_id))),
            };
            user.password_hash = new_password_hash.to_string();
            user.updated_at = now;

            let json = serde_json::to_vec(&user)?;
            users.insert(user.id.as_str(), json.as_slice())?;
            resets.remove(token_digest)?;
            user.id
        };
        write_txn.commit()?;
        Ok(Some(user_id))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn temp_db() -> (AuthDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = AuthDatabase::open(&dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    fn new_user(email: &str, role: RoleAssignment) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "$2b$04$placeholder".to_string(),
            name: "Test User".to_string(),
            role,
            consultant_id: None,
        }
    }

    fn sample_session(user_id: &str, digest: &str, now: DateTime<Utc>) -> StoredSession {
        StoredSession {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            token_digest: digest.to_string(),
            created_at: now,
            expires_at: now + Duration::days(7),
            user_agent: Some("test-agent".to_string()),
            ip_address: None,
        }
    }

    fn sample_invite(token: &str, consultant_id: &str, now: DateTime<Utc>) -> StoredInvite {
        StoredInvite {
            id: uuid::Uuid::new_v4().to_string(),
            email: format!("{token}@example.com"),
            token: token.to_string(),
            role: Role::Client,
            consultant_id: Some(consultant_id.to_string()),
            created_by: consultant_id.to_string(),
            created_at: now,
            expires_at: now + Duration::hours(24),
            accepted: false,
        }
    }

    #[test]
    fn first_user_is_admin_then_consultants() {
        let (db, _dir) = temp_db();
        let now = Utc::now();

        let first = db.create_user(new_user("a@example.com", RoleAssignment::Bootstrap), now).unwrap();
        let second = db.create_user(new_user("b@example.com", RoleAssignment::Bootstrap), now).unwrap();
        let third = db.create_user(new_user("c@example.com", RoleAssignment::Bootstrap), now).unwrap();

        assert_eq!(first.role, Role::Admin);
        assert_eq!(second.role, Role::Consultant);
        assert_eq!(third.role, Role::Consultant);
    }

    #[test]
    fn concurrent_bootstrap_registrations_yield_one_admin() {
        let (db, _dir) = temp_db();
        let db = Arc::new(db);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let db = Arc::clone(&db);
                std::thread::spawn(move || {
                    db.create_user(
                        new_user(&format!("user{i}@example.com"), RoleAssignment::Bootstrap),
                        Utc::now(),
                    )
                    .unwrap()
                })
            })
            .collect();

        let users: Vec<StoredUser> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let admins = users.iter().filter(|u| u.role == Role::Admin).count();
        assert_eq!(admins, 1);
    }

    #[test]
    fn duplicate_email_rejected() {
        let (db, _dir) = temp_db();
        let now = Utc::now();
        db.create_user(new_user("same@example.com", RoleAssignment::Bootstrap), now).unwrap();

        let result = db.create_user(new_user("same@example.com", RoleAssignment::Bootstrap), now);
        assert!(matches!(result, Err(StorageError::Conflict(_))));
    }

    #[test]
    fn find_user_by_email_and_id() {
        let (db, _dir) = temp_db();
        let created = db
            .create_user(new_user("find@example.com", RoleAssignment::Bootstrap), Utc::now())
            .unwrap();

        let by_email = db.find_user_by_email("find@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, created.id);

        let by_id = db.find_user_by_id(&created.id).unwrap().unwrap();
        assert_eq!(by_id.email, "find@example.com");

        assert!(db.find_user_by_email("missing@example.com").unwrap().is_none());
    }

    #[test]
    fn session_lookup_joins_user_and_honors_expiry() {
        let (db, _dir) = temp_db();
        let now = Utc::now();
        let user = db.create_user(new_user("s@example.com", RoleAssignment::Bootstrap), now).unwrap();
        let session = sample_session(&user.id, "digest-1", now);
        db.insert_session(&session).unwrap();

        let record = db.find_active_session("digest-1", now).unwrap().unwrap();
        assert_eq!(record.user.id, user.id);
        assert_eq!(record.session.id, session.id);

        assert!(db.find_active_session("digest-1", session.expires_at).unwrap().is_none());
        assert!(db.find_active_session("unknown", now).unwrap().is_none());
    }

    #[test]
    fn delete_session_and_user_sessions() {
        let (db, _dir) = temp_db();
        let now = Utc::now();
        let user = db.create_user(new_user("d@example.com", RoleAssignment::Bootstrap), now).unwrap();
        db.insert_session(&sample_session(&user.id, "d1", now)).unwrap();
        db.insert_session(&sample_session(&user.id, "d2", now)).unwrap();
        db.insert_session(&sample_session(&user.id, "d3", now)).unwrap();

        assert!(db.delete_session("d1").unwrap());
        assert!(!db.delete_session("d1").unwrap());
        assert_eq!(db.delete_user_sessions(&user.id).unwrap(), 2);
        assert!(db.find_active_session("d2", now).unwrap().is_none());
    }

    #[test]
    fn accept_invite_creates_client_once() {
        let (db, _dir) = temp_db();
        let now = Utc::now();
        let consultant = db.create_user(new_user("k@example.com", RoleAssignment::Bootstrap), now).unwrap();
        db.insert_invite(&sample_invite("inv-token", &consultant.id, now)).unwrap();

        let acceptance = AcceptInvite {
            name: "Clara".to_string(),
            password_hash: "$2b$04$other".to_string(),
        };
        let client = db.accept_invite("inv-token", acceptance.clone(), now).unwrap().unwrap();
        assert_eq!(client.role, Role::Client);
        assert_eq!(client.consultant_id.as_deref(), Some(consultant.id.as_str()));
        assert_eq!(client.email, "inv-token@example.com");

        // Second acceptance sees an accepted invite
        assert!(db.accept_invite("inv-token", acceptance, now).unwrap().is_none());
        assert!(db.find_usable_invite("inv-token", now).unwrap().is_none());
    }

    #[test]
    fn expired_invite_cannot_be_accepted_and_is_purged() {
        let (db, _dir) = temp_db();
        let now = Utc::now();
        db.insert_invite(&sample_invite("old", "k1", now - Duration::hours(48))).unwrap();
        db.insert_invite(&sample_invite("fresh", "k1", now)).unwrap();

        let acceptance = AcceptInvite {
            name: "Late".to_string(),
            password_hash: "$2b$04$x".to_string(),
        };
        assert!(db.accept_invite("old", acceptance, now).unwrap().is_none());

        assert_eq!(db.purge_stale_invites(now).unwrap(), 1);
        let remaining = db.list_invites(&ClientScope::All).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].token, "fresh");
    }

    #[test]
    fn list_clients_respects_scope() {
        let (db, _dir) = temp_db();
        let now = Utc::now();
        for (token, owner) in [("c1", "k1"), ("c2", "k1"), ("c3", "k2")] {
            db.insert_invite(&sample_invite(token, owner, now)).unwrap();
            let acceptance = AcceptInvite {
                name: token.to_string(),
                password_hash: "$2b$04$x".to_string(),
            };
            db.accept_invite(token, acceptance, now).unwrap().unwrap();
        }

        assert_eq!(db.list_clients(&ClientScope::All).unwrap().len(), 3);
        assert_eq!(db.list_clients(&ClientScope::OwnedBy("k1".into())).unwrap().len(), 2);
        assert!(db.list_clients(&ClientScope::Nothing).unwrap().is_empty());

        let staff = db.list_users_with_roles(Role::STAFF).unwrap();
        assert!(staff.is_empty());
        assert_eq!(db.list_users_with_roles(&[Role::Client]).unwrap().len(), 3);
    }

    #[test]
    fn consume_reset_updates_hash_once() {
        let (db, _dir) = temp_db();
        let now = Utc::now();
        let user = db.create_user(new_user("r@example.com", RoleAssignment::Bootstrap), now).unwrap();
        db.insert_reset(&StoredPasswordReset {
            id: "reset-1".to_string(),
            user_id: user.id.clone(),
            token_digest: "reset-digest".to_string(),
            created_at: now,
            expires_at: now + Duration::hours(1),
        })
        .unwrap();

        let consumed = db.consume_reset("reset-digest", "$2b$04$new", now).unwrap();
        assert_eq!(consumed.as_deref(), Some(user.id.as_str()));

        let updated = db.find_user_by_id(&user.id).unwrap().unwrap();
        assert_eq!(updated.password_hash, "$2b$04$new");

        assert!(db.consume_reset("reset-digest", "$2b$04$again", now).unwrap().is_none());
    }

    #[test]
    fn expired_reset_is_rejected() {
        let (db, _dir) = temp_db();
        let now = Utc::now();
        let user = db.create_user(new_user("e@example.com", RoleAssignment::Bootstrap), now).unwrap();
        db.insert_reset(&StoredPasswordReset {
            id: "reset-2".to_string(),
            user_id: user.id,
            token_digest: "expired-digest".to_string(),
            created_at: now - Duration::hours(2),
            expires_at: now - Duration::hours(1),
        })
        .unwrap();

        assert!(db.consume_reset("expired-digest", "$2b$04$new", now).unwrap().is_none());
    }
}
