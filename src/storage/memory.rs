// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory store for tests and local experiments.
//!
//! A single `RwLock` guards every map, so each write holds the lock for the
//! whole check-then-insert and behaves like one transaction.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use super::error::{StorageError, StorageResult};
use super::ownership::ClientScope;
use super::records::{
    AcceptInvite, NewUser, RoleAssignment, SessionRecord, StoredInvite, StoredPasswordReset,
    StoredSession, StoredUser,
};
use super::repository::{InviteStore, ResetStore, SessionStore, UserStore};
use crate::auth::Role;

#[derive(Default)]
struct Inner {
    users: HashMap<String, StoredUser>,
    user_emails: HashMap<String, String>,
    sessions: HashMap<String, StoredSession>,
    invites: HashMap<String, StoredInvite>,
    password_resets: HashMap<String, StoredPasswordReset>,
}

impl Inner {
    fn insert_user(&mut self, user: NewUser, now: DateTime<Utc>) -> StorageResult<StoredUser> {
        if self.user_emails.contains_key(&user.email) {
            return Err(StorageError::Conflict(format!("User with email {}", user.email)));
        }
        let role = user.role.resolve(self.users.len() as u64);
        let stored = user.into_stored(role, now);
        self.user_emails.insert(stored.email.clone(), stored.id.clone());
        self.users.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }
}

/// Map-backed implementation of every store trait.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| StorageError::LockPoisoned)
    }
}

impl UserStore for InMemoryStore {
    fn create_user(&self, user: NewUser, now: DateTime<Utc>) -> StorageResult<StoredUser> {
        self.write()?.insert_user(user, now)
    }

    fn find_user_by_email(&self, email: &str) -> StorageResult<Option<StoredUser>> {
        let inner = self.read()?;
        Ok(inner
            .user_emails
            .get(email)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    fn find_user_by_id(&self, user_id: &str) -> StorageResult<Option<StoredUser>> {
        Ok(self.read()?.users.get(user_id).cloned())
    }

    fn list_clients(&self, scope: &ClientScope) -> StorageResult<Vec<StoredUser>> {
        let mut clients: Vec<StoredUser> = self
            .read()?
            .users
            .values()
            .filter(|u| u.role == Role::Client && scope.admits(*u))
            .cloned()
            .collect();
        clients.sort_by_key(|u| std::cmp::Reverse(u.created_at));
        Ok(clients)
    }

    fn list_users_with_roles(&self, roles: &[Role]) -> StorageResult<Vec<StoredUser>> {
        let mut users: Vec<StoredUser> = self
            .read()?
            .users
            .values()
            .filter(|u| u.role.is_in(roles))
            .cloned()
            .collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    fn health_check(&self) -> StorageResult<()> {
        self.read().map(|_| ())
    }
}

impl SessionStore for InMemoryStore {
    fn insert_session(&self, session: &StoredSession) -> StorageResult<()> {
        let mut inner = self.write()?;
        if inner.sessions.contains_key(&session.token_digest) {
            return Err(StorageError::Conflict("Session token".to_string()));
        }
        inner
            .sessions
            .insert(session.token_digest.clone(), session.clone());
        Ok(())
    }

    fn find_active_session(
        &self,
        token_digest: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<SessionRecord>> {
        let inner = self.read()?;
        let Some(session) = inner.sessions.get(token_digest) else {
            return Ok(None);
        };
        if !session.is_valid_at(now) {
            return Ok(None);
        }
        Ok(inner.users.get(&session.user_id).map(|user| SessionRecord {
            session: session.clone(),
            user: user.clone(),
        }))
    }

    fn delete_session(&self, token_digest: &str) -> StorageResult<bool> {
        Ok(self.write()?.sessions.remove(token_digest).is_some())
    }

    fn delete_user_sessions(&self, user_id: &str) -> StorageResult<usize> {
        let mut inner = self.write()?;
        let before = inner.sessions.len();
        inner.sessions.retain(|_, s| s.user_id != user_id);
        Ok(before - inner.sessions.len())
    }
}

impl InviteStore for InMemoryStore {
    fn insert_invite(&self, invite: &StoredInvite) -> StorageResult<()> {
        let mut inner = self.write()?;
        if inner.invites.contains_key(&invite.token) {
            return Err(StorageError::Conflict("Invite token".to_string()));
        }
        inner.invites.insert(invite.token.clone(), invite.clone());
        Ok(())
    }

    fn find_usable_invite(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<StoredInvite>> {
        Ok(self
            .read()?
            .invites
            .get(token)
            .filter(|i| i.is_usable_at(now))
            .cloned())
    }

    fn accept_invite(
        &self,
        token: &str,
        acceptance: AcceptInvite,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<StoredUser>> {
        let mut inner = self.write()?;
        let invite = match inner.invites.get(token) {
            Some(invite) if invite.is_usable_at(now) => invite.clone(),
            _ => return Ok(None),
        };

        let user = inner.insert_user(
            NewUser {
                email: invite.email.clone(),
                password_hash: acceptance.password_hash,
                name: acceptance.name,
                role: RoleAssignment::Fixed(invite.role),
                consultant_id: invite.consultant_id.clone(),
            },
            now,
        )?;

        if let Some(stored) = inner.invites.get_mut(token) {
            stored.accepted = true;
        }
        Ok(Some(user))
    }

    fn list_invites_by_creator(&self, user_id: &str) -> StorageResult<Vec<StoredInvite>> {
        let mut invites: Vec<StoredInvite> = self
            .read()?
            .invites
            .values()
            .filter(|i| i.created_by == user_id)
            .cloned()
            .collect();
        invites.sort_by_key(|i| std::cmp::Reverse(i.created_at));
        Ok(invites)
    }

    fn list_invites(&self, scope: &ClientScope) -> StorageResult<Vec<StoredInvite>> {
        let mut invites: Vec<StoredInvite> = self
            .read()?
            .invites
            .values()
            .filter(|i| scope.admits(*i))
            .cloned()
            .collect();
        invites.sort_by_key(|i| std::cmp::Reverse(i.created_at));
        Ok(invites)
    }

    fn purge_stale_invites(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        let mut inner = self.write()?;
        let before = inner.invites.len();
        inner.invites.retain(|_, i| i.is_usable_at(now));
        Ok(before - inner.invites.len())
    }
}

impl ResetStore for InMemoryStore {
    fn insert_reset(&self, reset: &StoredPasswordReset) -> StorageResult<()> {
        let mut inner = self.write()?;
        if inner.password_resets.contains_key(&reset.token_digest) {
            return Err(StorageError::Conflict("Reset token".to_string()));
        }
        inner
            .password_resets
            .insert(reset.token_digest.clone(), reset.clone());
        Ok(())
    }

    fn consume_reset(
        &self,
        token_digest: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<String>> {
        let mut inner = self.write()?;
        let user_id = match inner.password_resets.get(token_digest) {
            Some(reset) if now < reset.expires_at => reset.user_id.clone(),
            _ => return Ok(None),
        };

        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StorageError::NotFound(format!("User {user_id}")))?;
        user.password_hash = new_password_hash.to_string();
        user.updated_at = now;

        inner.password_resets.remove(token_digest);
        Ok(Some(user_id))
    }
}
