// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Account Storage
//!
//! Persistent state for users, sessions, client invites and password
//! resets. The production backend is [`AuthDatabase`], an embedded redb
//! file under `DATA_DIR`. [`InMemoryStore`] implements the same traits for
//! tests.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   accounts.redb
//!     users            user_id → StoredUser
//!     user_emails      email → user_id
//!     sessions         sha256(token) → StoredSession
//!     invites          token → StoredInvite
//!     password_resets  sha256(token) → StoredPasswordReset
//! ```
//!
//! ## Important Notes
//!
//! - Raw session and reset tokens are never stored, only their digests
//! - Password hashes are written only through [`UserStore`] and
//!   [`ResetStore::consume_reset`]
//! - Role-dependent filtering goes through [`ClientScope`]

pub mod database;
pub mod error;
pub mod memory;
pub mod ownership;
pub mod records;
pub mod repository;

pub use database::AuthDatabase;
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryStore;
pub use ownership::{ClientScope, OwnedResource};
pub use records::{
    AcceptInvite, NewUser, RoleAssignment, SessionRecord, StoredInvite, StoredPasswordReset,
    StoredSession, StoredUser,
};
pub use repository::{AuthStore, InviteStore, ResetStore, SessionStore, UserStore};

/// File name of the account database inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "accounts.redb";
