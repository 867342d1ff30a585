// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles for authorization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User roles for authorization.
///
/// ## Role Set
///
/// - `Admin` - Practice owner; the first account ever registered
/// - `Consultant` - Self-registered consultant, owns a book of clients
/// - `Client` - Invited by a consultant, belongs to exactly one consultant
///
/// Roles are a closed set with no implied hierarchy: a guard lists every
/// role it admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Full administrative access
    Admin,
    /// Consultant (manages own clients)
    Consultant,
    /// Client of a consultant
    Client,
}

impl Role {
    /// Every role; admits any authenticated principal.
    pub const ALL: &'static [Role] = &[Role::Admin, Role::Consultant, Role::Client];

    /// Roles allowed to manage clients and invitations.
    pub const STAFF: &'static [Role] = &[Role::Admin, Role::Consultant];

    /// Check whether this role is a member of `allowed`.
    pub fn is_in(&self, allowed: &[Role]) -> bool {
        allowed.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Consultant => "CONSULTANT",
            Role::Client => "CLIENT",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
