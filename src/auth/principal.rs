// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The resolved caller identity.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;
use crate::storage::StoredUser;

/// Authenticated principal resolved from a valid session token.
///
/// This is the only type handlers should trust for authorization
/// decisions. It is derived on every request from the session row joined
/// with its owning user and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Principal {
    /// User ID
    pub user_id: String,
    /// Display name
    pub name: String,
    /// Login email
    pub email: String,
    /// User's role
    pub role: Role,
    /// Owning consultant (clients only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consultant_id: Option<String>,
}

impl Principal {
    /// Check whether the principal's role is in `allowed`.
    pub fn has_any_role(&self, allowed: &[Role]) -> bool {
        self.role.is_in(allowed)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&StoredUser> for Principal {
    fn from(user: &StoredUser) -> Self {
        Self {
            user_id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            consultant_id: user.consultant_id.clone(),
        }
    }
}
