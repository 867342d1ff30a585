// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ownership scoping for consultant-owned resources.
//!
//! Role-specific visibility is decided in exactly one place:
//! [`ClientScope::for_principal`]. Stores and handlers filter through the
//! resulting scope instead of branching on roles themselves.

use crate::auth::{Principal, Role};

use super::records::{StoredInvite, StoredUser};

/// Trait for resources that belong to a consultant's book.
pub trait OwnedResource {
    /// The consultant that owns this resource, if any.
    fn owner_consultant_id(&self) -> Option<&str>;
}

impl OwnedResource for StoredUser {
    fn owner_consultant_id(&self) -> Option<&str> {
        self.consultant_id.as_deref()
    }
}

impl OwnedResource for StoredInvite {
    fn owner_consultant_id(&self) -> Option<&str> {
        self.consultant_id.as_deref()
    }
}

/// Which consultant-owned resources a principal may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientScope {
    /// Every resource (admin view)
    All,
    /// Only resources owned by this consultant
    OwnedBy(String),
    /// Nothing
    Nothing,
}

impl ClientScope {
    /// Derive the scope from the caller's role.
    pub fn for_principal(principal: &Principal) -> Self {
        match principal.role {
            Role::Admin => ClientScope::All,
            Role::Consultant => ClientScope::OwnedBy(principal.user_id.clone()),
            Role::Client => ClientScope::Nothing,
        }
    }

    /// Check whether `resource` falls inside this scope.
    pub fn admits<R: OwnedResource + ?Sized>(&self, resource: &R) -> bool {
        match self {
            ClientScope::All => true,
            ClientScope::OwnedBy(consultant_id) => {
                resource.owner_consultant_id() == Some(consultant_id.as_str())
            }
            ClientScope::Nothing => false,
        }
    }
}
