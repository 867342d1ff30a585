// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies for the REST API. All types derive
//! `ToSchema` for OpenAPI documentation.
//!
//! ## Model Categories
//!
//! - **Auth**: registration, login and session introspection
//! - **Invites**: client invitations issued by staff
//! - **Password reset**: token request and confirmation
//! - **Clients**: consultant-scoped client listing
//! - **Admin**: staff directory
//!
//! Request types derive [`Validate`], which checks shape only (lengths,
//! matching confirmation). Email syntax is checked after normalization in
//! [`crate::accounts`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::auth::{Principal, Role};
use crate::storage::{StoredInvite, StoredUser};

/// Flatten field errors into one message, in field order.
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => message.to_string(),
                None => format!("Invalid {field}"),
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Auth Models
// =============================================================================

/// Self-registration request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: String,
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    /// Must equal `password`.
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Returned by register, login and invite acceptance. The session token
/// itself travels only in the `Set-Cookie` header.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub message: String,
    pub role: Role,
}

/// Current session, if any.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub principal: Option<Principal>,
}

/// Generic message body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// =============================================================================
// Invite Models
// =============================================================================

/// Request to invite a client.
///
/// Admins must name the consultant the client will belong to; consultants
/// always invite into their own book and may omit it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateInviteRequest {
    pub email: String,
    #[serde(default)]
    pub consultant_id: Option<String>,
}

/// Invite as seen by staff.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Invite {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub consultant_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accepted: bool,
}

impl From<StoredInvite> for Invite {
    fn from(invite: StoredInvite) -> Self {
        Self {
            id: invite.id,
            email: invite.email,
            role: invite.role,
            consultant_id: invite.consultant_id,
            created_by: invite.created_by,
            created_at: invite.created_at,
            expires_at: invite.expires_at,
            accepted: invite.accepted,
        }
    }
}

/// A freshly created invite plus the link to hand to the client.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateInviteResponse {
    pub invite: Invite,
    pub invite_url: String,
}

/// Public view of an invite, shown on the acceptance page.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvitePreview {
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub consultant_id: Option<String>,
}

impl From<StoredInvite> for InvitePreview {
    fn from(invite: StoredInvite) -> Self {
        Self {
            email: invite.email,
            expires_at: invite.expires_at,
            consultant_id: invite.consultant_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct AcceptInviteRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

// =============================================================================
// Password Reset Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct PasswordResetConfirmRequest {
    #[validate(length(min = 1, message = "Reset token is required"))]
    pub token: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

// =============================================================================
// Client Models
// =============================================================================

/// Client row in a consultant's book.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClientSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub consultant_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<StoredUser> for ClientSummary {
    fn from(user: StoredUser) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            consultant_id: user.consultant_id,
            created_at: user.created_at,
        }
    }
}

// =============================================================================
// Admin Models
// =============================================================================

/// Staff account an invited client can be assigned to.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StaffMember {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<StoredUser> for StaffMember {
    fn from(user: StoredUser) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_request(name: &str, password: &str, confirm: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.to_string(),
            email: "ana@example.com".to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    #[test]
    fn register_validation() {
        assert!(register_request("Ana", "longenough", "longenough").validate().is_ok());
        assert!(register_request("A", "longenough", "longenough").validate().is_err());
        assert!(register_request(&"x".repeat(101), "longenough", "longenough")
            .validate()
            .is_err());
        assert!(register_request("Ana", "short", "short").validate().is_err());

        let errors = register_request("Ana", "longenough", "different")
            .validate()
            .unwrap_err();
        assert_eq!(validation_message(&errors), "Passwords do not match");
    }

    #[test]
    fn name_length_counts_characters_not_bytes() {
        // Two multi-byte characters are a valid name
        assert!(register_request("Zé", "longenough", "longenough").validate().is_ok());
    }

    #[test]
    fn messages_are_ordered_by_field() {
        let errors = register_request("A", "short", "short").validate().unwrap_err();
        assert_eq!(
            validation_message(&errors),
            "Name must be between 2 and 100 characters; Password must be at least 8 characters"
        );
    }

    #[test]
    fn accept_invite_requires_matching_confirmation() {
        let request = AcceptInviteRequest {
            name: "Client".to_string(),
            password: "longenough".to_string(),
            confirm_password: "longenougH".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn reset_confirm_requires_token() {
        let request = PasswordResetConfirmRequest {
            token: String::new(),
            password: "longenough".to_string(),
            confirm_password: "longenough".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn login_requires_both_fields() {
        let request = LoginRequest {
            email: "ana@example.com".to_string(),
            password: String::new(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn create_invite_consultant_id_is_optional() {
        let request: CreateInviteRequest =
            serde_json::from_str(r#"{"email":"c@example.com"}"#).unwrap();
        assert!(request.consultant_id.is_none());
    }
}
