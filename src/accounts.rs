// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Account Flows
//!
//! Registration, login, client invitations, password resets and the
//! consultant-scoped client listing. Every flow that ends with a signed-in
//! user goes through [`SessionAuthority::issue_session`].
//!
//! ## Invariants
//!
//! - Emails are normalized (trim, NFKC, lowercase) before any lookup or insert
//! - Unknown email and wrong password produce the same error
//! - A password reset revokes every session of the user
//! - Email delivery is out of scope: invite and reset links are logged at
//!   debug level and invite links are returned to their creator

use std::sync::Arc;

use chrono::Duration;
use unicode_normalization::UnicodeNormalization;
use url::Url;
use validator::{Validate, ValidateEmail};

use crate::auth::{
    generate_token, token_digest, AuthError, Clock, PasswordHasher, Principal, Role,
    SessionAuthority, SessionMetadata,
};
use crate::models::{
    validation_message, AcceptInviteRequest, CreateInviteRequest, LoginRequest, PasswordResetConfirmRequest,
    PasswordResetRequest, RegisterRequest,
};
use crate::storage::{
    AcceptInvite, AuthStore, ClientScope, NewUser, RoleAssignment, StorageError, StoredInvite,
    StoredPasswordReset, StoredUser,
};

/// Invitations are valid for 24 hours.
pub const INVITE_TTL_HOURS: i64 = 24;

/// Reset links are valid for 1 hour.
pub const RESET_TTL_HOURS: i64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),

    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invite is invalid or has expired")]
    InvalidInvite,

    #[error("Reset link is invalid or has expired")]
    InvalidResetToken,

    #[error("Consultant not found")]
    UnknownConsultant,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A user together with the token of their new session.
#[derive(Debug)]
pub struct SignedIn {
    pub user: StoredUser,
    pub token: String,
}

/// Trim, apply NFKC and lowercase.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().nfkc().collect::<String>().to_lowercase()
}

fn checked_email(raw: &str) -> Result<String, AccountError> {
    let email = normalize_email(raw);
    if !email.validate_email() {
        return Err(AccountError::Validation("Invalid email address".to_string()));
    }
    Ok(email)
}

fn invalid(errors: validator::ValidationErrors) -> AccountError {
    AccountError::Validation(validation_message(&errors))
}

/// Orchestrates account flows over the store and the session authority.
pub struct AccountService {
    store: Arc<dyn AuthStore>,
    sessions: Arc<SessionAuthority>,
    clock: Arc<dyn Clock>,
    hasher: PasswordHasher,
    base_url: Url,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn AuthStore>,
        sessions: Arc<SessionAuthority>,
        clock: Arc<dyn Clock>,
        hasher: PasswordHasher,
        base_url: Url,
    ) -> Self {
        Self {
            store,
            sessions,
            clock,
            hasher,
            base_url,
        }
    }

    /// Self-registration. The first account becomes ADMIN, later ones
    /// CONSULTANT; the decision is made inside the insert transaction.
    pub async fn register(
        &self,
        request: RegisterRequest,
        metadata: SessionMetadata,
    ) -> Result<SignedIn, AccountError> {
        request.validate().map_err(invalid)?;
        let email = checked_email(&request.email)?;

        if self.store.find_user_by_email(&email)?.is_some() {
            return Err(AccountError::EmailTaken);
        }

        let password_hash = self.hasher.hash(&request.password).await?;
        let new_user = NewUser {
            email,
            password_hash,
            name: request.name.trim().to_string(),
            role: RoleAssignment::Bootstrap,
            consultant_id: None,
        };
        let user = match self.store.create_user(new_user, self.clock.now()) {
            Ok(user) => user,
            Err(StorageError::Conflict(_)) => return Err(AccountError::EmailTaken),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");
        let token = self.sessions.issue_session(&user, metadata)?;
        Ok(SignedIn { user, token })
    }

    /// Password login.
    pub async fn authenticate(
        &self,
        request: LoginRequest,
        metadata: SessionMetadata,
    ) -> Result<SignedIn, AccountError> {
        request
            .validate()
            .map_err(|_| AccountError::InvalidCredentials)?;
        let email = normalize_email(&request.email);

        let Some(user) = self.store.find_user_by_email(&email)? else {
            tracing::debug!("Login for unknown email");
            self.hasher.verify_absent(&request.password).await;
            return Err(AccountError::InvalidCredentials);
        };
        if !self.hasher.verify(&request.password, &user.password_hash).await? {
            tracing::debug!(user_id = %user.id, "Login with wrong password");
            return Err(AccountError::InvalidCredentials);
        }

        let token = self.sessions.issue_session(&user, metadata)?;
        tracing::info!(user_id = %user.id, "User logged in");
        Ok(SignedIn { user, token })
    }

    // =========================================================================
    // Invites
    // =========================================================================

    /// Issue a client invitation. Returns the invite and its acceptance URL.
    pub fn create_invite(
        &self,
        creator: &Principal,
        request: CreateInviteRequest,
    ) -> Result<(StoredInvite, String), AccountError> {
        let email = checked_email(&request.email)?;
        let consultant_id = self.invite_owner(creator, request.consultant_id)?;

        if self.store.find_user_by_email(&email)?.is_some() {
            return Err(AccountError::EmailTaken);
        }

        let now = self.clock.now();
        self.store.purge_stale_invites(now)?;

        let invite = StoredInvite {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            token: generate_token()?,
            role: Role::Client,
            consultant_id: Some(consultant_id),
            created_by: creator.user_id.clone(),
            created_at: now,
            expires_at: now + Duration::hours(INVITE_TTL_HOURS),
            accepted: false,
        };
        self.store.insert_invite(&invite)?;

        let invite_url = self.link(&["invite", &invite.token], None)?;
        tracing::info!(
            invite_id = %invite.id,
            created_by = %creator.user_id,
            consultant_id = ?invite.consultant_id,
            "Client invite created"
        );
        tracing::debug!(invite_url = %invite_url, "Invite link");
        Ok((invite, invite_url))
    }

    /// Which consultant's book an invited client joins.
    fn invite_owner(
        &self,
        creator: &Principal,
        requested: Option<String>,
    ) -> Result<String, AccountError> {
        match creator.role {
            Role::Consultant => Ok(creator.user_id.clone()),
            Role::Admin => {
                let id = requested
                    .filter(|id| !id.trim().is_empty())
                    .ok_or_else(|| AccountError::Validation("consultant_id is required".into()))?;
                match self.store.find_user_by_id(&id)? {
                    Some(owner) if owner.role.is_in(Role::STAFF) => Ok(owner.id),
                    _ => Err(AccountError::UnknownConsultant),
                }
            }
            Role::Client => Err(AuthError::Forbidden.into()),
        }
    }

    /// Admins see the invites they issued; consultants see invites into
    /// their book; clients see none.
    pub fn list_invites(&self, principal: &Principal) -> Result<Vec<StoredInvite>, AccountError> {
        self.store.purge_stale_invites(self.clock.now())?;
        let invites = if principal.is_admin() {
            self.store.list_invites_by_creator(&principal.user_id)?
        } else {
            self.store.list_invites(&ClientScope::for_principal(principal))?
        };
        Ok(invites)
    }

    /// Usable invite for the public acceptance page.
    pub fn preview_invite(&self, token: &str) -> Result<Option<StoredInvite>, AccountError> {
        let now = self.clock.now();
        self.store.purge_stale_invites(now)?;
        Ok(self.store.find_usable_invite(token, now)?)
    }

    /// Create the invited client and sign them in.
    pub async fn accept_invite(
        &self,
        token: &str,
        request: AcceptInviteRequest,
        metadata: SessionMetadata,
    ) -> Result<SignedIn, AccountError> {
        request.validate().map_err(invalid)?;
        if self
            .store
            .find_usable_invite(token, self.clock.now())?
            .is_none()
        {
            return Err(AccountError::InvalidInvite);
        }

        let acceptance = AcceptInvite {
            name: request.name.trim().to_string(),
            password_hash: self.hasher.hash(&request.password).await?,
        };
        // Re-checked inside the transaction; the invite may have been used
        // while the password was hashing.
        let user = match self.store.accept_invite(token, acceptance, self.clock.now()) {
            Ok(Some(user)) => user,
            Ok(None) => return Err(AccountError::InvalidInvite),
            Err(StorageError::Conflict(_)) => return Err(AccountError::EmailTaken),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(user_id = %user.id, "Invite accepted");
        let token = self.sessions.issue_session(&user, metadata)?;
        Ok(SignedIn { user, token })
    }

    // =========================================================================
    // Password reset
    // =========================================================================

    /// Store a reset token for an existing account.
    ///
    /// Returns the reset link when the account exists. Callers must answer
    /// identically either way.
    pub fn request_password_reset(
        &self,
        request: PasswordResetRequest,
    ) -> Result<Option<String>, AccountError> {
        let email = normalize_email(&request.email);
        let Some(user) = self.store.find_user_by_email(&email)? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(None);
        };

        let token = generate_token()?;
        let now = self.clock.now();
        let reset = StoredPasswordReset {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            token_digest: token_digest(&token),
            created_at: now,
            expires_at: now + Duration::hours(RESET_TTL_HOURS),
        };
        self.store.insert_reset(&reset)?;

        let reset_url = self.link(&["reset-password"], Some(("token", &token)))?;
        tracing::info!(user_id = %user.id, "Password reset requested");
        tracing::debug!(reset_url = %reset_url, "Password reset link");
        Ok(Some(reset_url))
    }

    /// Replace the password and revoke every session of the user.
    pub async fn confirm_password_reset(
        &self,
        request: PasswordResetConfirmRequest,
    ) -> Result<(), AccountError> {
        request.validate().map_err(invalid)?;

        let password_hash = self.hasher.hash(&request.password).await?;
        let consumed = self.store.consume_reset(
            &token_digest(request.token.trim()),
            &password_hash,
            self.clock.now(),
        )?;
        let Some(user_id) = consumed else {
            return Err(AccountError::InvalidResetToken);
        };

        self.sessions.revoke_all_for_user(&user_id)?;
        tracing::info!(user_id = %user_id, "Password reset completed");
        Ok(())
    }

    // =========================================================================
    // Clients
    // =========================================================================

    pub fn list_clients(&self, principal: &Principal) -> Result<Vec<StoredUser>, AccountError> {
        Ok(self
            .store
            .list_clients(&ClientScope::for_principal(principal))?)
    }

    /// Staff accounts an admin can assign invited clients to.
    pub fn list_staff(&self) -> Result<Vec<StoredUser>, AccountError> {
        Ok(self.store.list_users_with_roles(Role::STAFF)?)
    }

    fn link(&self, segments: &[&str], query: Option<(&str, &str)>) -> Result<String, AccountError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AuthError::Internal("APP_BASE_URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        if let Some((key, value)) = query {
            url.query_pairs_mut().append_pair(key, value);
        }
        Ok(url.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use crate::storage::InMemoryStore;
    use chrono::{TimeZone, Utc};

    struct Harness {
        clock: Arc<ManualClock>,
        sessions: Arc<SessionAuthority>,
        accounts: AccountService,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 4, 8, 30, 0).unwrap(),
        ));
        let sessions = Arc::new(SessionAuthority::new(store.clone(), clock.clone()));
        let accounts = AccountService::new(
            store,
            sessions.clone(),
            clock.clone(),
            PasswordHasher::new(4),
            Url::parse("https://portal.example.com").unwrap(),
        );
        Harness {
            clock,
            sessions,
            accounts,
        }
    }

    fn registration(name: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: "s3cret-pass".to_string(),
            confirm_password: "s3cret-pass".to_string(),
        }
    }

    async fn register(h: &Harness, email: &str) -> SignedIn {
        h.accounts
            .register(registration("Person", email), SessionMetadata::default())
            .await
            .unwrap()
    }

    fn principal_of(h: &Harness, signed_in: &SignedIn) -> Principal {
        h.sessions
            .resolve_session(Some(&signed_in.token))
            .unwrap()
            .unwrap()
    }

    fn token_from_url(url: &str, prefix: &str) -> String {
        url.strip_prefix(prefix).unwrap().to_string()
    }

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  Ana@Example.COM "), "ana@example.com");
        // Fullwidth characters fold under NFKC
        assert_eq!(normalize_email("ａｎａ@example.com"), "ana@example.com");
    }

    #[test]
    fn malformed_emails_are_rejected() {
        assert_eq!(checked_email(" Ana@Example.com ").unwrap(), "ana@example.com");
        for raw in [
            "ana.example.com",
            "a b@example.com",
            "a@b..c",
            "x@-.-",
            "<script>@x.y",
            "a\"b@x.y",
            "a@x.y,z",
        ] {
            assert!(
                matches!(checked_email(raw), Err(AccountError::Validation(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn register_rejects_malformed_email() {
        let h = harness();
        let err = h
            .accounts
            .register(registration("Person", "a@b..c"), SessionMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Validation(_)));
    }

    #[tokio::test]
    async fn first_registration_is_admin_later_ones_consultants() {
        let h = harness();
        let first = register(&h, "owner@example.com").await;
        let second = register(&h, "consultant@example.com").await;

        assert_eq!(first.user.role, Role::Admin);
        assert_eq!(second.user.role, Role::Consultant);
        assert_eq!(principal_of(&h, &first).role, Role::Admin);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_case_insensitively() {
        let h = harness();
        register(&h, "dup@example.com").await;
        let result = h
            .accounts
            .register(registration("Other", " DUP@example.com"), SessionMetadata::default())
            .await;
        assert!(matches!(result, Err(AccountError::EmailTaken)));
    }

    #[tokio::test]
    async fn invalid_registration_is_rejected() {
        let h = harness();
        let mut request = registration("Ana", "ana@example.com");
        request.confirm_password = "mismatch-pass".to_string();
        let result = h.accounts.register(request, SessionMetadata::default()).await;
        assert!(matches!(result, Err(AccountError::Validation(_))));

        let result = h
            .accounts
            .register(registration("Ana", "not-an-email"), SessionMetadata::default())
            .await;
        assert!(matches!(result, Err(AccountError::Validation(_))));
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let h = harness();
        register(&h, "login@example.com").await;
        assert!(!h.accounts.hasher.has_decoy());

        let unknown = h
            .accounts
            .authenticate(
                LoginRequest {
                    email: "nobody@example.com".to_string(),
                    password: "s3cret-pass".to_string(),
                },
                SessionMetadata::default(),
            )
            .await
            .unwrap_err();
        // Unknown emails still pay for a bcrypt verification
        assert!(h.accounts.hasher.has_decoy());
        let wrong = h
            .accounts
            .authenticate(
                LoginRequest {
                    email: "login@example.com".to_string(),
                    password: "wrong-pass".to_string(),
                },
                SessionMetadata::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(unknown, AccountError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());

        let ok = h
            .accounts
            .authenticate(
                LoginRequest {
                    email: "LOGIN@example.com".to_string(),
                    password: "s3cret-pass".to_string(),
                },
                SessionMetadata::default(),
            )
            .await
            .unwrap();
        assert_eq!(principal_of(&h, &ok).email, "login@example.com");
    }

    #[tokio::test]
    async fn consultant_invite_round_trip() {
        let h = harness();
        register(&h, "admin@example.com").await;
        let consultant = register(&h, "k@example.com").await;
        let consultant_principal = principal_of(&h, &consultant);

        let (invite, url) = h
            .accounts
            .create_invite(
                &consultant_principal,
                CreateInviteRequest {
                    email: "Client@Example.com".to_string(),
                    consultant_id: Some("ignored".to_string()),
                },
            )
            .unwrap();
        assert_eq!(invite.email, "client@example.com");
        assert_eq!(invite.consultant_id.as_deref(), Some(consultant.user.id.as_str()));
        assert_eq!(invite.expires_at - invite.created_at, Duration::hours(24));

        let token = token_from_url(&url, "https://portal.example.com/invite/");
        assert!(h.accounts.preview_invite(&token).unwrap().is_some());

        let client = h
            .accounts
            .accept_invite(
                &token,
                AcceptInviteRequest {
                    name: "Clara".to_string(),
                    password: "client-pass".to_string(),
                    confirm_password: "client-pass".to_string(),
                },
                SessionMetadata::default(),
            )
            .await
            .unwrap();
        let client_principal = principal_of(&h, &client);
        assert_eq!(client_principal.role, Role::Client);
        assert_eq!(
            client_principal.consultant_id.as_deref(),
            Some(consultant.user.id.as_str())
        );

        // Single use
        assert!(h.accounts.preview_invite(&token).unwrap().is_none());
        let again = h
            .accounts
            .accept_invite(
                &token,
                AcceptInviteRequest {
                    name: "Clara".to_string(),
                    password: "client-pass".to_string(),
                    confirm_password: "client-pass".to_string(),
                },
                SessionMetadata::default(),
            )
            .await;
        assert!(matches!(again, Err(AccountError::InvalidInvite)));
    }

    #[tokio::test]
    async fn invite_expires_after_a_day() {
        let h = harness();
        register(&h, "admin@example.com").await;
        let consultant = register(&h, "k@example.com").await;
        let (_, url) = h
            .accounts
            .create_invite(
                &principal_of(&h, &consultant),
                CreateInviteRequest {
                    email: "late@example.com".to_string(),
                    consultant_id: None,
                },
            )
            .unwrap();
        let token = token_from_url(&url, "https://portal.example.com/invite/");

        h.clock.advance(Duration::hours(24));
        assert!(h.accounts.preview_invite(&token).unwrap().is_none());
    }

    #[tokio::test]
    async fn admin_invite_requires_known_staff_owner() {
        let h = harness();
        let admin = register(&h, "admin@example.com").await;
        let consultant = register(&h, "k@example.com").await;
        let admin_principal = principal_of(&h, &admin);

        let missing = h.accounts.create_invite(
            &admin_principal,
            CreateInviteRequest {
                email: "c1@example.com".to_string(),
                consultant_id: None,
            },
        );
        assert!(matches!(missing, Err(AccountError::Validation(_))));

        let unknown = h.accounts.create_invite(
            &admin_principal,
            CreateInviteRequest {
                email: "c1@example.com".to_string(),
                consultant_id: Some("no-such-user".to_string()),
            },
        );
        assert!(matches!(unknown, Err(AccountError::UnknownConsultant)));

        let (invite, _) = h
            .accounts
            .create_invite(
                &admin_principal,
                CreateInviteRequest {
                    email: "c1@example.com".to_string(),
                    consultant_id: Some(consultant.user.id.clone()),
                },
            )
            .unwrap();
        assert_eq!(invite.created_by, admin.user.id);

        let staff = h.accounts.list_staff().unwrap();
        assert_eq!(staff.len(), 2);
        assert!(staff.iter().all(|u| u.role.is_in(Role::STAFF)));

        let admin_view = h.accounts.list_invites(&admin_principal).unwrap();
        assert_eq!(admin_view.len(), 1);
        let consultant_view = h
            .accounts
            .list_invites(&principal_of(&h, &consultant))
            .unwrap();
        assert_eq!(consultant_view.len(), 1);
    }

    #[tokio::test]
    async fn password_reset_replaces_hash_and_revokes_sessions() {
        let h = harness();
        let user = register(&h, "reset@example.com").await;

        assert!(h
            .accounts
            .request_password_reset(PasswordResetRequest {
                email: "ghost@example.com".to_string(),
            })
            .unwrap()
            .is_none());

        let url = h
            .accounts
            .request_password_reset(PasswordResetRequest {
                email: "Reset@example.com".to_string(),
            })
            .unwrap()
            .unwrap();
        let token = token_from_url(&url, "https://portal.example.com/reset-password?token=");

        h.accounts
            .confirm_password_reset(PasswordResetConfirmRequest {
                token: token.clone(),
                password: "brand-new-pass".to_string(),
                confirm_password: "brand-new-pass".to_string(),
            })
            .await
            .unwrap();

        assert!(h.sessions.resolve_session(Some(&user.token)).unwrap().is_none());
        let login = h
            .accounts
            .authenticate(
                LoginRequest {
                    email: "reset@example.com".to_string(),
                    password: "brand-new-pass".to_string(),
                },
                SessionMetadata::default(),
            )
            .await;
        assert!(login.is_ok());

        let reused = h
            .accounts
            .confirm_password_reset(PasswordResetConfirmRequest {
                token,
                password: "another-pass".to_string(),
                confirm_password: "another-pass".to_string(),
            })
            .await;
        assert!(matches!(reused, Err(AccountError::InvalidResetToken)));
    }

    #[tokio::test]
    async fn reset_token_expires_after_an_hour() {
        let h = harness();
        register(&h, "slow@example.com").await;
        let url = h
            .accounts
            .request_password_reset(PasswordResetRequest {
                email: "slow@example.com".to_string(),
            })
            .unwrap()
            .unwrap();
        let token = token_from_url(&url, "https://portal.example.com/reset-password?token=");

        h.clock.advance(Duration::hours(1));
        let result = h
            .accounts
            .confirm_password_reset(PasswordResetConfirmRequest {
                token,
                password: "brand-new-pass".to_string(),
                confirm_password: "brand-new-pass".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AccountError::InvalidResetToken)));
    }

    #[tokio::test]
    async fn client_listing_is_scoped_by_role() {
        let h = harness();
        let admin = register(&h, "admin@example.com").await;
        let k1 = register(&h, "k1@example.com").await;
        let k2 = register(&h, "k2@example.com").await;

        let mut client_signed_in = None;
        for (owner, email) in [(&k1, "a@example.com"), (&k1, "b@example.com"), (&k2, "c@example.com")] {
            let (_, url) = h
                .accounts
                .create_invite(
                    &principal_of(&h, owner),
                    CreateInviteRequest {
                        email: email.to_string(),
                        consultant_id: None,
                    },
                )
                .unwrap();
            let token = token_from_url(&url, "https://portal.example.com/invite/");
            let signed_in = h
                .accounts
                .accept_invite(
                    &token,
                    AcceptInviteRequest {
                        name: "Client".to_string(),
                        password: "client-pass".to_string(),
                        confirm_password: "client-pass".to_string(),
                    },
                    SessionMetadata::default(),
                )
                .await
                .unwrap();
            client_signed_in = Some(signed_in);
        }

        assert_eq!(h.accounts.list_clients(&principal_of(&h, &admin)).unwrap().len(), 3);
        assert_eq!(h.accounts.list_clients(&principal_of(&h, &k1)).unwrap().len(), 2);
        assert_eq!(h.accounts.list_clients(&principal_of(&h, &k2)).unwrap().len(), 1);

        let client = client_signed_in.unwrap();
        assert!(h
            .accounts
            .list_clients(&principal_of(&h, &client))
            .unwrap()
            .is_empty());
    }
}
