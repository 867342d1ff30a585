// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Cookie-carried opaque sessions for the consulting portal.
//!
//! ## Auth Flow
//!
//! 1. A user registers, logs in or accepts an invite
//! 2. The server issues a session and sets the `atelier_session` cookie
//!    (`HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=604800`)
//! 3. On each request the extractors:
//!    - read the token from the cookie
//!    - look up the unexpired session joined with its user
//!    - build a [`Principal`] and check its role against the route's set
//!
//! ## Security
//!
//! - Tokens carry 384 bits from the system CSPRNG and are stored only as
//!   SHA-256 digests
//! - Expiry is absolute (7 days) and checked as `now < expires_at`
//! - A rejected guard clears the cookie; "no session" and "wrong role"
//!   look identical to the caller
//! - Passwords are hashed with bcrypt on the blocking thread pool

pub mod clock;
pub mod cookie;
pub mod error;
pub mod extractor;
pub mod password;
pub mod principal;
pub mod roles;
pub mod session;

pub use clock::{Clock, SystemClock};
pub use cookie::{
    clear_session_cookie, session_cookie, session_token_from_headers, SESSION_COOKIE_NAME,
    SESSION_TTL_SECONDS,
};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, ClientMetadata, OptionalAuth, RequireRole, StaffOnly};
pub use password::PasswordHasher;
pub use principal::Principal;
pub use roles::Role;
pub use session::{generate_token, token_digest, SessionAuthority, SessionMetadata};
