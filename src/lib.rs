// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Atelier - client portal server for a consulting practice
//!
//! Cookie-backed sessions with three roles (ADMIN, CONSULTANT, CLIENT),
//! staff-issued client invitations and password reset, persisted in an
//! embedded redb database.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Sessions, password hashing and role guards
//! - `accounts` - Registration, invite and reset flows
//! - `storage` - redb-backed persistence

pub mod accounts;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
