// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only endpoints.

use axum::{extract::State, Json};

use crate::{
    auth::{AdminOnly, RequireRole},
    error::ApiError,
    models::StaffMember,
    state::AppState,
};

/// List every ADMIN and CONSULTANT account, oldest first.
///
/// Admins pick the owning consultant from this list when inviting a client.
#[utoipa::path(
    get,
    path = "/v1/admin/staff",
    tag = "Admin",
    security(("session_cookie" = [])),
    responses(
        (status = 200, description = "Staff accounts", body = Vec<StaffMember>),
        (status = 401, description = "Not authenticated or not an admin")
    )
)]
pub async fn list_staff(
    RequireRole(admin, _): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<Vec<StaffMember>>, ApiError> {
    tracing::debug!(admin_id = %admin.user_id, "Listing staff");
    let staff = state.accounts.list_staff()?;
    Ok(Json(staff.into_iter().map(StaffMember::from).collect()))
}
