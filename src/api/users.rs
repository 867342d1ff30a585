// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::Json;

use crate::auth::{Auth, Principal};

/// Get the signed-in user's profile.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("session_cookie" = [])),
    responses(
        (status = 200, description = "Current user", body = Principal),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(Auth(principal): Auth) -> Json<Principal> {
    Json(principal)
}
