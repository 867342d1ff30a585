// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::{auth::Auth, error::ApiError, models::ClientSummary, state::AppState};

/// List the clients visible to the caller, newest first.
///
/// Admins see every client, consultants see their own book, clients see
/// an empty list.
#[utoipa::path(
    get,
    path = "/v1/clients",
    tag = "Clients",
    security(("session_cookie" = [])),
    responses(
        (status = 200, description = "Visible clients", body = Vec<ClientSummary>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_clients(
    Auth(principal): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<ClientSummary>>, ApiError> {
    let clients = state.accounts.list_clients(&principal)?;
    Ok(Json(clients.into_iter().map(ClientSummary::from).collect()))
}
