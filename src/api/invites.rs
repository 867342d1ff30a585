// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client invitations: staff create and list them, the invited client
//! previews and accepts by token.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Json,
};

use crate::{
    api::auth::signed_in_response,
    auth::{ClientMetadata, RequireRole, StaffOnly},
    error::ApiError,
    models::{AcceptInviteRequest, CreateInviteRequest, CreateInviteResponse, Invite, InvitePreview},
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/v1/invites",
    request_body = CreateInviteRequest,
    tag = "Invites",
    security(("session_cookie" = [])),
    responses(
        (status = 201, description = "Invite created", body = CreateInviteResponse),
        (status = 400, description = "Invalid email or consultant"),
        (status = 401, description = "Not authenticated or not staff"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_invite(
    RequireRole(staff, _): StaffOnly,
    State(state): State<AppState>,
    Json(request): Json<CreateInviteRequest>,
) -> Result<(StatusCode, Json<CreateInviteResponse>), ApiError> {
    let (invite, invite_url) = state.accounts.create_invite(&staff, request)?;
    Ok((
        StatusCode::CREATED,
        Json(CreateInviteResponse {
            invite: invite.into(),
            invite_url,
        }),
    ))
}

/// Admins see the invites they created; consultants see invites into
/// their own book.
#[utoipa::path(
    get,
    path = "/v1/invites",
    tag = "Invites",
    security(("session_cookie" = [])),
    responses(
        (status = 200, description = "Invites, newest first", body = Vec<Invite>),
        (status = 401, description = "Not authenticated or not staff")
    )
)]
pub async fn list_invites(
    RequireRole(staff, _): StaffOnly,
    State(state): State<AppState>,
) -> Result<Json<Vec<Invite>>, ApiError> {
    let invites = state.accounts.list_invites(&staff)?;
    Ok(Json(invites.into_iter().map(Invite::from).collect()))
}

#[utoipa::path(
    get,
    path = "/v1/invites/{token}",
    params(("token" = String, Path, description = "Invite token")),
    tag = "Invites",
    responses(
        (status = 200, description = "Invite is usable", body = InvitePreview),
        (status = 404, description = "Unknown, expired or already used")
    )
)]
pub async fn preview_invite(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<InvitePreview>, ApiError> {
    state
        .accounts
        .preview_invite(&token)?
        .map(|invite| Json(invite.into()))
        .ok_or_else(|| ApiError::not_found("Invite not found or expired"))
}

/// Create the client account and sign it in.
#[utoipa::path(
    post,
    path = "/v1/invites/{token}/accept",
    params(("token" = String, Path, description = "Invite token")),
    request_body = AcceptInviteRequest,
    tag = "Invites",
    responses(
        (status = 201, description = "Account created and signed in", body = crate::models::AuthResponse),
        (status = 400, description = "Invalid input or unusable invite"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn accept_invite(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ClientMetadata(metadata): ClientMetadata,
    Json(request): Json<AcceptInviteRequest>,
) -> Result<Response, ApiError> {
    let signed_in = state.accounts.accept_invite(&token, request, metadata).await?;
    signed_in_response(StatusCode::CREATED, signed_in, "Client registered")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Clock, Principal, Role, SessionMetadata, SystemClock};
    use crate::storage::{NewUser, RoleAssignment};
    use axum::http::header::SET_COOKIE;
    use chrono::Utc;
    use std::marker::PhantomData;
    use std::sync::Arc;

    fn setup() -> (AppState, Principal) {
        let state = AppState::for_tests(Arc::new(SystemClock) as Arc<dyn Clock>);
        state
            .store
            .create_user(
                NewUser {
                    email: "admin@example.com".to_string(),
                    password_hash: "hash".to_string(),
                    name: "Admin".to_string(),
                    role: RoleAssignment::Bootstrap,
                    consultant_id: None,
                },
                Utc::now(),
            )
            .unwrap();
        let consultant = state
            .store
            .create_user(
                NewUser {
                    email: "consultant@example.com".to_string(),
                    password_hash: "hash".to_string(),
                    name: "Consultant".to_string(),
                    role: RoleAssignment::Bootstrap,
                    consultant_id: None,
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(consultant.role, Role::Consultant);
        (state, Principal::from(&consultant))
    }

    async fn invite(state: &AppState, staff: &Principal, email: &str) -> CreateInviteResponse {
        let (status, Json(created)) = create_invite(
            RequireRole(staff.clone(), PhantomData),
            State(state.clone()),
            Json(CreateInviteRequest {
                email: email.to_string(),
                consultant_id: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        created
    }

    fn token_of(created: &CreateInviteResponse) -> String {
        created
            .invite_url
            .rsplit('/')
            .next()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn consultant_invite_is_owned_by_consultant() {
        let (state, consultant) = setup();
        let created = invite(&state, &consultant, "client@example.com").await;
        assert_eq!(created.invite.role, Role::Client);
        assert_eq!(created.invite.consultant_id.as_deref(), Some(consultant.user_id.as_str()));
        assert!(created.invite_url.starts_with("http://localhost:3000/invite/"));

        let Json(listed) = list_invites(RequireRole(consultant, PhantomData), State(state))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn accept_creates_client_once() {
        let (state, consultant) = setup();
        let created = invite(&state, &consultant, "client@example.com").await;
        let token = token_of(&created);

        let Json(preview) = preview_invite(State(state.clone()), Path(token.clone()))
            .await
            .unwrap();
        assert_eq!(preview.email, "client@example.com");

        let request = AcceptInviteRequest {
            name: "Client".to_string(),
            password: "long-password".to_string(),
            confirm_password: "long-password".to_string(),
        };
        let response = accept_invite(
            State(state.clone()),
            Path(token.clone()),
            ClientMetadata(SessionMetadata::default()),
            Json(request.clone()),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().get(SET_COOKIE).is_some());

        let again = accept_invite(
            State(state.clone()),
            Path(token.clone()),
            ClientMetadata(SessionMetadata::default()),
            Json(request),
        )
        .await
        .unwrap_err();
        assert_eq!(again.status, StatusCode::BAD_REQUEST);

        let missing = preview_invite(State(state), Path(token)).await.unwrap_err();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_token_preview_is_not_found() {
        let (state, _) = setup();
        let err = preview_invite(State(state), Path("nope".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
