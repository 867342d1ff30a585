// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use url::Url;
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{Principal, Role, SESSION_COOKIE_NAME},
    models::{
        AcceptInviteRequest, AuthResponse, ClientSummary, CreateInviteRequest,
        CreateInviteResponse, Invite, InvitePreview, LoginRequest, MessageResponse,
        PasswordResetConfirmRequest, PasswordResetRequest, RegisterRequest, SessionResponse,
        StaffMember,
    },
    state::AppState,
};

pub mod admin;
pub mod auth;
pub mod clients;
pub mod health;
pub mod invites;
pub mod users;

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.app_base_url);

    let v1_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/session", get(auth::current_session))
        .route(
            "/auth/password-reset/request",
            post(auth::request_password_reset),
        )
        .route(
            "/auth/password-reset/confirm",
            post(auth::confirm_password_reset),
        )
        .route("/users/me", get(users::me))
        .route(
            "/invites",
            get(invites::list_invites).post(invites::create_invite),
        )
        .route("/invites/{token}", get(invites::preview_invite))
        .route("/invites/{token}/accept", post(invites::accept_invite))
        .route("/clients", get(clients::list_clients))
        .route("/admin/staff", get(admin::list_staff));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(cors)
}

/// Credentialed CORS for the portal origin only.
fn cors_layer(app_base_url: &Url) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    match HeaderValue::from_str(&app_base_url.origin().ascii_serialization()) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            tracing::warn!(error = %e, "APP_BASE_URL has no usable origin, cross-origin requests disabled");
            layer
        }
    }
}

struct SessionCookieSecurity;

impl Modify for SessionCookieSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(SESSION_COOKIE_NAME))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        auth::register,
        auth::login,
        auth::logout,
        auth::current_session,
        auth::request_password_reset,
        auth::confirm_password_reset,
        users::me,
        invites::create_invite,
        invites::list_invites,
        invites::preview_invite,
        invites::accept_invite,
        clients::list_clients,
        admin::list_staff
    ),
    components(
        schemas(
            Principal,
            Role,
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            SessionResponse,
            MessageResponse,
            CreateInviteRequest,
            CreateInviteResponse,
            Invite,
            InvitePreview,
            AcceptInviteRequest,
            PasswordResetRequest,
            PasswordResetConfirmRequest,
            ClientSummary,
            StaffMember,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SessionCookieSecurity),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Auth", description = "Registration, sessions and password reset"),
        (name = "Users", description = "Current user"),
        (name = "Invites", description = "Client invitations"),
        (name = "Clients", description = "Client listing"),
        (name = "Admin", description = "Admin-only endpoints")
    )
)]
struct ApiDoc;
