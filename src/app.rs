// src/app.rs

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::services::AuthService;
use crate::handlers::admin::{ADMIN_KEY_HEADER, unlock_account};
use crate::handlers::auth::{login, logout, register, send_verification_code, verify_email_code};
use crate::handlers::health::health;
use crate::handlers::user::get_current_user;

/// State partagé par tous les handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    /// `None`: routes d'administration désactivées
    pub admin_key: Option<Arc<str>>,
}

/// Configure les routes d'authentification
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/send-verification-code", post(send_verification_code))
        .route("/verify-email-code", post(verify_email_code))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

/// Configure les routes utilisateur (token requis)
pub fn user_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_current_user))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/accounts/{id}/unlock", post(unlock_account))
}

fn cors_layer(frontend_url: &str) -> Option<CorsLayer> {
    let origin = HeaderValue::from_str(frontend_url)
        .inspect_err(|_| tracing::warn!("FRONTEND_URL {frontend_url:?} is not a valid origin, CORS disabled"))
        .ok()?;

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                HeaderName::from_static(ADMIN_KEY_HEADER),
            ]),
    )
}

/// Construit l'application complète
pub fn build_router(state: AppState, frontend_url: &str) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .nest("/auth", auth_routes())
        .nest("/users", user_routes())
        .nest("/admin", admin_routes())
        .with_state(state);

    let router = match cors_layer(frontend_url) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    // Middleware global de tracing
    router.layer(TraceLayer::new_for_http())
}
