// src/handlers/auth.rs

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};

use crate::app::AppState;
use crate::auth::extractors::bearer_token;
use crate::error::AppError;
use budget_auth_api::{
    AuthResponse, LoginRequest, RegisterRequest, SendCodeRequest, SuccessResponse,
    VerifyCodeRequest, VerifyCodeResponse,
};

/// POST /auth/send-verification-code
/// Envoie un code à 6 chiffres par email (jamais dans la réponse)
pub async fn send_verification_code(
    State(state): State<AppState>,
    payload: Result<Json<SendCodeRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let Json(payload) = payload?;
    state.auth.request_code(&payload.email).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// POST /auth/verify-email-code
/// Échange le code contre une preuve à présenter à l'inscription
pub async fn verify_email_code(
    State(state): State<AppState>,
    payload: Result<Json<VerifyCodeRequest>, JsonRejection>,
) -> Result<Json<VerifyCodeResponse>, AppError> {
    let Json(payload) = payload?;
    let proof = state.auth.submit_code(&payload.email, &payload.code).await?;
    Ok(Json(VerifyCodeResponse {
        success: true,
        proof,
    }))
}

/// POST /auth/register
/// Inscription d'un nouvel utilisateur (email vérifié)
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let Json(payload) = payload?;
    let response = state.auth.complete_registration(payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /auth/login
/// Connexion par email ou username
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let Json(payload) = payload?;
    let response = state.auth.authenticate(payload).await?;
    Ok(Json(response))
}

/// POST /auth/logout
/// Déconnexion; réussit toujours, révoque le token s'il est fourni
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Json<SuccessResponse> {
    state.auth.logout(bearer_token(&headers)).await;
    Json(SuccessResponse::ok())
}
