// src/error.rs

use budget_auth_api::ErrorResponse;
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    // === Erreurs Repository ===
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    DatabaseError(String),

    // === Erreurs d'Authentification ===
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Account locked")]
    AccountLocked,
    #[error("Already registered: {0}")]
    AlreadyRegistered(String),
    #[error("Invalid email format")]
    InvalidEmail,
    #[error("Password too weak: {0}")]
    WeakPassword(String),

    // === Erreurs de vérification d'email ===
    #[error("Invalid verification code")]
    InvalidCode,
    #[error("Verification code expired")]
    CodeExpired,
    #[error("Missing or invalid email verification proof")]
    InvalidProof,
    #[error("Rate limited, retry in {0}s")]
    RateLimited(i64),
    #[error("Verification email dispatch failed: {0}")]
    DispatchFailed(String),

    // === Erreurs de Hashing/Cryptographie ===
    #[error("Password hashing failed: {0}")]
    PasswordHashingFailed(String),
    #[error("Token generation failed: {0}")]
    TokenGenerationFailed(String),
    #[error("Invalid token format")]
    InvalidTokenFormat,

    // === Erreurs de Validation ===
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // === Erreurs métier ===
    #[error("Unauthorized: {0}")]
    UnauthorizedAction(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),

    // === Erreurs internes ===
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, internal_detail) = self.get_error_info();

        if let Some(ref detail) = internal_detail {
            tracing::error!(error_code, %status, detail, "Internal server error");
        }

        let mut body = ErrorResponse::new(error_code, message);
        if let AppError::InvalidInput(ref detail) = self {
            body = body.with_details(detail.clone());
        }

        let mut response = (status, Json(body)).into_response();

        if let AppError::RateLimited(retry_after) = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }

        response
    }
}

impl AppError {
    /// Récupère les informations d'erreur formatées pour la réponse HTTP
    fn get_error_info(&self) -> (StatusCode, &'static str, String, Option<String>) {
        match self {
            // 404 Not Found
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None),

            // 401 Unauthorized. Même message que le compte existe ou non.
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid credentials".to_string(),
                None,
            ),
            AppError::UnauthorizedAction(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone(), None)
            }

            // 403 Forbidden
            AppError::AccountLocked => (
                StatusCode::FORBIDDEN,
                "ACCOUNT_LOCKED",
                "Account locked after too many failed login attempts".to_string(),
                None,
            ),
            AppError::InvalidProof => (
                StatusCode::FORBIDDEN,
                "INVALID_PROOF",
                "Email verification is missing, expired or does not match this email".to_string(),
                None,
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone(), None),

            // 400 Bad Request
            AppError::AlreadyRegistered(msg) => (
                StatusCode::BAD_REQUEST,
                "ALREADY_REGISTERED",
                msg.clone(),
                None,
            ),
            AppError::InvalidEmail => (
                StatusCode::BAD_REQUEST,
                "INVALID_EMAIL",
                "Invalid email format".to_string(),
                None,
            ),
            AppError::WeakPassword(msg) => {
                (StatusCode::BAD_REQUEST, "WEAK_PASSWORD", msg.clone(), None)
            }
            AppError::InvalidCode => (
                StatusCode::BAD_REQUEST,
                "INVALID_CODE",
                "The verification code is incorrect".to_string(),
                None,
            ),
            AppError::CodeExpired => (
                StatusCode::BAD_REQUEST,
                "CODE_EXPIRED",
                "The verification code has expired, request a new one".to_string(),
                None,
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                None,
            ),
            // Le détail du rejet part dans `details`
            AppError::InvalidInput(_) => (
                StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                "The request body is missing or malformed".to_string(),
                None,
            ),
            AppError::InvalidTokenFormat => (
                StatusCode::BAD_REQUEST,
                "INVALID_TOKEN_FORMAT",
                "Token format is invalid".to_string(),
                None,
            ),

            // 429 Too Many Requests
            AppError::RateLimited(retry_after) => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                format!("Please wait {retry_after} seconds before requesting a new code"),
                None,
            ),

            // 500 Internal Server Error: le détail reste dans les logs
            AppError::DispatchFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DISPATCH_FAILED",
                "Could not send the verification code, try again later".to_string(),
                Some(msg.clone()),
            ),
            AppError::PasswordHashingFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "HASHING_ERROR",
                "An error occurred while processing your request".to_string(),
                Some(msg.clone()),
            ),
            AppError::TokenGenerationFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "TOKEN_ERROR",
                "An error occurred while generating token".to_string(),
                Some(msg.clone()),
            ),
            AppError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "An error occurred with the database".to_string(),
                Some(msg.clone()),
            ),
            AppError::InternalServerError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal server error occurred".to_string(),
                Some(msg.clone()),
            ),
        }
    }

    // === Constructeurs helpers ===
    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        AppError::DatabaseError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::InternalServerError(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::UnauthorizedAction(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }

    pub fn already_registered() -> Self {
        AppError::AlreadyRegistered("An account already exists with this email or username".to_string())
    }

    /// Retourne le code de statut HTTP
    #[cfg(test)]
    pub fn status_code(&self) -> StatusCode {
        self.get_error_info().0
    }
}

// === Conversions automatiques depuis d'autres types d'erreurs ===

// Depuis RepositoryError
impl From<crate::db::error::RepositoryError> for AppError {
    fn from(err: crate::db::error::RepositoryError) -> Self {
        use crate::db::error::RepositoryError;

        match err {
            RepositoryError::NotFound(msg) => AppError::not_found(msg),
            // Seule la création de compte peut violer une contrainte UNIQUE
            RepositoryError::UniqueViolation(_) => AppError::already_registered(),
            RepositoryError::PoolError(msg)
            | RepositoryError::DatabaseError(msg)
            | RepositoryError::TaskFailed(msg) => AppError::database(msg),
        }
    }
}

// Depuis JwtError
impl From<crate::auth::jwt::JwtError> for AppError {
    fn from(err: crate::auth::jwt::JwtError) -> Self {
        match err {
            crate::auth::jwt::JwtError::GenerationFailed(e) => {
                AppError::TokenGenerationFailed(e.to_string())
            }
            crate::auth::jwt::JwtError::VerificationFailed(_)
            | crate::auth::jwt::JwtError::WrongPurpose => AppError::unauthorized("Invalid token"),
        }
    }
}

// Depuis PasswordError
impl From<crate::auth::password::PasswordError> for AppError {
    fn from(err: crate::auth::password::PasswordError) -> Self {
        AppError::PasswordHashingFailed(err.to_string())
    }
}

// Depuis VerificationError
impl From<crate::auth::verification::VerificationError> for AppError {
    fn from(err: crate::auth::verification::VerificationError) -> Self {
        use crate::auth::verification::VerificationError;

        match err {
            VerificationError::RateLimited { retry_after_secs } => {
                AppError::RateLimited(retry_after_secs)
            }
            VerificationError::Dispatch(detail) => AppError::DispatchFailed(detail),
            VerificationError::Store(err) => err.into(),
        }
    }
}

// Depuis une tâche bloquante (bcrypt) qui a paniqué
impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::internal(format!("Blocking task failed: {err}"))
    }
}

// Depuis axum::extract::rejection::JsonRejection
impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(err: axum::extract::rejection::JsonRejection) -> Self {
        AppError::InvalidInput(err.body_text())
    }
}
