use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use constant_time_eq::constant_time_eq;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::AppError;
use budget_auth_api::SuccessResponse;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// POST /admin/accounts/{id}/unlock
/// Lève le verrou d'un compte. Désactivé tant que `ADMIN_API_KEY` n'est pas défini.
pub async fn unlock_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(account_id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, AppError> {
    let Some(expected) = state.admin_key.as_deref() else {
        return Err(AppError::forbidden("Administrative endpoints are disabled"));
    };

    let provided = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("Missing admin key"))?;

    if !constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
        tracing::warn!(%account_id, "Unlock refused: bad admin key");
        return Err(AppError::unauthorized("Invalid admin key"));
    }

    state.auth.unlock_account(account_id).await?;
    Ok(Json(SuccessResponse::ok()))
}
