use axum::{Json, extract::State};

use crate::app::AppState;
use crate::auth::extractors::AuthClaims;
use crate::error::AppError;
use budget_auth_api::UserResponse;

/// GET /users/me
/// Récupère le profil de l'utilisateur courant
pub async fn get_current_user(
    claims: AuthClaims,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.auth.current_user(claims.sub).await?;
    Ok(Json(user))
}
