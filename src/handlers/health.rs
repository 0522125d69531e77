use axum::{Json, http::StatusCode};

/// GET /health
/// Sonde de disponibilité
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok"
        })),
    )
}
