use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public profile of an account
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Bare acknowledgement: `{ "success": true }`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Returned by the verify step; `proof` must be presented at registration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VerifyCodeResponse {
    pub success: bool,
    pub proof: String,
}

/// Returned by registration and login.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub user: UserResponse,
}
