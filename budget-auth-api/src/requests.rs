use serde::{Deserialize, Serialize};

// -------- REQUEST DTOs --------

/// Step 1 of sign-up: ask for a code to be emailed.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SendCodeRequest {
    pub email: String,
}

/// Step 2 of sign-up: prove control of the email address.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VerifyCodeRequest {
    pub email: String,
    pub code: String,
}

/// Step 3 of sign-up. `proof` is the token returned by the verify step.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String, // Plain text
    #[serde(default)]
    pub proof: Option<String>,
}

/// `identifier` is either the email or the username of the account.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String, // Plain text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_accepts_missing_proof() {
        let json = r#"{"username":"bob","email":"bob@example.com","password":"Secret123!"}"#;
        let req: RegisterRequest = serde_json::from_str(json).unwrap();
        assert!(req.proof.is_none());
    }

    #[test]
    fn login_request_rejects_legacy_email_field() {
        let json = r#"{"email":"bob@example.com","password":"Secret123!"}"#;
        assert!(serde_json::from_str::<LoginRequest>(json).is_err());
    }
}
