use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const EMAIL_PROOF_PURPOSE: &str = "email_verification";

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token generation failed: {0}")]
    GenerationFailed(jsonwebtoken::errors::Error),
    #[error("Token verification failed: {0}")]
    VerificationFailed(jsonwebtoken::errors::Error),
    #[error("Token was issued for another purpose")]
    WrongPurpose,
}

/// Claims du token de session
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

/// Preuve signée qu'un email a été vérifié, présentée à l'inscription.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EmailProofClaims {
    pub sub: String,
    pub purpose: String,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_ttl: Duration,
    proof_ttl: Duration,
}

impl JwtManager {
    /// Les durées sont bornées par la configuration au démarrage.
    pub fn new(secret: &str, session_ttl: Duration, proof_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            session_ttl,
            proof_ttl,
        }
    }

    /// Génère un token de session avec la durée configurée
    pub fn generate_access_token(&self, user_id: Uuid) -> Result<String, JwtError> {
        self.generate_token(user_id, self.session_ttl)
    }

    pub fn generate_token(&self, user_id: Uuid, expires_in: Duration) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            jti: Uuid::new_v4().to_string(),
            exp: (now + expires_in).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::GenerationFailed)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(JwtError::VerificationFailed)
    }

    /// Preuve de vérification liée à `email`, valable `proof_ttl`.
    pub fn generate_email_proof(&self, email: &str) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = EmailProofClaims {
            sub: email.to_string(),
            purpose: EMAIL_PROOF_PURPOSE.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: (now + self.proof_ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::GenerationFailed)
    }

    pub fn verify_email_proof(&self, token: &str) -> Result<EmailProofClaims, JwtError> {
        let claims = decode::<EmailProofClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(JwtError::VerificationFailed)?;

        if claims.purpose != EMAIL_PROOF_PURPOSE {
            return Err(JwtError::WrongPurpose);
        }
        Ok(claims)
    }
}
