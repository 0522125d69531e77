use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};

use crate::app::AppState;
use crate::error::AppError;

const BEARER: &str = "Bearer ";

/// Token brut de `Authorization: Bearer <JWT>`, s'il est présent et bien formé.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER)
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Extracteur d'authentification pour les routes protégées.
/// Valide `Authorization: Bearer <JWT>` via `AuthService::verify_session`
/// (signature, expiration, révocation) et expose `sub`.
#[derive(Debug, Clone)]
pub struct AuthClaims {
    pub sub: uuid::Uuid,
}

impl FromRequestParts<AppState> for AuthClaims {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AppError::InvalidTokenFormat)?;

        let claims = state.auth.verify_session(token).await?;

        Ok(AuthClaims { sub: claims.sub })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
    }

    #[test]
    fn other_schemes_and_empty_tokens_are_ignored() {
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
