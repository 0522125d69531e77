use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::db::error::RepositoryError;

/// Identifiants (`jti`) de tokens invalidés avant leur expiration: sessions
/// fermées par logout et preuves d'email déjà consommées.
///
/// Une entrée n'a plus d'utilité après l'`exp` du token; `purge_expired` la
/// retire.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Retourne `false` si l'identifiant était déjà révoqué.
    async fn revoke(&self, jti: &str, expires_at: i64) -> Result<bool, RepositoryError>;

    async fn is_revoked(&self, jti: &str) -> Result<bool, RepositoryError>;

    async fn purge_expired(&self) -> Result<usize, RepositoryError>;
}

/// Liste en mémoire du processus (développement, tests).
#[derive(Debug, Default)]
pub struct RevocationList {
    revoked: DashMap<String, i64>,
}

impl RevocationList {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationStore for RevocationList {
    async fn revoke(&self, jti: &str, expires_at: i64) -> Result<bool, RepositoryError> {
        Ok(self.revoked.insert(jti.to_string(), expires_at).is_none())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, RepositoryError> {
        Ok(self.revoked.contains_key(jti))
    }

    async fn purge_expired(&self) -> Result<usize, RepositoryError> {
        let now = Utc::now().timestamp();
        let before = self.revoked.len();
        self.revoked.retain(|_, exp| *exp > now);
        Ok(before.saturating_sub(self.revoked.len()))
    }
}
