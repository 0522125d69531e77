//! Stockage des codes de vérification en attente, indexés par email.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use constant_time_eq::constant_time_eq;
use diesel::prelude::*;

use crate::db::error::RepositoryError;
use crate::db::schema::verification_codes;

pub use memory::InMemoryCodeStore;
pub use postgres::PgCodeStore;

pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// Code en attente pour un email. Valide tant que `now < expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = verification_codes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct VerificationEntry {
    pub email: String,
    pub code: String,
    /// Mauvais codes déjà soumis contre cette entrée
    pub attempts: i32,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Issue d'une soumission de code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    Verified,
    /// Mauvais code; l'entrée reste valide tant qu'il reste des essais
    Invalid,
    /// Aucun code vivant (expiré, consommé, essais épuisés ou jamais demandé)
    Expired,
}

impl VerificationEntry {
    pub fn new(email: &str, code: &str, ttl: Duration) -> Self {
        let issued_at = Utc::now();
        Self {
            email: email.to_string(),
            code: code.to_string(),
            attempts: 0,
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Comparaison en temps constant
    pub fn matches(&self, code: &str) -> bool {
        constant_time_eq(self.code.as_bytes(), code.as_bytes())
    }

    /// Applique une soumission à une entrée vivante.
    ///
    /// `Verified` et `Expired` signifient que l'appelant doit supprimer
    /// l'entrée; `Invalid` qu'il doit conserver le nouveau `attempts`.
    pub fn attempt(&mut self, code: &str, max_attempts: i32) -> CodeCheck {
        if self.matches(code) {
            return CodeCheck::Verified;
        }
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts >= max_attempts {
            CodeCheck::Expired
        } else {
            CodeCheck::Invalid
        }
    }
}

/// Stockage à durée de vie: une entrée vivante par email, le dernier `put`
/// l'emporte.
///
/// `put`, `remove_if_code` et `check_code` sont atomiques par email.
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Insère ou remplace l'entrée de `email`, compteur d'essais à zéro.
    async fn put(
        &self,
        email: &str,
        code: &str,
        ttl: Duration,
    ) -> Result<VerificationEntry, RepositoryError>;

    /// Entrée courante si non expirée.
    async fn get(&self, email: &str) -> Result<Option<VerificationEntry>, RepositoryError>;

    async fn remove(&self, email: &str) -> Result<(), RepositoryError>;

    /// Compare-and-delete: supprime seulement si l'entrée vivante porte `code`.
    /// Ne compte pas d'essai (sert au rollback d'un envoi raté).
    async fn remove_if_code(&self, email: &str, code: &str) -> Result<bool, RepositoryError>;

    /// Soumission d'un code par l'utilisateur. Un code correct est consommé;
    /// un mauvais incrémente `attempts` et l'entrée disparaît à `max_attempts`.
    async fn check_code(
        &self,
        email: &str,
        code: &str,
        max_attempts: i32,
    ) -> Result<CodeCheck, RepositoryError>;

    /// Purge des entrées expirées; retourne le nombre supprimé.
    async fn purge_expired(&self) -> Result<usize, RepositoryError>;
}
