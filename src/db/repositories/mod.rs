//! Accès aux comptes utilisateurs.
//!
//! Le cœur d'authentification ne dépend que du trait `AccountRepository`;
//! la version Postgres (diesel) sert en production, la version mémoire en
//! développement et dans les tests. Les révocations de tokens suivent le
//! même découpage (`RevocationStore`).

pub mod memory;
pub mod revocation_repository;
pub mod user_repository;

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::error::RepositoryError;
use crate::db::models::user::{LoginAttemptState, NewUser, User};

pub use memory::InMemoryUserRepository;
pub use revocation_repository::PgRevocationRepository;
pub use user_repository::PgUserRepository;

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Recherche par email OU par username
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;

    async fn exists_by_email(&self, email: &str) -> Result<bool, RepositoryError>;

    async fn exists_by_username(&self, username: &str) -> Result<bool, RepositoryError>;

    /// `UniqueViolation` si l'email ou le username est déjà pris.
    async fn create(&self, new_user: NewUser) -> Result<User, RepositoryError>;

    async fn login_state(&self, id: Uuid) -> Result<Option<LoginAttemptState>, RepositoryError>;

    /// Incrément atomique du compteur; verrouille quand `threshold` est atteint.
    async fn record_failure(
        &self,
        id: Uuid,
        threshold: i32,
    ) -> Result<LoginAttemptState, RepositoryError>;

    /// Remet le compteur à zéro et met à jour `last_login_at`.
    async fn record_success(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// `false` si le compte n'existe pas.
    async fn unlock(&self, id: Uuid) -> Result<bool, RepositoryError>;
}
