use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::AccountRepository;
use crate::db::error::RepositoryError;
use crate::db::models::user::{LoginAttemptState, NewUser, User};

/// Comptes en mémoire (développement sans Postgres, tests).
///
/// Un seul verrou couvre la table: l'unicité email/username et l'incrément
/// du compteur d'échecs sont donc atomiques comme en base.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::DatabaseError("user table lock poisoned".to_string())
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<T>(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut User) -> T,
    ) -> Result<Option<T>, RepositoryError> {
        let mut users = self.users.write().map_err(poisoned)?;
        Ok(users.get_mut(&id).map(|user| {
            let out = apply(user);
            user.updated_at = Utc::now();
            out
        }))
    }
}

#[async_trait]
impl AccountRepository for InMemoryUserRepository {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users
            .values()
            .find(|u| u.email == identifier || u.username == identifier)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.get(&id).cloned())
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, RepositoryError> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.values().any(|u| u.email == email))
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool, RepositoryError> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.values().any(|u| u.username == username))
    }

    async fn create(&self, new_user: NewUser) -> Result<User, RepositoryError> {
        let mut users = self.users.write().map_err(poisoned)?;

        if users.values().any(|u| u.email == new_user.email) {
            return Err(RepositoryError::UniqueViolation("users_email_key".to_string()));
        }
        if users.values().any(|u| u.username == new_user.username) {
            return Err(RepositoryError::UniqueViolation(
                "users_username_key".to_string(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            username: new_user.username,
            password_hash: new_user.password_hash,
            failed_login_count: 0,
            account_locked: false,
            locked_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn login_state(&self, id: Uuid) -> Result<Option<LoginAttemptState>, RepositoryError> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.get(&id).map(User::login_state))
    }

    async fn record_failure(
        &self,
        id: Uuid,
        threshold: i32,
    ) -> Result<LoginAttemptState, RepositoryError> {
        self.update(id, |user| {
            user.failed_login_count = user.failed_login_count.saturating_add(1);
            if !user.account_locked && user.failed_login_count >= threshold {
                user.account_locked = true;
                user.locked_at = Some(Utc::now());
            }
            user.login_state()
        })?
        .ok_or_else(|| RepositoryError::NotFound(format!("User {id}")))
    }

    async fn record_success(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.update(id, |user| {
            user.failed_login_count = 0;
            user.last_login_at = Some(Utc::now());
        })?
        .ok_or_else(|| RepositoryError::NotFound(format!("User {id}")))
    }

    async fn unlock(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let found = self.update(id, |user| {
            user.account_locked = false;
            user.locked_at = None;
            user.failed_login_count = 0;
        })?;
        Ok(found.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            email: format!("{name}@example.com"),
            username: name.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn find_by_identifier_matches_email_or_username() {
        let repo = InMemoryUserRepository::new();
        let created = repo.create(new_user("alice")).await.unwrap();

        let by_email = repo.find_by_identifier("alice@example.com").await.unwrap();
        let by_name = repo.find_by_identifier("alice").await.unwrap();
        let missing = repo.find_by_identifier("bob").await.unwrap();

        assert_eq!(by_email.map(|u| u.id), Some(created.id));
        assert_eq!(by_name.map(|u| u.id), Some(created.id));
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email_and_username() {
        let repo = InMemoryUserRepository::new();
        repo.create(new_user("alice")).await.unwrap();

        let mut same_email = new_user("other");
        same_email.email = "alice@example.com".to_string();
        let same_name = NewUser {
            email: "fresh@example.com".to_string(),
            ..new_user("alice")
        };

        assert!(matches!(
            repo.create(same_email).await,
            Err(RepositoryError::UniqueViolation(_))
        ));
        assert!(matches!(
            repo.create(same_name).await,
            Err(RepositoryError::UniqueViolation(_))
        ));
    }

    #[tokio::test]
    async fn record_failure_locks_once_threshold_reached() {
        let repo = InMemoryUserRepository::new();
        let user = repo.create(new_user("carol")).await.unwrap();

        let first = repo.record_failure(user.id, 2).await.unwrap();
        let second = repo.record_failure(user.id, 2).await.unwrap();

        assert_eq!(first.failed_count, 1);
        assert!(!first.locked);
        assert!(second.locked);
        assert!(second.locked_at.is_some());
    }

    #[tokio::test]
    async fn record_failure_on_unknown_account_is_not_found() {
        let repo = InMemoryUserRepository::new();
        let result = repo.record_failure(Uuid::new_v4(), 5).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn concurrent_failures_are_all_counted() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let user = repo.create(new_user("dave")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.record_failure(user.id, 100).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let state = repo.login_state(user.id).await.unwrap().unwrap();
        assert_eq!(state.failed_count, 16);
    }

    #[tokio::test]
    async fn unlock_unknown_account_returns_false() {
        let repo = InMemoryUserRepository::new();
        assert!(!repo.unlock(Uuid::new_v4()).await.unwrap());
    }
}
