use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::db::error::RepositoryError;
use crate::db::models::user::LoginAttemptState;
use crate::db::repositories::AccountRepository;

pub const DEFAULT_LOCKOUT_THRESHOLD: i32 = 5;

#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    /// Échecs consécutifs avant verrouillage
    pub threshold: i32,
    /// `None`: le verrou ne se lève que par `unlock` (administrateur)
    pub lock_duration: Option<Duration>,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_LOCKOUT_THRESHOLD,
            lock_duration: None,
        }
    }
}

/// Compteur d'échecs de connexion par compte.
///
/// `Open` tant que `failed_count < threshold`, `Locked` ensuite. Un succès
/// remet le compteur à zéro; un compte verrouillé refuse toute tentative.
pub struct LockoutTracker {
    accounts: Arc<dyn AccountRepository>,
    policy: LockoutPolicy,
}

impl LockoutTracker {
    pub fn new(accounts: Arc<dyn AccountRepository>, policy: LockoutPolicy) -> Self {
        Self { accounts, policy }
    }

    pub async fn record_failure(&self, account_id: Uuid) -> Result<LoginAttemptState, RepositoryError> {
        let state = self
            .accounts
            .record_failure(account_id, self.policy.threshold)
            .await?;

        if state.locked && state.failed_count == self.policy.threshold {
            tracing::warn!(
                %account_id,
                failed_count = state.failed_count,
                "🔒 Account locked after too many failed logins"
            );
        }
        Ok(state)
    }

    pub async fn record_success(&self, account_id: Uuid) -> Result<(), RepositoryError> {
        self.accounts.record_success(account_id).await
    }

    pub async fn is_locked(&self, account_id: Uuid) -> Result<bool, RepositoryError> {
        let state = self
            .accounts
            .login_state(account_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("User {account_id}")))?;

        if !state.locked {
            return Ok(false);
        }

        if let Some(duration) = self.policy.lock_duration
            && state.lock_expired(duration, Utc::now())
        {
            self.accounts.unlock(account_id).await?;
            tracing::info!(%account_id, "Lock period elapsed, account reopened");
            return Ok(false);
        }

        Ok(true)
    }

    /// Déverrouillage administratif. `false` si le compte n'existe pas.
    pub async fn unlock(&self, account_id: Uuid) -> Result<bool, RepositoryError> {
        let found = self.accounts.unlock(account_id).await?;
        if found {
            tracing::info!(%account_id, "🔓 Account unlocked by administrator");
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::user::NewUser;
    use crate::db::repositories::InMemoryUserRepository;

    async fn setup(policy: LockoutPolicy) -> (LockoutTracker, Arc<InMemoryUserRepository>, Uuid) {
        let repo = Arc::new(InMemoryUserRepository::new());
        let user = repo
            .create(NewUser {
                email: "acct1@example.com".to_string(),
                username: "acct1".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        (LockoutTracker::new(repo.clone(), policy), repo, user.id)
    }

    #[tokio::test]
    async fn fifth_consecutive_failure_locks_the_account() {
        let (tracker, _, id) = setup(LockoutPolicy::default()).await;

        for attempt in 1..5 {
            let state = tracker.record_failure(id).await.unwrap();
            assert_eq!(state.failed_count, attempt);
            assert!(!state.locked);
        }
        let state = tracker.record_failure(id).await.unwrap();

        assert!(state.locked);
        assert!(tracker.is_locked(id).await.unwrap());
    }

    #[tokio::test]
    async fn success_resets_the_counter() {
        let (tracker, repo, id) = setup(LockoutPolicy::default()).await;

        tracker.record_failure(id).await.unwrap();
        tracker.record_failure(id).await.unwrap();
        tracker.record_success(id).await.unwrap();

        let state = repo.login_state(id).await.unwrap().unwrap();
        assert_eq!(state.failed_count, 0);
        assert!(!state.locked);
        assert!(state.last_login_at.is_some());

        // Il faut de nouveau `threshold` échecs
        for _ in 0..4 {
            assert!(!tracker.record_failure(id).await.unwrap().locked);
        }
        assert!(tracker.record_failure(id).await.unwrap().locked);
    }

    #[tokio::test]
    async fn remaining_failures_equal_threshold_minus_prior_count() {
        let policy = LockoutPolicy {
            threshold: 3,
            lock_duration: None,
        };
        let (tracker, _, id) = setup(policy).await;

        // k = 1 échec déjà enregistré: il en reste exactement 2
        tracker.record_failure(id).await.unwrap();
        assert!(!tracker.record_failure(id).await.unwrap().locked);
        assert!(tracker.record_failure(id).await.unwrap().locked);
    }

    #[tokio::test]
    async fn lock_is_permanent_until_unlocked() {
        let (tracker, _, id) = setup(LockoutPolicy {
            threshold: 1,
            lock_duration: None,
        })
        .await;

        tracker.record_failure(id).await.unwrap();
        assert!(tracker.is_locked(id).await.unwrap());

        assert!(tracker.unlock(id).await.unwrap());
        assert!(!tracker.is_locked(id).await.unwrap());
    }

    #[tokio::test]
    async fn timed_lock_reopens_after_duration() {
        let (tracker, repo, id) = setup(LockoutPolicy {
            threshold: 1,
            lock_duration: Some(Duration::zero()),
        })
        .await;

        tracker.record_failure(id).await.unwrap();

        assert!(!tracker.is_locked(id).await.unwrap());
        let state = repo.login_state(id).await.unwrap().unwrap();
        assert_eq!(state.failed_count, 0);
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let (tracker, _, _) = setup(LockoutPolicy::default()).await;
        let result = tracker.is_locked(Uuid::new_v4()).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
        assert!(!tracker.unlock(Uuid::new_v4()).await.unwrap());
    }
}
