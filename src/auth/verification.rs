use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;

use crate::db::error::RepositoryError;
use crate::mail::{Mailer, mask_email, verification_email};
use crate::store::CodeStore;

pub use crate::store::{CodeCheck, DEFAULT_MAX_ATTEMPTS};

#[derive(Debug, Clone, Copy)]
pub struct VerificationSettings {
    pub code_ttl: Duration,
    /// Délai minimal entre deux demandes de code pour un même email
    pub resend_cooldown: Duration,
    /// Borne sur l'envoi d'un email
    pub dispatch_timeout: std::time::Duration,
    /// Mauvais codes tolérés avant que le code ne soit invalidé
    pub max_attempts: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("A code was requested too recently, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: i64 },
    #[error("Verification email could not be sent: {0}")]
    Dispatch(String),
    #[error("Code store unavailable: {0}")]
    Store(#[from] RepositoryError),
}

/// Code uniforme sur 000000..=999999
pub fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{n:06}")
}

/// Émission et contrôle des codes de vérification envoyés par email.
pub struct VerificationService {
    store: Arc<dyn CodeStore>,
    mailer: Arc<dyn Mailer>,
    sender: String,
    settings: VerificationSettings,
}

impl VerificationService {
    pub fn new(
        store: Arc<dyn CodeStore>,
        mailer: Arc<dyn Mailer>,
        sender: impl Into<String>,
        settings: VerificationSettings,
    ) -> Self {
        Self {
            store,
            mailer,
            sender: sender.into(),
            settings,
        }
    }

    /// Génère un code, le stocke puis l'envoie par email.
    ///
    /// Si l'envoi échoue, l'entrée écrite est retirée par compare-and-delete:
    /// un code plus récent écrit entre-temps par une autre requête est conservé.
    /// Le code retourné ne doit jamais être renvoyé au client HTTP.
    pub async fn issue_code(&self, email: &str) -> Result<String, VerificationError> {
        if let Some(existing) = self.store.get(email).await? {
            let now = Utc::now();
            let next_allowed = existing.issued_at + self.settings.resend_cooldown;
            if now < next_allowed {
                let retry_after_secs = (next_allowed - now).num_seconds().max(1);
                tracing::debug!(email = %mask_email(&existing.email), retry_after_secs, "Code request rate-limited");
                return Err(VerificationError::RateLimited { retry_after_secs });
            }
        }

        let code = generate_code();
        self.store.put(email, &code, self.settings.code_ttl).await?;

        let message = verification_email(&self.sender, email, &code, self.settings.code_ttl);
        let failure = match tokio::time::timeout(
            self.settings.dispatch_timeout,
            self.mailer.send_email(message),
        )
        .await
        {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!(
                "mail transport timed out after {:?}",
                self.settings.dispatch_timeout
            )),
        };

        if let Some(detail) = failure {
            let rolled_back = self
                .store
                .remove_if_code(email, &code)
                .await
                .inspect_err(|e| tracing::warn!(email = %mask_email(email), "Rollback failed: {e}"))
                .unwrap_or(false);
            tracing::error!(
                email = %mask_email(email),
                rolled_back,
                detail,
                "Verification email dispatch failed"
            );
            return Err(VerificationError::Dispatch(detail));
        }

        tracing::info!(email = %mask_email(email), "Verification code sent");
        Ok(code)
    }

    /// Contrôle un code soumis. Un code correct est consommé (usage unique);
    /// après `max_attempts` mauvais codes, l'entrée est invalidée.
    pub async fn check_code(
        &self,
        email: &str,
        submitted: &str,
    ) -> Result<CodeCheck, VerificationError> {
        let outcome = self
            .store
            .check_code(email, submitted, self.settings.max_attempts)
            .await?;
        if outcome == CodeCheck::Expired {
            tracing::debug!(email = %mask_email(email), "No live code for submission");
        }
        Ok(outcome)
    }

    /// Oublie tout code en attente pour `email` (compte créé).
    pub async fn discard(&self, email: &str) -> Result<(), VerificationError> {
        self.store.remove(email).await?;
        Ok(())
    }

    /// Retire les codes expirés que personne n'a relus.
    pub async fn purge_expired(&self) -> Result<usize, RepositoryError> {
        self.store.purge_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::{Email, MailerError};
    use crate::store::InMemoryCodeStore;
    use crate::test_support::{FailingMailer, RecordingMailer, StalledMailer};
    use async_trait::async_trait;

    const EMAIL: &str = "a@x.com";

    fn settings(code_ttl: Duration) -> VerificationSettings {
        VerificationSettings {
            code_ttl,
            resend_cooldown: Duration::zero(),
            dispatch_timeout: std::time::Duration::from_secs(10),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    fn service(mailer: Arc<dyn Mailer>, settings: VerificationSettings) -> VerificationService {
        VerificationService::new(
            Arc::new(InMemoryCodeStore::new()),
            mailer,
            "no-reply@budget.local",
            settings,
        )
    }

    #[test]
    fn generated_codes_are_six_ascii_digits() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn issued_code_is_emailed_and_verifies_once() {
        let mailer = Arc::new(RecordingMailer::new());
        let svc = service(mailer.clone(), settings(Duration::minutes(5)));

        let code = svc.issue_code(EMAIL).await.expect("issue");
        assert_eq!(mailer.last_code_for(EMAIL).as_deref(), Some(code.as_str()));

        assert_eq!(svc.check_code(EMAIL, &code).await.unwrap(), CodeCheck::Verified);
        assert_eq!(svc.check_code(EMAIL, &code).await.unwrap(), CodeCheck::Expired);
    }

    #[tokio::test]
    async fn wrong_code_is_invalid_and_entry_is_retained() {
        let svc = service(Arc::new(RecordingMailer::new()), settings(Duration::minutes(5)));
        let code = svc.issue_code(EMAIL).await.unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };

        assert_eq!(svc.check_code(EMAIL, wrong).await.unwrap(), CodeCheck::Invalid);
        assert_eq!(svc.check_code(EMAIL, &code).await.unwrap(), CodeCheck::Verified);
    }

    #[tokio::test]
    async fn code_is_invalidated_after_max_attempts() {
        let svc = service(
            Arc::new(RecordingMailer::new()),
            VerificationSettings {
                max_attempts: 3,
                ..settings(Duration::minutes(5))
            },
        );
        let code = svc.issue_code(EMAIL).await.unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };

        for _ in 0..2 {
            assert_eq!(svc.check_code(EMAIL, wrong).await.unwrap(), CodeCheck::Invalid);
        }
        assert_eq!(svc.check_code(EMAIL, wrong).await.unwrap(), CodeCheck::Expired);
        assert_eq!(svc.check_code(EMAIL, &code).await.unwrap(), CodeCheck::Expired);
    }

    #[tokio::test]
    async fn new_code_gets_a_fresh_attempt_budget() {
        let svc = service(
            Arc::new(RecordingMailer::new()),
            VerificationSettings {
                max_attempts: 2,
                ..settings(Duration::minutes(5))
            },
        );
        let first = svc.issue_code(EMAIL).await.unwrap();
        let wrong = if first == "000000" { "000001" } else { "000000" };
        assert_eq!(svc.check_code(EMAIL, wrong).await.unwrap(), CodeCheck::Invalid);

        let mut second = svc.issue_code(EMAIL).await.unwrap();
        while second == wrong {
            second = svc.issue_code(EMAIL).await.unwrap();
        }

        assert_eq!(svc.check_code(EMAIL, wrong).await.unwrap(), CodeCheck::Invalid);
        assert_eq!(svc.check_code(EMAIL, &second).await.unwrap(), CodeCheck::Verified);
    }

    #[tokio::test]
    async fn never_requested_email_reports_expired() {
        let svc = service(Arc::new(RecordingMailer::new()), settings(Duration::minutes(5)));
        assert_eq!(svc.check_code("nobody@x.com", "123456").await.unwrap(), CodeCheck::Expired);
    }

    #[tokio::test]
    async fn code_past_ttl_is_expired_even_when_correct() {
        let svc = service(
            Arc::new(RecordingMailer::new()),
            settings(Duration::milliseconds(50)),
        );
        let code = svc.issue_code(EMAIL).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;

        assert_eq!(svc.check_code(EMAIL, "999999").await.unwrap(), CodeCheck::Expired);
        assert_eq!(svc.check_code(EMAIL, &code).await.unwrap(), CodeCheck::Expired);
    }

    #[tokio::test]
    async fn second_code_invalidates_the_first() {
        let svc = service(Arc::new(RecordingMailer::new()), settings(Duration::minutes(5)));
        let first = svc.issue_code(EMAIL).await.unwrap();
        let mut second = svc.issue_code(EMAIL).await.unwrap();
        // Collision improbable mais possible: on retire jusqu'à obtenir un code différent
        while second == first {
            second = svc.issue_code(EMAIL).await.unwrap();
        }

        assert_eq!(svc.check_code(EMAIL, &first).await.unwrap(), CodeCheck::Invalid);
        assert_eq!(svc.check_code(EMAIL, &second).await.unwrap(), CodeCheck::Verified);
    }

    #[tokio::test]
    async fn resend_within_cooldown_is_rate_limited() {
        let mailer = Arc::new(RecordingMailer::new());
        let svc = service(
            mailer.clone(),
            VerificationSettings {
                resend_cooldown: Duration::seconds(60),
                ..settings(Duration::minutes(5))
            },
        );

        svc.issue_code(EMAIL).await.unwrap();
        let err = svc.issue_code(EMAIL).await.unwrap_err();

        match err {
            VerificationError::RateLimited { retry_after_secs } => {
                assert!((1..=60).contains(&retry_after_secs));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(mailer.sent_count(), 1);
        // Une autre adresse n'est pas concernée
        assert!(svc.issue_code("b@x.com").await.is_ok());
    }

    #[tokio::test]
    async fn failed_dispatch_rolls_back_the_entry() {
        let store = Arc::new(InMemoryCodeStore::new());
        let svc = VerificationService::new(
            store.clone(),
            Arc::new(FailingMailer),
            "no-reply@budget.local",
            settings(Duration::minutes(5)),
        );

        let err = svc.issue_code(EMAIL).await.unwrap_err();

        assert!(matches!(err, VerificationError::Dispatch(_)));
        assert!(store.get(EMAIL).await.unwrap().is_none());
        assert_eq!(svc.check_code(EMAIL, "000000").await.unwrap(), CodeCheck::Expired);
    }

    #[tokio::test]
    async fn stalled_transport_times_out_and_rolls_back() {
        let store = Arc::new(InMemoryCodeStore::new());
        let svc = VerificationService::new(
            store.clone(),
            Arc::new(StalledMailer(std::time::Duration::from_secs(5))),
            "no-reply@budget.local",
            VerificationSettings {
                dispatch_timeout: std::time::Duration::from_millis(20),
                ..settings(Duration::minutes(5))
            },
        );

        let err = svc.issue_code(EMAIL).await.unwrap_err();

        assert!(matches!(err, VerificationError::Dispatch(ref d) if d.contains("timed out")));
        assert!(store.get(EMAIL).await.unwrap().is_none());
    }

    /// Un second `issue_code` concurrent écrit un nouveau code pendant que
    /// le premier envoi échoue.
    struct RacingMailer {
        store: Arc<InMemoryCodeStore>,
    }

    #[async_trait]
    impl Mailer for RacingMailer {
        async fn send_email(&self, email: Email) -> Result<(), MailerError> {
            self.store
                .put(&email.to, "777777", Duration::minutes(5))
                .await
                .unwrap();
            Err(MailerError::Rejected("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn rollback_keeps_a_newer_entry() {
        let store = Arc::new(InMemoryCodeStore::new());
        let svc = VerificationService::new(
            store.clone(),
            Arc::new(RacingMailer {
                store: store.clone(),
            }),
            "no-reply@budget.local",
            settings(Duration::minutes(5)),
        );

        let result = svc.issue_code(EMAIL).await;

        assert!(result.is_err());
        let entry = store
            .get(EMAIL)
            .await
            .unwrap()
            .expect("newer entry must survive rollback");
        assert_eq!(entry.code, "777777");
    }
}
