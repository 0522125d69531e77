//! Doublures partagées par les tests unitaires.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;

use crate::auth::jwt::JwtManager;
use crate::auth::lockout::LockoutPolicy;
use crate::auth::password::PasswordManager;
use crate::auth::revocation::RevocationList;
use crate::auth::services::AuthService;
use crate::auth::verification::{DEFAULT_MAX_ATTEMPTS, VerificationService, VerificationSettings};
use crate::db::repositories::InMemoryUserRepository;
use crate::mail::{Email, Mailer, MailerError};
use crate::store::InMemoryCodeStore;

/// Service complet en mémoire, coût bcrypt minimal.
pub fn auth_service_with(mailer: Arc<dyn Mailer>, resend_cooldown: Duration) -> AuthService {
    let verification = VerificationService::new(
        Arc::new(InMemoryCodeStore::new()),
        mailer,
        "no-reply@budget.local",
        VerificationSettings {
            code_ttl: Duration::minutes(5),
            resend_cooldown,
            dispatch_timeout: StdDuration::from_secs(5),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        },
    );
    AuthService::new(
        Arc::new(InMemoryUserRepository::new()),
        verification,
        Arc::new(RevocationList::new()),
        LockoutPolicy::default(),
        JwtManager::new("test_secret_for_routes", Duration::hours(1), Duration::minutes(15)),
        PasswordManager::with_cost(4),
    )
    .expect("auth service")
}

pub fn auth_service() -> AuthService {
    auth_service_with(Arc::new(RecordingMailer::new()), Duration::zero())
}

/// Garde les emails "envoyés" pour que les tests relisent le code.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Dernier code envoyé à `to` (6 chiffres extraits du corps).
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        sent.iter().rev().find(|e| e.to == to).and_then(|e| {
            e.body
                .split(|c: char| !c.is_ascii_digit())
                .find(|chunk| chunk.len() == 6)
                .map(str::to_string)
        })
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_email(&self, email: Email) -> Result<(), MailerError> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

/// Simule un fournisseur SMTP en panne.
#[derive(Debug, Default)]
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send_email(&self, _email: Email) -> Result<(), MailerError> {
        Err(MailerError::Rejected("550 mailbox unavailable".to_string()))
    }
}

/// Simule un fournisseur qui ne répond pas.
#[derive(Debug)]
pub struct StalledMailer(pub StdDuration);

#[async_trait]
impl Mailer for StalledMailer {
    async fn send_email(&self, _email: Email) -> Result<(), MailerError> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}
