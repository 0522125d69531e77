use async_trait::async_trait;

use super::{Email, Mailer, MailerError, mask_email};

/// Mailer de développement: écrit le message dans les logs au lieu de
/// l'envoyer. Refusé en production par la configuration.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_email(&self, email: Email) -> Result<(), MailerError> {
        tracing::info!(
            to = %mask_email(&email.to),
            subject = %email.subject,
            body = %email.body,
            "📧 [dev] email not sent, logged instead"
        );
        Ok(())
    }
}
