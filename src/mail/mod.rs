//! Envoi d'emails (collaborateur externe du flux de vérification).

pub mod log;
pub mod smtp;

use async_trait::async_trait;

pub use log::LogMailer;
pub use smtp::SmtpMailer;

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("Email transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("Email address error: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("Email message error: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("Email rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_email(&self, email: Email) -> Result<(), MailerError>;
}

/// Construit le message contenant le code de vérification.
pub fn verification_email(from: &str, to: &str, code: &str, ttl: chrono::Duration) -> Email {
    let minutes = (ttl.num_seconds() + 59) / 60;
    Email {
        from: from.to_string(),
        to: to.to_string(),
        subject: "Your Budget Tracker verification code".to_string(),
        body: format!(
            "Your verification code is {code}.\n\n\
             It expires in {minutes} minute(s). If you did not request it, ignore this email."
        ),
    }
}

/// Masque un email pour les logs: `a***@example.com`.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().unwrap_or('*');
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}
