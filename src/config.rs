use anyhow::Result;
use chrono::Duration;
use std::env;
use std::ops::RangeInclusive;

use crate::auth::lockout::{DEFAULT_LOCKOUT_THRESHOLD, LockoutPolicy};
use crate::auth::verification::{DEFAULT_MAX_ATTEMPTS, VerificationSettings};

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Détecte automatiquement l'environnement
    pub fn detect() -> Self {
        // Méthode 1: Vérifier si on est dans AWS Lambda
        if env::var("AWS_LAMBDA_FUNCTION_NAME").is_ok() {
            return Self::Production;
        }

        // Méthode 2: Vérifier la variable APP_ENV
        match env::var("APP_ENV").as_deref() {
            Ok("production" | "prod") => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

/// Où sont stockés les comptes
#[derive(Debug, Clone, PartialEq)]
pub enum AccountStore {
    Postgres(String),
    /// Développement uniquement, perdu au redémarrage
    Memory,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub account_store: AccountStore,
    pub jwt_secret: String,
    pub session_ttl: Duration,
    pub bcrypt_cost: u32,
    pub verification: VerificationSettings,
    pub proof_ttl: Duration,
    pub sweep_interval: std::time::Duration,
    pub lockout: LockoutPolicy,
    /// `None`: les emails sont écrits dans les logs (dev)
    pub smtp: Option<SmtpConfig>,
    pub mail_from: String,
    pub admin_api_key: Option<String>,
    pub frontend_url: String,
    pub server_host: String,
    pub server_port: u16,
}

/// Lit une variable numérique, avec valeur par défaut si absente ou invalide.
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("   {key}={raw:?} is not valid, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Convertit `value` (dans l'unité de `to_duration`) et vérifie qu'il tombe
/// dans `range`. Hors bornes: la configuration est refusée.
fn bounded_duration(
    key: &str,
    value: i64,
    to_duration: fn(i64) -> Option<Duration>,
    range: &RangeInclusive<Duration>,
) -> Result<Duration> {
    to_duration(value)
        .filter(|d| range.contains(d))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "{key}={value} is out of range ({}s to {}s)",
                range.start().num_seconds(),
                range.end().num_seconds()
            )
        })
}

/// Durée lue comme `env_parse`, puis bornée par `bounded_duration`.
fn env_duration(
    key: &str,
    default: i64,
    to_duration: fn(i64) -> Option<Duration>,
    range: &RangeInclusive<Duration>,
) -> Result<Duration> {
    bounded_duration(key, env_parse(key, default), to_duration, range)
}

impl Config {
    /// Charge la configuration depuis les variables d'environnement
    /// avec détection automatique de l'environnement
    pub fn from_env() -> Result<Self> {
        let environment = Environment::detect();

        tracing::info!(
            "🌍 Environment detected: {}",
            environment.as_str().to_uppercase()
        );

        // Charger le fichier .env approprié
        Self::load_env_file(&environment);

        // Récupérer les variables avec fallbacks intelligents
        let account_store = Self::get_account_store(&environment)?;
        let jwt_secret = Self::get_jwt_secret(&environment)?;
        let session_ttl = env_duration(
            "JWT_EXPIRATION_HOURS",
            1,
            Duration::try_hours,
            &(Duration::hours(1)..=Duration::days(365)),
        )?;
        let bcrypt_cost = env_parse("BCRYPT_COST", bcrypt::DEFAULT_COST);

        let verification = VerificationSettings {
            code_ttl: env_duration(
                "VERIFICATION_CODE_TTL_SECONDS",
                300,
                Duration::try_seconds,
                &(Duration::seconds(1)..=Duration::days(1)),
            )?,
            resend_cooldown: env_duration(
                "VERIFICATION_RESEND_COOLDOWN_SECONDS",
                60,
                Duration::try_seconds,
                &(Duration::zero()..=Duration::hours(1)),
            )?,
            dispatch_timeout: std::time::Duration::from_secs(
                env_parse("MAIL_TIMEOUT_SECONDS", 10_u64).clamp(1, 300),
            ),
            max_attempts: env_parse("VERIFICATION_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS).max(1),
        };
        let proof_ttl = env_duration(
            "VERIFICATION_PROOF_TTL_MINUTES",
            15,
            Duration::try_minutes,
            &(Duration::minutes(1)..=Duration::days(1)),
        )?;
        let sweep_interval =
            std::time::Duration::from_secs(env_parse("CODE_SWEEP_INTERVAL_SECONDS", 60_u64).max(1));

        // Absente ou invalide: seul un administrateur lève le verrou
        let lock_duration = match env_non_empty("LOCKOUT_DURATION_MINUTES") {
            None => None,
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(minutes) => Some(bounded_duration(
                    "LOCKOUT_DURATION_MINUTES",
                    minutes,
                    Duration::try_minutes,
                    &(Duration::minutes(1)..=Duration::days(365)),
                )?),
                Err(_) => {
                    tracing::warn!("   LOCKOUT_DURATION_MINUTES={raw:?} is not valid, using admin unlock");
                    None
                }
            },
        };
        let lockout = LockoutPolicy {
            threshold: env_parse("LOCKOUT_THRESHOLD", DEFAULT_LOCKOUT_THRESHOLD).max(1),
            lock_duration,
        };

        let smtp = Self::get_smtp(&environment)?;
        let mail_from =
            env_non_empty("MAIL_FROM").unwrap_or_else(|| "no-reply@budget.local".to_string());
        let admin_api_key = env_non_empty("ADMIN_API_KEY");
        let frontend_url = Self::get_frontend_url(&environment);
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env_parse("SERVER_PORT", 3000_u16);

        tracing::info!("✅ Configuration loaded successfully");
        match &account_store {
            AccountStore::Postgres(url) => {
                tracing::debug!("   Database: {}", Self::mask_credentials(url));
            }
            AccountStore::Memory => tracing::warn!("   Accounts: in-memory (data lost on restart)"),
        }
        tracing::debug!("   Frontend: {}", frontend_url);
        tracing::debug!("   Server: {}:{}", server_host, server_port);
        tracing::debug!(
            "   Lockout: {} attempts, {}",
            lockout.threshold,
            lockout
                .lock_duration
                .map_or_else(|| "admin unlock".to_string(), |d| format!("{} min", d.num_minutes()))
        );

        Ok(Self {
            environment,
            account_store,
            jwt_secret,
            session_ttl,
            bcrypt_cost,
            verification,
            proof_ttl,
            sweep_interval,
            lockout,
            smtp,
            mail_from,
            admin_api_key,
            frontend_url,
            server_host,
            server_port,
        })
    }

    /// Charge le bon fichier .env selon l'environnement
    fn load_env_file(environment: &Environment) {
        // En production (Lambda), les variables sont déjà injectées
        if environment.is_production() {
            tracing::info!("📦 Production mode: using injected environment variables");
            return;
        }

        tracing::info!("📦 Development mode: loading .env file");
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("   Loaded: {}", path.display()),
            Err(_) => tracing::warn!("   .env file not found, using environment variables"),
        }
    }

    /// Choisit le stockage des comptes (ACCOUNT_STORE) et construit DATABASE_URL
    fn get_account_store(environment: &Environment) -> Result<AccountStore> {
        let memory_requested = env::var("ACCOUNT_STORE")
            .is_ok_and(|v| v.eq_ignore_ascii_case("memory"));

        if memory_requested {
            if environment.is_production() {
                anyhow::bail!("ACCOUNT_STORE=memory is not allowed in production");
            }
            return Ok(AccountStore::Memory);
        }

        // Essayer DATABASE_URL directement (fonctionne dans tous les cas)
        if let Ok(url) = env::var("DATABASE_URL") {
            return Ok(AccountStore::Postgres(url));
        }

        // Si en prod et DATABASE_URL manque, erreur critique
        if environment.is_production() {
            anyhow::bail!(
                "DATABASE_URL must be set in production! \
                 Configure it in Lambda environment variables."
            );
        }

        // En dev, construire l'URL depuis les composants
        let user = env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string());
        let password = env::var("POSTGRES_PASSWORD").unwrap_or_else(|_| "postgres".to_string());
        let host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
        let database = env::var("POSTGRES_DB").unwrap_or_else(|_| "budget_db".to_string());

        Ok(AccountStore::Postgres(format!(
            "postgres://{user}:{password}@{host}:{port}/{database}"
        )))
    }

    /// Récupère JWT_SECRET avec validation
    fn get_jwt_secret(environment: &Environment) -> Result<String> {
        let secret = match env::var("JWT_SECRET") {
            Ok(s) => s,
            Err(_) if environment.is_production() => {
                tracing::error!("❌ JWT_SECRET not set in production!");
                anyhow::bail!("JWT_SECRET is required in production");
            }
            Err(_) => {
                tracing::warn!("⚠️  JWT_SECRET not set, using default (DEVELOPMENT ONLY!)");
                "dev_secret_key_change_in_production".to_string()
            }
        };

        // Valider la longueur du secret en production
        if environment.is_production() && secret.len() < 32 {
            anyhow::bail!(
                "JWT_SECRET must be at least 32 characters in production (current: {})",
                secret.len()
            );
        }

        Ok(secret)
    }

    /// Transport SMTP; obligatoire en production
    fn get_smtp(environment: &Environment) -> Result<Option<SmtpConfig>> {
        let Some(host) = env_non_empty("SMTP_HOST") else {
            if environment.is_production() {
                anyhow::bail!("SMTP_HOST is required in production to deliver verification codes");
            }
            tracing::warn!("⚠️  SMTP_HOST not set, verification emails will only be logged");
            return Ok(None);
        };

        Ok(Some(SmtpConfig {
            host,
            port: env_non_empty("SMTP_PORT").and_then(|p| p.trim().parse().ok()),
            username: env_non_empty("SMTP_USERNAME"),
            password: env_non_empty("SMTP_PASSWORD"),
        }))
    }

    /// Récupère FRONTEND_URL avec fallback
    fn get_frontend_url(environment: &Environment) -> String {
        env::var("FRONTEND_URL").unwrap_or_else(|_| {
            if environment.is_production() {
                "https://budget.example.com".to_string()
            } else {
                "http://localhost:8080".to_string()
            }
        })
    }

    /// Masque les credentials dans les logs
    fn mask_credentials(url: &str) -> String {
        if let Some(at_pos) = url.find('@')
            && let Some(scheme_end) = url.find("://")
        {
            let scheme = &url[..scheme_end + 3];
            let after_at = &url[at_pos..];
            return format!("{scheme}***:***{after_at}");
        }
        url.to_string()
    }

    /// Retourne true si on est en mode production
    pub fn is_production(&self) -> bool {
        self.environment.is_production()
    }
}
