mod app;
mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod mail;
mod store;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use app::{AppState, build_router};
use auth::jwt::JwtManager;
use auth::password::PasswordManager;
use auth::revocation::{RevocationList, RevocationStore};
use auth::services::AuthService;
use auth::verification::VerificationService;
use config::{AccountStore, Config};
use db::repositories::{
    AccountRepository, InMemoryUserRepository, PgRevocationRepository, PgUserRepository,
};
use mail::{LogMailer, Mailer, SmtpMailer};
use store::{CodeStore, InMemoryCodeStore, PgCodeStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub async fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Si RUST_LOG n'est pas défini, utiliser ces règles par défaut
        tracing_subscriber::EnvFilter::new(
            "info,budget_auth=debug,hyper_util=warn,tower_http=info",
        )
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Comptes, codes en attente et révocations vivent au même endroit: avec
/// Postgres, toutes les instances partagent le même état.
struct Stores {
    accounts: Arc<dyn AccountRepository>,
    codes: Arc<dyn CodeStore>,
    revocations: Arc<dyn RevocationStore>,
}

fn build_stores(config: &Config) -> Stores {
    match &config.account_store {
        AccountStore::Postgres(url) => {
            let pool = db::connection::create_pool(url);
            // Pas bloquant: le pool se reconnecte à la demande
            match db::connection::check_connection(&pool) {
                Ok(()) => tracing::info!("✅ Database reachable"),
                Err(e) => tracing::error!("❌ Database not reachable yet: {e}"),
            }
            Stores {
                accounts: Arc::new(PgUserRepository::new(pool.clone())),
                codes: Arc::new(PgCodeStore::new(pool.clone())),
                revocations: Arc::new(PgRevocationRepository::new(pool)),
            }
        }
        AccountStore::Memory => {
            if std::env::var("AWS_LAMBDA_FUNCTION_NAME").is_ok() {
                tracing::warn!("⚠️  In-memory state is per instance, codes and logouts are not shared");
            }
            Stores {
                accounts: Arc::new(InMemoryUserRepository::new()),
                codes: Arc::new(InMemoryCodeStore::new()),
                revocations: Arc::new(RevocationList::new()),
            }
        }
    }
}

fn build_mailer(config: &Config) -> anyhow::Result<Arc<dyn Mailer>> {
    match &config.smtp {
        Some(smtp) => {
            tracing::info!("📧 SMTP relay: {}", smtp.host);
            Ok(Arc::new(SmtpMailer::from_config(smtp)?))
        }
        None => Ok(Arc::new(LogMailer)),
    }
}

/// Purge périodique des codes expirés et des révocations périmées.
fn spawn_sweeper(auth: Arc<AuthService>, every: std::time::Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match auth.purge_expired().await {
                Ok((codes, revocations)) if codes + revocations > 0 => {
                    tracing::debug!(codes, revocations, "Expired entries purged");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Expired entries sweep failed: {e}"),
            }
        }
    });
}

// ----------------- Main -----------------

#[tokio::main]
async fn main() -> Result<(), lambda_http::Error> {
    // Logs initialisés pour tous les environnements
    setup_logging().await;
    tracing::info!("Starting budget-auth...");

    let config = Config::from_env()?;
    if !config.is_production() {
        tracing::warn!("⚠️  Development settings in use, do not expose this instance");
    }

    let stores = build_stores(&config);
    let verification = VerificationService::new(
        stores.codes,
        build_mailer(&config)?,
        config.mail_from.clone(),
        config.verification,
    );
    let auth = Arc::new(AuthService::new(
        stores.accounts,
        verification,
        stores.revocations,
        config.lockout,
        JwtManager::new(&config.jwt_secret, config.session_ttl, config.proof_ttl),
        PasswordManager::with_cost(config.bcrypt_cost),
    )?);

    spawn_sweeper(auth.clone(), config.sweep_interval);

    let state = AppState {
        auth,
        admin_key: config.admin_api_key.as_deref().map(Arc::from),
    };
    if state.admin_key.is_none() {
        tracing::info!("ADMIN_API_KEY not set, admin routes disabled");
    }
    let app = build_router(state, &config.frontend_url);

    if std::env::var("AWS_LAMBDA_FUNCTION_NAME").is_ok() {
        tracing::info!("Running in Lambda mode");
        lambda_http::run(app).await
    } else {
        tracing::info!("Running in local HTTP server mode");
        let addr = format!("{}:{}", config.server_host, config.server_port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("🚀 Server running at http://{}", addr);
        axum::serve(listener, app).await?;

        Ok(())
    }
}
