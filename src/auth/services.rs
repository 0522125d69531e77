// src/auth/services.rs

use std::sync::{Arc, LazyLock};

use budget_auth_api::{AuthResponse, LoginRequest, RegisterRequest, UserResponse};
use regex::Regex;
use uuid::Uuid;

use crate::auth::jwt::{Claims, JwtManager};
use crate::auth::lockout::{LockoutPolicy, LockoutTracker};
use crate::auth::password::{PasswordError, PasswordManager};
use crate::auth::revocation::RevocationStore;
use crate::auth::verification::{CodeCheck, VerificationService};
use crate::db::models::user::{NewUser, User};
use crate::db::error::RepositoryError;
use crate::db::repositories::AccountRepository;
use crate::error::AppError;
use crate::mail::mask_email;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("Invalid email regex pattern")
});

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.\-]{3,100}$").expect("Invalid username regex pattern")
});

const MAX_EMAIL_LEN: usize = 255;

/// Mot de passe du hash de référence pour les identifiants inconnus
const DUMMY_PASSWORD: &str = "budget-auth-unknown-account";

/// Adresse canonique: sans espaces autour, en minuscules.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Orchestration de l'inscription (code email → preuve → compte) et de la
/// connexion (mot de passe + verrouillage).
pub struct AuthService {
    accounts: Arc<dyn AccountRepository>,
    verification: VerificationService,
    lockout: LockoutTracker,
    jwt: JwtManager,
    revocations: Arc<dyn RevocationStore>,
    passwords: PasswordManager,
    /// Hash au coût configuré, vérifié quand l'identifiant est inconnu
    dummy_hash: String,
}

impl AuthService {
    /// Calcule le hash de référence: échoue si le coût bcrypt est invalide.
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        verification: VerificationService,
        revocations: Arc<dyn RevocationStore>,
        lockout_policy: LockoutPolicy,
        jwt: JwtManager,
        passwords: PasswordManager,
    ) -> Result<Self, PasswordError> {
        let dummy_hash = passwords.hash(DUMMY_PASSWORD)?;
        Ok(Self {
            lockout: LockoutTracker::new(accounts.clone(), lockout_policy),
            accounts,
            verification,
            jwt,
            revocations,
            passwords,
            dummy_hash,
        })
    }

    // === Inscription ===

    /// Étape 1: envoie un code à `email`. Le code n'est jamais retourné.
    pub async fn request_code(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email);
        Self::validate_email(&email)?;

        self.verification.issue_code(&email).await?;
        Ok(())
    }

    /// Étape 2: échange un code valide contre une preuve signée.
    pub async fn submit_code(&self, email: &str, code: &str) -> Result<String, AppError> {
        let email = normalize_email(email);
        let code = code.trim();
        if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::InvalidCode);
        }

        match self.verification.check_code(&email, code).await? {
            CodeCheck::Verified => {
                tracing::info!(email = %mask_email(&email), "Email verified");
                Ok(self.jwt.generate_email_proof(&email)?)
            }
            CodeCheck::Invalid => Err(AppError::InvalidCode),
            CodeCheck::Expired => Err(AppError::CodeExpired),
        }
    }

    /// Étape 3: crée le compte si la preuve correspond à l'email.
    pub async fn complete_registration(
        &self,
        request: RegisterRequest,
    ) -> Result<AuthResponse, AppError> {
        let email = normalize_email(&request.email);
        let username = request.username.trim().to_string();

        // Preuve d'abord: sans elle, rien d'autre n'est évalué
        let proof = request
            .proof
            .as_deref()
            .and_then(|token| self.jwt.verify_email_proof(token).ok())
            .filter(|claims| claims.sub == email)
            .ok_or(AppError::InvalidProof)?;
        if self.revocations.is_revoked(&proof.jti).await? {
            return Err(AppError::InvalidProof);
        }

        Self::validate_email(&email)?;
        if !USERNAME_RE.is_match(&username) {
            return Err(AppError::validation(
                "Username must be 3 to 100 characters: letters, digits, '_', '.' or '-'",
            ));
        }
        PasswordManager::validate_strength(&request.password)
            .map_err(|msg| AppError::WeakPassword(msg.to_string()))?;

        if self.accounts.exists_by_email(&email).await?
            || self.accounts.exists_by_username(&username).await?
        {
            return Err(AppError::already_registered());
        }

        let passwords = self.passwords;
        let password = request.password;
        let password_hash =
            tokio::task::spawn_blocking(move || passwords.hash(&password)).await??;

        // Une inscription concurrente peut encore gagner la course: la
        // contrainte UNIQUE la transforme en AlreadyRegistered
        let user = self
            .accounts
            .create(NewUser {
                email: email.clone(),
                username,
                password_hash,
            })
            .await?;

        // Le compte existe: un échec de nettoyage ne doit plus faire échouer la requête
        if let Err(e) = self.revocations.revoke(&proof.jti, proof.exp).await {
            tracing::error!(user_id = %user.id, "Proof revocation failed: {e}");
        }
        if let Err(e) = self.verification.discard(&email).await {
            tracing::warn!(user_id = %user.id, "Pending code cleanup failed: {e}");
        }

        tracing::info!(user_id = %user.id, email = %mask_email(&email), "✅ Account created");
        self.session_for(user)
    }

    // === Connexion ===

    pub async fn authenticate(&self, request: LoginRequest) -> Result<AuthResponse, AppError> {
        let identifier = request.identifier.trim();
        let identifier = if identifier.contains('@') {
            normalize_email(identifier)
        } else {
            identifier.to_string()
        };

        // Même réponse et même coût bcrypt que le compte existe ou non
        let Some(user) = self.accounts.find_by_identifier(&identifier).await? else {
            self.verify_dummy(request.password).await?;
            return Err(AppError::InvalidCredentials);
        };

        // Verrouillé: refus avant toute comparaison de hash
        if self.lockout.is_locked(user.id).await? {
            tracing::warn!(user_id = %user.id, "Login attempt on locked account");
            return Err(AppError::AccountLocked);
        }

        let passwords = self.passwords;
        let password = request.password;
        let password_hash = user.password_hash.clone();
        let matches =
            tokio::task::spawn_blocking(move || passwords.verify(&password, &password_hash))
                .await??;

        if !matches {
            let state = self.lockout.record_failure(user.id).await?;
            tracing::debug!(user_id = %user.id, failed_count = state.failed_count, "Failed login");
            return Err(AppError::InvalidCredentials);
        }

        self.lockout.record_success(user.id).await?;
        let user = self.accounts.find_by_id(user.id).await?.unwrap_or(user);

        tracing::info!(user_id = %user.id, "User logged in");
        self.session_for(user)
    }

    /// Révoque la session si le token est valide. Ne peut pas échouer.
    pub async fn logout(&self, token: Option<&str>) {
        let Some(claims) = token.and_then(|t| self.jwt.verify_token(t).ok()) else {
            return;
        };
        match self.revocations.revoke(&claims.jti, claims.exp).await {
            Ok(true) => tracing::info!(user_id = %claims.sub, "User logged out"),
            Ok(false) => {}
            Err(e) => tracing::error!(user_id = %claims.sub, "Session revocation failed: {e}"),
        }
    }

    /// Vérifie un token de session et qu'il n'a pas été révoqué.
    pub async fn verify_session(&self, token: &str) -> Result<Claims, AppError> {
        let claims = self.jwt.verify_token(token)?;
        if self.revocations.is_revoked(&claims.jti).await? {
            return Err(AppError::unauthorized("Token has been revoked"));
        }
        Ok(claims)
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<UserResponse, AppError> {
        self.accounts
            .find_by_id(user_id)
            .await?
            .map(UserResponse::from)
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    /// Déverrouillage administratif
    pub async fn unlock_account(&self, user_id: Uuid) -> Result<(), AppError> {
        if self.lockout.unlock(user_id).await? {
            Ok(())
        } else {
            Err(AppError::not_found("Account not found"))
        }
    }

    /// Nettoyage périodique: codes expirés puis révocations périmées.
    pub async fn purge_expired(&self) -> Result<(usize, usize), RepositoryError> {
        let codes = self.verification.purge_expired().await?;
        let revocations = self.revocations.purge_expired().await?;
        Ok((codes, revocations))
    }

    // === Helpers ===

    async fn verify_dummy(&self, password: String) -> Result<(), AppError> {
        let passwords = self.passwords;
        let dummy_hash = self.dummy_hash.clone();
        tokio::task::spawn_blocking(move || passwords.verify(&password, &dummy_hash)).await??;
        Ok(())
    }

    fn session_for(&self, user: User) -> Result<AuthResponse, AppError> {
        let token = self.jwt.generate_access_token(user.id)?;
        Ok(AuthResponse {
            success: true,
            token,
            user: user.into(),
        })
    }

    fn validate_email(email: &str) -> Result<(), AppError> {
        if email.len() > MAX_EMAIL_LEN || !EMAIL_RE.is_match(email) {
            return Err(AppError::InvalidEmail);
        }
        Ok(())
    }
}
