use bcrypt::{DEFAULT_COST, hash, verify};

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(bcrypt::BcryptError),
    #[error("Password verification failed: {0}")]
    VerificationFailed(bcrypt::BcryptError),
}

/// Hachage bcrypt avec un coût configurable (`BCRYPT_COST`).
#[derive(Debug, Clone, Copy)]
pub struct PasswordManager {
    cost: u32,
}

impl Default for PasswordManager {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl PasswordManager {
    pub fn with_cost(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        hash(password, self.cost).map_err(PasswordError::HashingFailed)
    }

    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        verify(password, hash).map_err(PasswordError::VerificationFailed)
    }

    /// Règle de robustesse: au moins 8 caractères, une majuscule, un chiffre
    /// et un caractère spécial. Retourne le premier critère manquant.
    pub fn validate_strength(password: &str) -> Result<(), &'static str> {
        if password.chars().count() < 8 {
            return Err("Password must be at least 8 characters long");
        }
        if !password.chars().any(char::is_uppercase) {
            return Err("Password must contain at least one uppercase letter");
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            return Err("Password must contain at least one digit");
        }
        if !password
            .chars()
            .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
        {
            return Err("Password must contain at least one special character");
        }
        Ok(())
    }
}
