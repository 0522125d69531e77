use std::fmt;

/// Erreurs de la couche repository (comptes, codes, révocations)
#[derive(Debug)]
pub enum RepositoryError {
    PoolError(String),
    NotFound(String),
    UniqueViolation(String),
    DatabaseError(String),
    /// La tâche bloquante qui exécutait la requête a paniqué ou a été annulée
    TaskFailed(String),
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryError::PoolError(msg) => write!(f, "Connection pool error: {msg}"),
            RepositoryError::NotFound(msg) => write!(f, "Not found: {msg}"),
            RepositoryError::UniqueViolation(msg) => {
                write!(f, "Unique constraint violation: {msg}")
            }
            RepositoryError::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            RepositoryError::TaskFailed(msg) => write!(f, "Repository task failed: {msg}"),
        }
    }
}

impl std::error::Error for RepositoryError {}

impl From<diesel::result::Error> for RepositoryError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match err {
            Error::NotFound => RepositoryError::NotFound("Record not found".to_string()),
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                // constraint_name permet de savoir si c'est l'email ou le username
                let detail = info
                    .constraint_name()
                    .map_or_else(|| info.message().to_string(), str::to_string);
                RepositoryError::UniqueViolation(detail)
            }
            Error::DatabaseError(_, info) => RepositoryError::DatabaseError(info.message().to_string()),
            _ => RepositoryError::DatabaseError(err.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for RepositoryError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        RepositoryError::PoolError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for RepositoryError {
    fn from(err: tokio::task::JoinError) -> Self {
        RepositoryError::TaskFailed(err.to_string())
    }
}
