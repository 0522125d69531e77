use super::DbPool;
use anyhow::{Result, anyhow};
use diesel::PgConnection;
use diesel::r2d2::ConnectionManager;

const POOL_MAX_SIZE: u32 = 5;

/// Crée le pool de connexions Postgres.
///
/// Le pool est injecté dans le repository au démarrage plutôt que stocké
/// dans un global. Aucune connexion n'est ouverte ici: voir `check_connection`.
pub fn create_pool(database_url: &str) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(database_url);

    diesel::r2d2::Pool::builder()
        .max_size(POOL_MAX_SIZE)
        .build_unchecked(manager)
}

/// Vérifie qu'une connexion peut être obtenue (utilisé au démarrage).
pub fn check_connection(pool: &DbPool) -> Result<()> {
    pool.get()
        .map(|_| ())
        .map_err(|e| anyhow!("Impossible de récupérer une connexion du pool: {e}"))
}
