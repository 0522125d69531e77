pub mod connection;
pub mod error;
pub mod models;
pub mod repositories;
pub mod schema;

use diesel::PgConnection;
use diesel::r2d2::{self, ConnectionManager};

use error::RepositoryError;

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Diesel est synchrone: la requête tourne sur le pool bloquant de tokio.
pub async fn run_blocking<T, F>(pool: &DbPool, query: F) -> Result<T, RepositoryError>
where
    F: FnOnce(&mut PgConnection) -> Result<T, RepositoryError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        query(&mut conn)
    })
    .await?
}
