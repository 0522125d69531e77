use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;

use crate::auth::revocation::RevocationStore;
use crate::db::error::RepositoryError;
use crate::db::schema::revoked_tokens;
use crate::db::{DbPool, run_blocking};

/// Révocations partagées entre instances: un logout vaut pour toutes.
#[derive(Clone)]
pub struct PgRevocationRepository {
    pool: DbPool,
}

impl PgRevocationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevocationStore for PgRevocationRepository {
    async fn revoke(&self, jti: &str, expires_at: i64) -> Result<bool, RepositoryError> {
        let jti = jti.to_string();
        run_blocking(&self.pool, move |conn| {
            let inserted = diesel::insert_into(revoked_tokens::table)
                .values((
                    revoked_tokens::jti.eq(&jti),
                    revoked_tokens::expires_at.eq(expires_at),
                ))
                .on_conflict_do_nothing()
                .execute(conn)?;
            Ok(inserted == 1)
        })
        .await
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, RepositoryError> {
        let jti = jti.to_string();
        run_blocking(&self.pool, move |conn| {
            diesel::select(diesel::dsl::exists(
                revoked_tokens::table.filter(revoked_tokens::jti.eq(jti)),
            ))
            .get_result::<bool>(conn)
            .map_err(Into::into)
        })
        .await
    }

    async fn purge_expired(&self) -> Result<usize, RepositoryError> {
        run_blocking(&self.pool, |conn| {
            diesel::delete(
                revoked_tokens::table.filter(revoked_tokens::expires_at.le(Utc::now().timestamp())),
            )
            .execute(conn)
            .map_err(Into::into)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::create_pool;

    fn repository() -> PgRevocationRepository {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        PgRevocationRepository::new(create_pool(&url))
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL pointing at a migrated Postgres"]
    async fn test_revoke_is_idempotent_and_visible() {
        let repo = repository();
        let jti = uuid::Uuid::new_v4().to_string();
        let exp = Utc::now().timestamp() + 600;

        assert!(repo.revoke(&jti, exp).await.unwrap());
        assert!(!repo.revoke(&jti, exp).await.unwrap());
        assert!(repo.is_revoked(&jti).await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL pointing at a migrated Postgres"]
    async fn test_purge_drops_expired_revocations() {
        let repo = repository();
        let jti = uuid::Uuid::new_v4().to_string();
        repo.revoke(&jti, Utc::now().timestamp() - 1).await.unwrap();

        assert!(repo.purge_expired().await.unwrap() >= 1);
        assert!(!repo.is_revoked(&jti).await.unwrap());
    }
}
