use async_trait::async_trait;
use chrono::{Duration, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;

use super::{CodeCheck, CodeStore, VerificationEntry};
use crate::db::error::RepositoryError;
use crate::db::schema::verification_codes;
use crate::db::{DbPool, run_blocking};

/// Codes partagés entre toutes les instances (Lambda, plusieurs serveurs).
///
/// L'expiration est portée par `expires_at`: une ligne expirée est ignorée
/// par les lectures et retirée par `purge_expired`.
#[derive(Clone)]
pub struct PgCodeStore {
    pool: DbPool,
}

impl PgCodeStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Ligne verrouillée jusqu'à la fin de la transaction
fn lock_entry(
    conn: &mut PgConnection,
    email: &str,
) -> QueryResult<Option<VerificationEntry>> {
    verification_codes::table
        .filter(verification_codes::email.eq(email))
        .select(VerificationEntry::as_select())
        .for_update()
        .first(conn)
        .optional()
}

fn delete_entry(conn: &mut PgConnection, email: &str) -> QueryResult<usize> {
    diesel::delete(verification_codes::table.filter(verification_codes::email.eq(email)))
        .execute(conn)
}

#[async_trait]
impl CodeStore for PgCodeStore {
    async fn put(
        &self,
        email: &str,
        code: &str,
        ttl: Duration,
    ) -> Result<VerificationEntry, RepositoryError> {
        let entry = VerificationEntry::new(email, code, ttl);
        run_blocking(&self.pool, move |conn| {
            diesel::insert_into(verification_codes::table)
                .values(&entry)
                .on_conflict(verification_codes::email)
                .do_update()
                .set((
                    verification_codes::code.eq(excluded(verification_codes::code)),
                    verification_codes::attempts.eq(excluded(verification_codes::attempts)),
                    verification_codes::issued_at.eq(excluded(verification_codes::issued_at)),
                    verification_codes::expires_at.eq(excluded(verification_codes::expires_at)),
                ))
                .returning(VerificationEntry::as_returning())
                .get_result(conn)
                .map_err(Into::into)
        })
        .await
    }

    async fn get(&self, email: &str) -> Result<Option<VerificationEntry>, RepositoryError> {
        let email = email.to_string();
        run_blocking(&self.pool, move |conn| {
            verification_codes::table
                .filter(verification_codes::email.eq(&email))
                .filter(verification_codes::expires_at.gt(Utc::now()))
                .select(VerificationEntry::as_select())
                .first(conn)
                .optional()
                .map_err(Into::into)
        })
        .await
    }

    async fn remove(&self, email: &str) -> Result<(), RepositoryError> {
        let email = email.to_string();
        run_blocking(&self.pool, move |conn| {
            delete_entry(conn, &email)?;
            Ok(())
        })
        .await
    }

    async fn remove_if_code(&self, email: &str, code: &str) -> Result<bool, RepositoryError> {
        let email = email.to_string();
        let code = code.to_string();
        run_blocking(&self.pool, move |conn| {
            conn.transaction::<_, RepositoryError, _>(|conn| {
                let Some(entry) = lock_entry(conn, &email)? else {
                    return Ok(false);
                };
                if entry.is_expired_at(Utc::now()) || !entry.matches(&code) {
                    return Ok(false);
                }
                delete_entry(conn, &email)?;
                Ok(true)
            })
        })
        .await
    }

    async fn check_code(
        &self,
        email: &str,
        code: &str,
        max_attempts: i32,
    ) -> Result<CodeCheck, RepositoryError> {
        let email = email.to_string();
        let code = code.to_string();
        run_blocking(&self.pool, move |conn| {
            conn.transaction::<_, RepositoryError, _>(|conn| {
                // Verrou de ligne: deux soumissions simultanées ne perdent pas d'essai
                let Some(mut entry) = lock_entry(conn, &email)? else {
                    return Ok(CodeCheck::Expired);
                };
                if entry.is_expired_at(Utc::now()) {
                    delete_entry(conn, &email)?;
                    return Ok(CodeCheck::Expired);
                }

                let outcome = entry.attempt(&code, max_attempts);
                if outcome == CodeCheck::Invalid {
                    diesel::update(
                        verification_codes::table.filter(verification_codes::email.eq(&email)),
                    )
                    .set(verification_codes::attempts.eq(entry.attempts))
                    .execute(conn)?;
                } else {
                    delete_entry(conn, &email)?;
                }
                Ok(outcome)
            })
        })
        .await
    }

    async fn purge_expired(&self) -> Result<usize, RepositoryError> {
        run_blocking(&self.pool, |conn| {
            diesel::delete(
                verification_codes::table.filter(verification_codes::expires_at.le(Utc::now())),
            )
            .execute(conn)
            .map_err(Into::into)
        })
        .await
    }
}
