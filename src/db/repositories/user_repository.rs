use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::AccountRepository;
use crate::db::{DbPool, run_blocking};
use crate::db::error::RepositoryError;
use crate::db::models::user::{LoginAttemptState, NewUser, User};
use crate::db::schema::users;

/// Repository Postgres des comptes.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: DbPool,
}

impl PgUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, query: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, RepositoryError> + Send + 'static,
        T: Send + 'static,
    {
        run_blocking(&self.pool, query).await
    }
}

#[async_trait]
impl AccountRepository for PgUserRepository {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, RepositoryError> {
        let identifier = identifier.to_string();
        self.run(move |conn| {
            users::table
                .filter(
                    users::email
                        .eq(&identifier)
                        .or(users::username.eq(&identifier)),
                )
                .select(User::as_select())
                .first(conn)
                .optional()
                .map_err(Into::into)
        })
        .await
    }

    /// Trouver un utilisateur par ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        self.run(move |conn| {
            users::table
                .find(id)
                .select(User::as_select())
                .first(conn)
                .optional()
                .map_err(Into::into)
        })
        .await
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, RepositoryError> {
        let email = email.to_string();
        self.run(move |conn| {
            diesel::select(diesel::dsl::exists(
                users::table.filter(users::email.eq(email)),
            ))
            .get_result::<bool>(conn)
            .map_err(Into::into)
        })
        .await
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool, RepositoryError> {
        let username = username.to_string();
        self.run(move |conn| {
            diesel::select(diesel::dsl::exists(
                users::table.filter(users::username.eq(username)),
            ))
            .get_result::<bool>(conn)
            .map_err(Into::into)
        })
        .await
    }

    /// Créer un nouvel utilisateur. Les contraintes UNIQUE de la table font
    /// foi en cas d'inscriptions concurrentes.
    async fn create(&self, new_user: NewUser) -> Result<User, RepositoryError> {
        self.run(move |conn| {
            diesel::insert_into(users::table)
                .values(&new_user)
                .returning(User::as_returning())
                .get_result(conn)
                .map_err(Into::into)
        })
        .await
    }

    async fn login_state(&self, id: Uuid) -> Result<Option<LoginAttemptState>, RepositoryError> {
        self.run(move |conn| {
            users::table
                .find(id)
                .select(LoginAttemptState::as_select())
                .first(conn)
                .optional()
                .map_err(Into::into)
        })
        .await
    }

    async fn record_failure(
        &self,
        id: Uuid,
        threshold: i32,
    ) -> Result<LoginAttemptState, RepositoryError> {
        self.run(move |conn| {
            conn.transaction::<_, RepositoryError, _>(|conn| {
                // Verrou de ligne: deux échecs simultanés ne perdent pas d'incrément
                let current = users::table
                    .find(id)
                    .select(LoginAttemptState::as_select())
                    .for_update()
                    .first(conn)?;

                let now = Utc::now();
                let failed_count = current.failed_count.saturating_add(1);
                let lock_now = !current.locked && failed_count >= threshold;
                let locked_at = if lock_now { Some(now) } else { current.locked_at };

                diesel::update(users::table.find(id))
                    .set((
                        users::failed_login_count.eq(failed_count),
                        users::account_locked.eq(current.locked || lock_now),
                        users::locked_at.eq(locked_at),
                        users::updated_at.eq(now),
                    ))
                    .returning(LoginAttemptState::as_returning())
                    .get_result(conn)
                    .map_err(Into::into)
            })
        })
        .await
    }

    /// Mettre à jour le dernier login et remettre le compteur à zéro
    async fn record_success(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.run(move |conn| {
            let now = Utc::now();
            let updated = diesel::update(users::table.find(id))
                .set((
                    users::failed_login_count.eq(0),
                    users::last_login_at.eq(Some(now)),
                    users::updated_at.eq(now),
                ))
                .execute(conn)?;

            if updated == 0 {
                return Err(RepositoryError::NotFound(format!("User {id}")));
            }
            Ok(())
        })
        .await
    }

    async fn unlock(&self, id: Uuid) -> Result<bool, RepositoryError> {
        self.run(move |conn| {
            let updated = diesel::update(users::table.find(id))
                .set((
                    users::account_locked.eq(false),
                    users::locked_at.eq(None::<DateTime<Utc>>),
                    users::failed_login_count.eq(0),
                    users::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;
            Ok(updated > 0)
        })
        .await
    }
}
