use crate::db::schema::users;
use budget_auth_api::UserResponse;
use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable, Selectable};
use uuid::Uuid;

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub failed_login_count: i32,
    pub account_locked: bool,
    pub locked_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// État de verrouillage porté par la ligne `users`
    pub fn login_state(&self) -> LoginAttemptState {
        LoginAttemptState {
            failed_count: self.failed_login_count,
            locked: self.account_locked,
            locked_at: self.locked_at,
            last_login_at: self.last_login_at,
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            email: user.email,
            username: user.username,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

/// Compteur d'échecs de connexion d'un compte.
///
/// `locked == true` implique que toute tentative est refusée, même avec le
/// bon mot de passe, jusqu'au déverrouillage.
#[derive(Queryable, Selectable, Debug, Clone, Copy, PartialEq, Eq)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LoginAttemptState {
    #[diesel(column_name = failed_login_count)]
    pub failed_count: i32,
    #[diesel(column_name = account_locked)]
    pub locked: bool,
    pub locked_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl LoginAttemptState {
    /// Verrou arrivé à échéance (politique avec durée)
    pub fn lock_expired(&self, lock_duration: chrono::Duration, now: DateTime<Utc>) -> bool {
        match self.locked_at {
            Some(at) => self.locked && at + lock_duration <= now,
            None => false,
        }
    }
}
