use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{CodeCheck, CodeStore, VerificationEntry};
use crate::db::error::RepositoryError;

/// Code store en mémoire du processus. Perdu au redémarrage: l'utilisateur
/// redemande simplement un code. Ne convient qu'à une instance unique.
#[derive(Debug, Default)]
pub struct InMemoryCodeStore {
    entries: DashMap<String, VerificationEntry>,
}

impl InMemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait]
impl CodeStore for InMemoryCodeStore {
    async fn put(
        &self,
        email: &str,
        code: &str,
        ttl: Duration,
    ) -> Result<VerificationEntry, RepositoryError> {
        let entry = VerificationEntry::new(email, code, ttl);
        self.entries.insert(email.to_string(), entry.clone());
        Ok(entry)
    }

    async fn get(&self, email: &str) -> Result<Option<VerificationEntry>, RepositoryError> {
        let now = Utc::now();
        // remove_if tient le verrou du shard: pas de course avec un put concurrent
        if self
            .entries
            .remove_if(email, |_, entry| entry.is_expired_at(now))
            .is_some()
        {
            return Ok(None);
        }
        Ok(self
            .entries
            .get(email)
            .map(|entry| entry.value().clone())
            .filter(|entry| !entry.is_expired_at(now)))
    }

    async fn remove(&self, email: &str) -> Result<(), RepositoryError> {
        self.entries.remove(email);
        Ok(())
    }

    async fn remove_if_code(&self, email: &str, code: &str) -> Result<bool, RepositoryError> {
        let now = Utc::now();
        Ok(self
            .entries
            .remove_if(email, |_, entry| entry.matches(code) && !entry.is_expired_at(now))
            .is_some())
    }

    async fn check_code(
        &self,
        email: &str,
        code: &str,
        max_attempts: i32,
    ) -> Result<CodeCheck, RepositoryError> {
        let now = Utc::now();
        // L'entrée reste verrouillée du contrôle jusqu'à l'écriture du compteur
        let Entry::Occupied(mut slot) = self.entries.entry(email.to_string()) else {
            return Ok(CodeCheck::Expired);
        };
        if slot.get().is_expired_at(now) {
            slot.remove();
            return Ok(CodeCheck::Expired);
        }

        let outcome = slot.get_mut().attempt(code, max_attempts);
        if outcome != CodeCheck::Invalid {
            slot.remove();
        }
        Ok(outcome)
    }

    async fn purge_expired(&self) -> Result<usize, RepositoryError> {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        Ok(before.saturating_sub(self.entries.len()))
    }
}
