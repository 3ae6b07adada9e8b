//! In-memory user store.
//!
//! Used by tests and for running the service without a database. Enforces the
//! same unique-email constraint as the `users` table.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use driphub_core::{Email, UserId};

use super::{RepositoryError, UserStore};
use crate::models::{NewUser, User};

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    by_email: HashMap<String, UserId>,
    next_id: i32,
}

/// Thread-safe in-memory `UserStore`.
#[derive(Default)]
pub struct InMemoryUserStore {
    inner: RwLock<Inner>,
    inserts: AtomicUsize,
}

impl InMemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful inserts since creation.
    #[must_use]
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let inner = self.inner.read();
        Ok(inner
            .by_email
            .get(email.as_str())
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.inner.read().users.get(&id).cloned())
    }

    async fn insert(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let mut inner = self.inner.write();
        if inner.by_email.contains_key(user.email.as_str()) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        inner.next_id += 1;
        let id = UserId::new(inner.next_id);
        let row = User {
            id,
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            is_active: true,
            is_superuser: user.is_superuser,
            created_at: Utc::now(),
        };
        inner.by_email.insert(user.email.as_str().to_owned(), id);
        inner.users.insert(id, row.clone());
        drop(inner);

        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(row)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
