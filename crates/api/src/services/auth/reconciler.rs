//! Shadow users for delegated identities.

use std::sync::Arc;

use driphub_core::Email;

use crate::db::{RepositoryError, UserStore};
use crate::models::{NewUser, User};

/// Maps a provider-verified email to a local user row, creating it on first
/// sight.
#[derive(Clone)]
pub struct ShadowUserReconciler {
    users: Arc<dyn UserStore>,
}

impl ShadowUserReconciler {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Return the user for `email`, inserting a passwordless row if none
    /// exists.
    ///
    /// A unique-constraint conflict on insert means a concurrent request
    /// created the row first; the winner's row is re-selected and returned.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` on database failure, or `DataCorruption` if
    /// the row vanished between the conflict and the re-select.
    pub async fn get_or_create(&self, email: &Email) -> Result<User, RepositoryError> {
        if let Some(user) = self.users.find_by_email(email).await? {
            return Ok(user);
        }

        match self.users.insert(&NewUser::shadow(email.clone())).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, email = %email, "Created shadow user");
                Ok(user)
            }
            Err(RepositoryError::Conflict(_)) => {
                tracing::debug!(email = %email, "Shadow user created concurrently, re-selecting");
                self.users.find_by_email(email).await?.ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "user {email} conflicted on insert but is not selectable"
                    ))
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use driphub_core::UserId;

    use super::*;
    use crate::db::InMemoryUserStore;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_sequential_calls_insert_once() {
        let store = Arc::new(InMemoryUserStore::new());
        let reconciler = ShadowUserReconciler::new(store.clone());

        let first = reconciler.get_or_create(&email("new@x.com")).await.unwrap();
        let second = reconciler.get_or_create(&email("new@x.com")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.insert_count(), 1);
        assert!(!first.has_password());
        assert!(first.is_active);
        assert!(!first.is_superuser);
    }

    #[tokio::test]
    async fn test_existing_row_is_returned_untouched() {
        let store = Arc::new(InMemoryUserStore::new());
        let existing = store
            .insert(&NewUser::with_password(email("a@x.com"), "hash".into()))
            .await
            .unwrap();
        let reconciler = ShadowUserReconciler::new(store.clone());

        let user = reconciler.get_or_create(&email("a@x.com")).await.unwrap();
        assert_eq!(user, existing);
        assert_eq!(store.insert_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_calls_agree_on_one_row() {
        let store = Arc::new(InMemoryUserStore::new());
        let reconciler = ShadowUserReconciler::new(store.clone());
        let target = email("race@x.com");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reconciler = reconciler.clone();
                let target = target.clone();
                tokio::spawn(async move { reconciler.get_or_create(&target).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }

        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(store.len(), 1);
    }

    /// Store whose first lookup misses even though another writer already
    /// holds the row, forcing the insert-conflict path.
    struct LostRaceStore {
        inner: InMemoryUserStore,
        hide_once: AtomicBool,
    }

    #[async_trait]
    impl UserStore for LostRaceStore {
        async fn find_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
            if self.hide_once.swap(false, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_by_email(email).await
        }

        async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
            self.inner.find_by_id(id).await
        }

        async fn insert(&self, user: &NewUser) -> Result<User, RepositoryError> {
            self.inner.insert(user).await
        }

        async fn ping(&self) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_lost_race_returns_winner_row() {
        let inner = InMemoryUserStore::new();
        let winner = inner.insert(&NewUser::shadow(email("race@x.com"))).await.unwrap();
        let store = Arc::new(LostRaceStore {
            inner,
            hide_once: AtomicBool::new(true),
        });
        let reconciler = ShadowUserReconciler::new(store.clone());

        let user = reconciler.get_or_create(&email("race@x.com")).await.unwrap();

        assert_eq!(user.id, winner.id);
        assert_eq!(store.inner.len(), 1);
    }
}
