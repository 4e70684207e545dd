//! Process-owned user store.
//!
//! One `RwLock` guards both the records and the id counter, so every
//! mutation (including its email check) is a single critical section.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;

use crate::contract::model::{NewUser, User, UserUpdate};
use crate::domain::repo::{RepoError, UsersRepository};

#[derive(Debug)]
struct Inner {
    users: BTreeMap<i64, User>,
    /// Never decremented, so ids of deleted users are not reused.
    next_id: i64,
}

impl Inner {
    fn email_taken(&self, email: &str, exclude_id: Option<i64>) -> bool {
        let key = email_key(email);
        self.users
            .values()
            .any(|u| Some(u.id) != exclude_id && email_key(&u.email) == key)
    }
}

/// Emails are compared by their Unicode lowercase form, so `ÉXAMPLE` and `éxample` collide.
fn email_key(email: &str) -> String {
    email.to_lowercase()
}

#[derive(Debug)]
pub struct InMemoryUsersRepository {
    inner: RwLock<Inner>,
}

impl Default for InMemoryUsersRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUsersRepository {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                users: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Store pre-filled with Alice, Bob (active) and Charlie (inactive); next id is 4.
    pub fn with_demo_users() -> Self {
        let now = Utc::now();
        let demo = [
            (1, "Alice Smith", "alice@techhive.com", 30, 1, true),
            (2, "Bob Johnson", "bob@techhive.com", 20, 2, true),
            (3, "Charlie Brown", "charlie@techhive.com", 10, 3, false),
        ];

        let users = demo
            .into_iter()
            .map(|(id, name, email, created_days_ago, updated_days_ago, is_active)| {
                let user = User {
                    id,
                    name: name.to_string(),
                    email: email.to_string(),
                    created_at: now - Duration::days(created_days_ago),
                    updated_at: now - Duration::days(updated_days_ago),
                    is_active,
                };
                (id, user)
            })
            .collect();

        Self {
            inner: RwLock::new(Inner { users, next_id: 4 }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UsersRepository for InMemoryUsersRepository {
    async fn list(&self) -> anyhow::Result<Vec<User>> {
        Ok(self.inner.read().users.values().cloned().collect())
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        Ok(self.inner.read().users.get(&id).cloned())
    }

    async fn email_exists(&self, email: &str, exclude_id: Option<i64>) -> anyhow::Result<bool> {
        Ok(self.inner.read().email_taken(email, exclude_id))
    }

    async fn insert(&self, new_user: NewUser) -> Result<User, RepoError> {
        let mut inner = self.inner.write();
        if inner.email_taken(&new_user.email, None) {
            return Err(RepoError::EmailTaken(new_user.email));
        }

        let id = inner.next_id;
        inner.next_id += 1;

        let now = Utc::now();
        let user = User {
            id,
            name: new_user.name,
            email: new_user.email,
            created_at: now,
            updated_at: now,
            is_active: true,
        };
        inner.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: i64, changes: UserUpdate) -> Result<Option<User>, RepoError> {
        let mut inner = self.inner.write();
        if !inner.users.contains_key(&id) {
            return Ok(None);
        }
        if inner.email_taken(&changes.email, Some(id)) {
            return Err(RepoError::EmailTaken(changes.email));
        }

        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(None);
        };
        user.name = changes.name;
        user.email = changes.email;
        user.is_active = changes.is_active;
        // Demo records may carry an `updated_at` set in the past; never move it backwards.
        user.updated_at = Utc::now().max(user.updated_at);
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        Ok(self.inner.write().users.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn demo_seed_matches_expected_records() {
        let repo = InMemoryUsersRepository::with_demo_users();
        let users = repo.list().await.unwrap();

        let names: Vec<_> = users.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["Alice Smith", "Bob Johnson", "Charlie Brown"]);
        assert!(users[0].is_active && users[1].is_active && !users[2].is_active);
        assert!(users.iter().all(|u| u.created_at <= u.updated_at));

        let created = repo.insert(new_user("Dana Lee", "dana@x.com")).await.unwrap();
        assert_eq!(created.id, 4);
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let repo = InMemoryUsersRepository::new();
        let a = repo.insert(new_user("Ann", "a@x.com")).await.unwrap();
        let b = repo.insert(new_user("Ben", "b@x.com")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        assert!(repo.delete(b.id).await.unwrap());
        let c = repo.insert(new_user("Cat", "c@x.com")).await.unwrap();
        assert_eq!(c.id, 3);
        assert!(repo.find_by_id(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_email_ignoring_case() {
        let repo = InMemoryUsersRepository::new();
        repo.insert(new_user("Ann", "ann@x.com")).await.unwrap();

        let err = repo
            .insert(new_user("Other Ann", "ANN@X.COM"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::EmailTaken(e) if e == "ANN@X.COM"));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_check_folds_non_ascii_case() {
        let repo = InMemoryUsersRepository::new();
        repo.insert(new_user("Ann", "ann@ÉXAMPLE.com")).await.unwrap();

        assert!(repo.email_exists("ann@éxample.com", None).await.unwrap());
        let err = repo
            .insert(new_user("Other Ann", "ann@éxample.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::EmailTaken(_)));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn email_exists_can_exclude_a_record() {
        let repo = InMemoryUsersRepository::with_demo_users();
        assert!(repo.email_exists("Alice@TechHive.com", None).await.unwrap());
        assert!(!repo.email_exists("alice@techhive.com", Some(1)).await.unwrap());
        assert!(repo.email_exists("alice@techhive.com", Some(2)).await.unwrap());
    }

    #[tokio::test]
    async fn update_keeps_own_email_and_refreshes_timestamp() {
        let repo = InMemoryUsersRepository::with_demo_users();
        let before = repo.find_by_id(3).await.unwrap().unwrap();

        let updated = repo
            .update(
                3,
                UserUpdate {
                    name: "Charles Brown".into(),
                    email: "CHARLIE@techhive.com".into(),
                    is_active: true,
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.id, 3);
        assert_eq!(updated.created_at, before.created_at);
        assert!(updated.updated_at >= before.updated_at);
        assert!(updated.is_active);
    }

    #[tokio::test]
    async fn update_rejects_email_of_another_user() {
        let repo = InMemoryUsersRepository::with_demo_users();
        let err = repo
            .update(
                2,
                UserUpdate {
                    name: "Bob Johnson".into(),
                    email: "alice@techhive.com".into(),
                    is_active: true,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::EmailTaken(_)));
    }

    #[tokio::test]
    async fn update_and_delete_of_unknown_id() {
        let repo = InMemoryUsersRepository::new();
        let res = repo
            .update(
                42,
                UserUpdate {
                    name: "Nobody".into(),
                    email: "n@x.com".into(),
                    is_active: false,
                },
            )
            .await
            .unwrap();
        assert!(res.is_none());
        assert!(!repo.delete(42).await.unwrap());
        assert!(repo.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_get_distinct_ids() {
        let repo = std::sync::Arc::new(InMemoryUsersRepository::new());
        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    repo.insert(new_user("User", &format!("u{i}@x.com")))
                        .await
                        .unwrap()
                        .id
                })
            })
            .collect();

        let mut ids = Vec::new();
        for t in tasks {
            ids.push(t.await.unwrap());
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 32);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicate_email_inserts_only_one() {
        let repo = std::sync::Arc::new(InMemoryUsersRepository::new());
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.insert(new_user("Same", "same@x.com")).await.is_ok() })
            })
            .collect();

        let mut ok = 0;
        for t in tasks {
            if t.await.unwrap() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(repo.len(), 1);
    }
}
