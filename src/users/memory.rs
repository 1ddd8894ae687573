use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    error::RepoError,
    users::{
        repo::UserStore,
        repo_types::{check_text_len, CreatedUser, NewUser, PublicUser, UpdateUser, User},
    },
};

#[derive(Debug, Default)]
struct Table {
    last_id: i64,
    rows: Vec<User>,
}

/// [`UserStore`] kept in process memory. Mirrors the PostgreSQL behaviour
/// (identity ids, unique email, newest-first listing) for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    table: Mutex<Table>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn duplicate_email() -> RepoError {
    RepoError::DuplicateKey {
        constraint: "users_email_key".into(),
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn ensure_schema(&self) -> Result<(), RepoError> {
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<PublicUser>, RepoError> {
        let table = self.lock();
        let mut rows: Vec<PublicUser> = table.rows.iter().cloned().map(PublicUser::from).collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<PublicUser>, RepoError> {
        let table = self.lock();
        Ok(table
            .rows
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .map(PublicUser::from))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let table = self.lock();
        Ok(table.rows.iter().find(|u| u.email == email).cloned())
    }

    async fn create(&self, input: &NewUser) -> Result<CreatedUser, RepoError> {
        check_text_len("name", &input.name)?;
        check_text_len("email", &input.email)?;
        if input.name.is_empty() {
            return Err(RepoError::InvalidField {
                field: "name".into(),
                reason: "must not be empty".into(),
            });
        }
        let mut table = self.lock();
        if table.rows.iter().any(|u| u.email == input.email) {
            return Err(duplicate_email());
        }

        table.last_id += 1;
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: table.last_id,
            name: input.name.clone(),
            email: input.email.clone(),
            password: input.password.clone(),
            role: input.role.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        let created = CreatedUser {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        };
        table.rows.push(user);
        Ok(created)
    }

    async fn update(&self, id: i64, patch: &UpdateUser) -> Result<bool, RepoError> {
        if patch.is_empty() {
            return Err(RepoError::NoFields);
        }
        let mut table = self.lock();
        let Some(pos) = table.rows.iter().position(|u| u.id == id) else {
            return Ok(false);
        };
        if let Some(name) = &patch.name {
            check_text_len("name", name)?;
        }
        if let Some(email) = &patch.email {
            check_text_len("email", email)?;
            if table.rows.iter().any(|u| u.id != id && &u.email == email) {
                return Err(duplicate_email());
            }
        }
        let user = &mut table.rows[pos];
        patch.apply_to(user);
        user.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        let mut table = self.lock();
        let before = table.rows.len();
        table.rows.retain(|u| u.id != id);
        Ok(table.rows.len() < before)
    }

    async fn count(&self) -> Result<i64, RepoError> {
        Ok(self.lock().rows.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::users::repo_types::Role;

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.into(),
            email: email.into(),
            password: "p".into(),
            role: None,
        }
    }

    #[tokio::test]
    async fn create_defaults_role_and_counts() {
        let store = MemoryUserStore::new();
        let before = store.count().await.unwrap();

        let created = store.create(&new_user("Ann", "ann@x.com")).await.unwrap();
        assert_eq!(created.role, Role::User);
        assert_eq!(store.count().await.unwrap(), before + 1);

        let full = store.get_by_email("ann@x.com").await.unwrap().unwrap();
        assert_eq!(full.password, "p");
        assert_eq!(full.id, created.id);
    }

    #[tokio::test]
    async fn ids_are_fresh_and_never_reused() {
        let store = MemoryUserStore::new();
        let a = store.create(&new_user("A", "a@x.com")).await.unwrap();
        assert!(store.delete(a.id).await.unwrap());
        let b = store.create(&new_user("B", "b@x.com")).await.unwrap();
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn duplicate_email_adds_no_row() {
        let store = MemoryUserStore::new();
        store.create(&new_user("A", "dup@x.com")).await.unwrap();
        let err = store.create(&new_user("B", "dup@x.com")).await.unwrap_err();
        assert!(matches!(err, RepoError::DuplicateKey { .. }));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_touches_only_named_fields() {
        let store = MemoryUserStore::new();
        let created = store.create(&new_user("Ann", "ann@x.com")).await.unwrap();
        let before = store.get_by_email("ann@x.com").await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let patch = UpdateUser {
            role: Some(Role::Admin),
            ..Default::default()
        };
        assert!(store.update(created.id, &patch).await.unwrap());

        let after = store.get_by_email("ann@x.com").await.unwrap().unwrap();
        assert_eq!(after.role, Role::Admin);
        assert_eq!(after.name, before.name);
        assert_eq!(after.password, before.password);
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at > before.updated_at);
    }

    #[tokio::test]
    async fn empty_update_fails_and_changes_nothing() {
        let store = MemoryUserStore::new();
        let created = store.create(&new_user("Ann", "ann@x.com")).await.unwrap();
        let before = store.get_by_email("ann@x.com").await.unwrap().unwrap();

        let err = store.update(created.id, &UpdateUser::default()).await.unwrap_err();
        assert!(matches!(err, RepoError::NoFields));

        let after = store.get_by_email("ann@x.com").await.unwrap().unwrap();
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_rows() {
        let store = MemoryUserStore::new();
        let patch = UpdateUser {
            name: Some("Ghost".into()),
            ..Default::default()
        };
        assert!(!store.update(404, &patch).await.unwrap());
        assert!(!store.delete(404).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_of_missing_row_wins_over_taken_email() {
        let store = MemoryUserStore::new();
        store.create(&new_user("A", "a@x.com")).await.unwrap();
        let patch = UpdateUser {
            email: Some("a@x.com".into()),
            ..Default::default()
        };
        assert!(!store.update(404, &patch).await.unwrap());
    }

    #[tokio::test]
    async fn oversized_values_are_invalid_fields() {
        let store = MemoryUserStore::new();
        let err = store
            .create(&new_user(&"x".repeat(101), "ann@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidField { ref field, .. } if field == "name"));
        assert_eq!(store.count().await.unwrap(), 0);

        let created = store.create(&new_user("Ann", "ann@x.com")).await.unwrap();
        let patch = UpdateUser {
            email: Some(format!("{}@x.com", "e".repeat(200))),
            ..Default::default()
        };
        let err = store.update(created.id, &patch).await.unwrap_err();
        assert!(matches!(err, RepoError::InvalidField { ref field, .. } if field == "email"));
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = MemoryUserStore::new();
        store.create(&new_user("First", "1@x.com")).await.unwrap();
        store.create(&new_user("Second", "2@x.com")).await.unwrap();
        let names: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["Second", "First"]);
    }
}
