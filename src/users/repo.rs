use async_trait::async_trait;
use sqlx::{Executor, Postgres, QueryBuilder};
use tracing::{debug, info, instrument};

use crate::{
    db::ConnectionPool,
    error::RepoError,
    users::repo_types::{CreatedUser, NewUser, PublicUser, UpdateUser, User, UserColumn},
};

/// Data access for the `users` table.
///
/// Misses are `None` / `false`; every other failure is a [`RepoError`].
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn ensure_schema(&self) -> Result<(), RepoError>;
    async fn list_all(&self) -> Result<Vec<PublicUser>, RepoError>;
    async fn get_by_id(&self, id: i64) -> Result<Option<PublicUser>, RepoError>;
    /// Full record including the stored password. Internal use only.
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
    async fn create(&self, input: &NewUser) -> Result<CreatedUser, RepoError>;
    async fn update(&self, id: i64, patch: &UpdateUser) -> Result<bool, RepoError>;
    async fn delete(&self, id: i64) -> Result<bool, RepoError>;
    async fn count(&self) -> Result<i64, RepoError>;
}

const CREATE_ROLE_TYPE: &str = r#"
    DO $$
    BEGIN
        CREATE TYPE user_role AS ENUM ('user', 'admin');
    EXCEPTION
        WHEN duplicate_object THEN NULL;
    END
    $$;
"#;

const CREATE_USERS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id          BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
        name        VARCHAR(100) NOT NULL CHECK (name <> ''),
        email       VARCHAR(100) NOT NULL,
        password    VARCHAR(255) NOT NULL,
        role        user_role    NOT NULL DEFAULT 'user',
        created_at  TIMESTAMPTZ  NOT NULL DEFAULT now(),
        updated_at  TIMESTAMPTZ  NOT NULL DEFAULT now(),
        CONSTRAINT users_email_key UNIQUE (email)
    )
"#;

const CREATE_EMAIL_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_users_email ON users (email)";

const PUBLIC_COLUMNS: &str = "id, name, email, role, created_at";
const ALL_COLUMNS: &str = "id, name, email, password, role, created_at, updated_at";

/// Builds `UPDATE users SET col = $n, ..., updated_at = now() WHERE id = $m`.
///
/// Column names come from [`UserColumn::as_sql`]; every value is bound.
pub fn build_update_query(
    id: i64,
    patch: &UpdateUser,
) -> Result<QueryBuilder<'_, Postgres>, RepoError> {
    let columns = patch.columns();
    if columns.is_empty() {
        return Err(RepoError::NoFields);
    }

    let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET ");
    {
        let mut set = qb.separated(", ");
        for column in columns {
            set.push(column.as_sql()).push_unseparated(" = ");
            match column {
                UserColumn::Name => set.push_bind_unseparated(patch.name.as_deref()),
                UserColumn::Email => set.push_bind_unseparated(patch.email.as_deref()),
                UserColumn::Password => set.push_bind_unseparated(patch.password.as_deref()),
                UserColumn::Role => set.push_bind_unseparated(patch.role),
            };
        }
        set.push("updated_at = now()");
    }
    qb.push(" WHERE id = ").push_bind(id);
    Ok(qb)
}

/// PostgreSQL-backed [`UserStore`]. Each call checks out one pooled
/// connection and returns it when the call finishes.
#[derive(Clone, Debug)]
pub struct PgUserRepository {
    pool: ConnectionPool,
}

impl PgUserRepository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserRepository {
    #[instrument(skip(self))]
    async fn ensure_schema(&self) -> Result<(), RepoError> {
        let mut conn = self.pool.acquire().await?;
        for stmt in [CREATE_ROLE_TYPE, CREATE_USERS_TABLE, CREATE_EMAIL_INDEX] {
            conn.execute(stmt).await?;
        }
        info!("users table ready");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<PublicUser>, RepoError> {
        let mut conn = self.pool.acquire().await?;
        let query =
            format!("SELECT {PUBLIC_COLUMNS} FROM users ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query_as::<_, PublicUser>(&query)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: i64) -> Result<Option<PublicUser>, RepoError> {
        let mut conn = self.pool.acquire().await?;
        let query = format!("SELECT {PUBLIC_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, PublicUser>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let mut conn = self.pool.acquire().await?;
        let query = format!("SELECT {ALL_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    async fn create(&self, input: &NewUser) -> Result<CreatedUser, RepoError> {
        let role = input.role.unwrap_or_default();
        let mut conn = self.pool.acquire().await?;
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO users (name, email, password, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.password)
        .bind(role)
        .fetch_one(&mut *conn)
        .await?;

        debug!(user_id = id, "user inserted");
        Ok(CreatedUser {
            id,
            name: input.name.clone(),
            email: input.email.clone(),
            role,
        })
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, id: i64, patch: &UpdateUser) -> Result<bool, RepoError> {
        let mut qb = build_update_query(id, patch)?;
        let mut conn = self.pool.acquire().await?;
        let result = qb.build().execute(&mut *conn).await?;
        debug!(rows = result.rows_affected(), "user update executed");
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn count(&self) -> Result<i64, RepoError> {
        let mut conn = self.pool.acquire().await?;
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *conn)
            .await?;
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::Role;

    #[test]
    fn update_sql_lists_only_patched_columns() {
        let patch = UpdateUser {
            name: Some("Bea".into()),
            role: Some(Role::Admin),
            ..Default::default()
        };
        let qb = build_update_query(7, &patch).unwrap();
        assert_eq!(
            qb.sql(),
            "UPDATE users SET name = $1, role = $2, updated_at = now() WHERE id = $3"
        );
    }

    #[test]
    fn update_sql_binds_values_instead_of_inlining_them() {
        let patch = UpdateUser {
            email: Some("x'; DROP TABLE users; --".into()),
            password: Some("hash".into()),
            ..Default::default()
        };
        let qb = build_update_query(1, &patch).unwrap();
        let sql = qb.sql();
        assert_eq!(
            sql,
            "UPDATE users SET email = $1, password = $2, updated_at = now() WHERE id = $3"
        );
        assert!(!sql.contains("DROP"));
    }

    #[test]
    fn empty_patch_is_rejected_before_any_sql() {
        assert!(matches!(
            build_update_query(1, &UpdateUser::default()),
            Err(RepoError::NoFields)
        ));
    }
}
