use thiserror::Error;

/// PostgreSQL SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL SQLSTATE for `check_violation`.
const CHECK_VIOLATION: &str = "23514";
/// PostgreSQL SQLSTATE for `string_data_right_truncation` ("value too long").
const VALUE_TOO_LONG: &str = "22001";

/// Failure modes of the user repository.
///
/// Lookup misses are not errors: they come back as `None` or `false`.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The pool could not hand out a connection or the transport broke.
    #[error("database connection error: {0}")]
    Connection(#[source] sqlx::Error),

    /// A unique constraint rejected the write.
    #[error("duplicate value for unique key {constraint}")]
    DuplicateKey { constraint: String },

    /// `update` was called with nothing to change.
    #[error("no fields to update")]
    NoFields,

    /// A field name is not one of the updatable columns.
    #[error("field `{0}` cannot be updated")]
    UnknownField(String),

    /// A field value has the wrong type or shape.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => RepoError::Connection(err),
            sqlx::Error::Database(ref db_err)
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                RepoError::DuplicateKey {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                }
            }
            sqlx::Error::Database(ref db_err)
                if db_err.code().as_deref() == Some(CHECK_VIOLATION) =>
            {
                RepoError::InvalidField {
                    field: db_err.constraint().unwrap_or("unknown").to_string(),
                    reason: "violates check constraint".into(),
                }
            }
            sqlx::Error::Database(ref db_err)
                if db_err.code().as_deref() == Some(VALUE_TOO_LONG) =>
            {
                RepoError::InvalidField {
                    field: "value".into(),
                    reason: db_err.message().to_string(),
                }
            }
            other => RepoError::Database(other),
        }
    }
}
