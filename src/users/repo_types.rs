use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::error::RepoError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Full row as stored. Only the by-email lookup hands this out.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String, // argon2 PHC string when written through the API
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Projection returned by list and get-by-id. Has no password field at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct PublicUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            role: u.role,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

/// What `create` echoes back: the new id plus the non-secret input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Character limit of the `name` and `email` columns (`VARCHAR(100)`).
pub const MAX_TEXT_LEN: usize = 100;

/// Rejects values the `VARCHAR(100)` columns would refuse.
pub fn check_text_len(field: &str, value: &str) -> Result<(), RepoError> {
    let len = value.chars().count();
    if len > MAX_TEXT_LEN {
        return Err(RepoError::InvalidField {
            field: field.to_string(),
            reason: format!("must be at most {MAX_TEXT_LEN} characters, got {len}"),
        });
    }
    Ok(())
}

/// Columns a partial update may touch. These names are the only identifiers
/// ever spliced into UPDATE text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserColumn {
    Name,
    Email,
    Password,
    Role,
}

impl UserColumn {
    pub const UPDATABLE: [UserColumn; 4] = [
        UserColumn::Name,
        UserColumn::Email,
        UserColumn::Password,
        UserColumn::Role,
    ];

    pub fn as_sql(&self) -> &'static str {
        match self {
            UserColumn::Name => "name",
            UserColumn::Email => "email",
            UserColumn::Password => "password",
            UserColumn::Role => "role",
        }
    }

    pub fn from_field(field: &str) -> Option<Self> {
        Self::UPDATABLE
            .into_iter()
            .find(|col| col.as_sql() == field)
    }
}

/// A set of field changes. `None` means "leave the column alone".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

impl UpdateUser {
    /// Converts a caller-supplied field map into a patch, checking every key
    /// against [`UserColumn::UPDATABLE`]. `id` is skipped and `null` counts
    /// as absent. `name` and `email` are trimmed.
    pub fn from_fields(fields: Map<String, Value>) -> Result<Self, RepoError> {
        let mut patch = UpdateUser::default();
        for (key, value) in fields {
            if key == "id" || value.is_null() {
                continue;
            }
            let column =
                UserColumn::from_field(&key).ok_or_else(|| RepoError::UnknownField(key.clone()))?;
            let text = match value {
                Value::String(s) => s,
                other => {
                    return Err(RepoError::InvalidField {
                        field: key,
                        reason: format!("expected a string, got {other}"),
                    })
                }
            };
            match column {
                UserColumn::Name => {
                    let name = text.trim();
                    if name.is_empty() {
                        return Err(RepoError::InvalidField {
                            field: key,
                            reason: "must not be empty".into(),
                        });
                    }
                    check_text_len(&key, name)?;
                    patch.name = Some(name.to_string());
                }
                UserColumn::Email => {
                    let email = text.trim();
                    check_text_len(&key, email)?;
                    patch.email = Some(email.to_string());
                }
                UserColumn::Password => patch.password = Some(text),
                UserColumn::Role => {
                    let role = Role::parse(&text).ok_or_else(|| RepoError::InvalidField {
                        field: key.clone(),
                        reason: format!("unknown role {text:?}"),
                    })?;
                    patch.role = Some(role);
                }
            }
        }
        Ok(patch)
    }

    /// Columns this patch touches, in a fixed order.
    pub fn columns(&self) -> Vec<UserColumn> {
        let mut cols = Vec::with_capacity(4);
        if self.name.is_some() {
            cols.push(UserColumn::Name);
        }
        if self.email.is_some() {
            cols.push(UserColumn::Email);
        }
        if self.password.is_some() {
            cols.push(UserColumn::Password);
        }
        if self.role.is_some() {
            cols.push(UserColumn::Role);
        }
        cols
    }

    pub fn is_empty(&self) -> bool {
        self.columns().is_empty()
    }

    /// Applies the patch to an in-memory row.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(password) = &self.password {
            user.password = password.clone();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
    }
}
