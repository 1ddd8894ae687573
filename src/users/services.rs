use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::{
    api_error::{ApiError, ApiResult},
    auth::{
        jwt::JwtKeys,
        password::{hash_password, verify_password},
    },
    users::{
        dto::{LoginRequest, RegisterRequest},
        repo::UserStore,
        repo_types::{check_text_len, CreatedUser, NewUser, PublicUser, Role, UpdateUser},
    },
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Validates the payload, hashes the password and stores the user.
/// Returns the created user and a freshly signed token.
pub async fn register(
    users: &dyn UserStore,
    keys: &JwtKeys,
    payload: RegisterRequest,
) -> ApiResult<(CreatedUser, String)> {
    let name = payload.name.trim().to_string();
    let email = payload.email.trim().to_string();

    if name.is_empty() || email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Name, email and password are required".into(),
        ));
    }
    check_text_len("name", &name)?;
    check_text_len("email", &email)?;
    if !is_valid_email(&email) {
        return Err(ApiError::BadRequest("Invalid email".into()));
    }
    let role = match payload.role.as_deref() {
        None => None,
        Some(raw) => Some(
            Role::parse(raw).ok_or_else(|| ApiError::BadRequest(format!("Unknown role {raw:?}")))?,
        ),
    };

    let password = hash_password(payload.password).await?;
    let created = users
        .create(&NewUser {
            name,
            email,
            password,
            role,
        })
        .await?;

    let token = keys.sign(created.id, created.role)?;
    info!(user_id = created.id, role = created.role.as_str(), "user registered");
    Ok((created, token))
}

/// Checks credentials against the stored hash and issues a token.
pub async fn login(
    users: &dyn UserStore,
    keys: &JwtKeys,
    payload: LoginRequest,
) -> ApiResult<(PublicUser, String)> {
    let LoginRequest { email, password } = payload;
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::BadRequest("Email and password are required".into()));
    }

    let invalid = || ApiError::Unauthorized("Invalid credentials".into());

    let Some(user) = users.get_by_email(email).await? else {
        warn!(%email, "login unknown email");
        return Err(invalid());
    };

    if !verify_password(password, user.password.clone()).await? {
        warn!(user_id = user.id, "login invalid password");
        return Err(invalid());
    }

    let token = keys.sign(user.id, user.role)?;
    info!(user_id = user.id, "user logged in");
    Ok((PublicUser::from(user), token))
}

/// Turns a raw field map into a patch that is safe to store: keys are checked
/// against the allow-list, emails are syntax-checked and passwords hashed.
pub async fn prepare_patch(fields: Map<String, Value>) -> ApiResult<UpdateUser> {
    let mut patch = UpdateUser::from_fields(fields)?;
    if let Some(email) = &patch.email {
        if !is_valid_email(email) {
            return Err(ApiError::BadRequest("Invalid email".into()));
        }
    }
    if let Some(password) = patch.password.take() {
        if password.is_empty() {
            return Err(ApiError::BadRequest("Password must not be empty".into()));
        }
        patch.password = Some(hash_password(password).await?);
    }
    Ok(patch)
}
