use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::{
    api_error::{ApiError, ApiResult},
    auth::jwt::JwtKeys,
    extract::{ApiJson, ApiPath},
    state::AppState,
    users::{
        dto::{ApiResponse, LoginRequest, RegisterRequest},
        repo_types::{CreatedUser, PublicUser},
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/", get(list_users))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".into())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<CreatedUser>>)> {
    let keys = JwtKeys::from_ref(&state);
    let (user, token) = services::register(state.users.as_ref(), &keys, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(
            ApiResponse::data(user)
                .with_message("User registered successfully")
                .with_token(token),
        ),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<Json<ApiResponse<PublicUser>>> {
    let keys = JwtKeys::from_ref(&state);
    let (user, token) = services::login(state.users.as_ref(), &keys, payload).await?;
    Ok(Json(
        ApiResponse::data(user)
            .with_message("Login successful")
            .with_token(token),
    ))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<PublicUser>>>> {
    let users = state.users.list_all().await?;
    Ok(Json(ApiResponse::data(users)))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<ApiResponse<PublicUser>>> {
    let user = state.users.get_by_id(id).await?.ok_or_else(user_not_found)?;
    Ok(Json(ApiResponse::data(user)))
}

#[instrument(skip(state, fields))]
pub async fn update_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(fields): ApiJson<Map<String, Value>>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let patch = services::prepare_patch(fields).await?;
    if !state.users.update(id, &patch).await? {
        return Err(user_not_found());
    }
    info!(user_id = id, "user updated");
    Ok(Json(ApiResponse::message("User updated successfully")))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<ApiResponse<()>>> {
    if !state.users.delete(id).await? {
        return Err(user_not_found());
    }
    info!(user_id = id, "user deleted");
    Ok(Json(ApiResponse::message("User deleted successfully")))
}
