//! Behaviour that depends on `APP_ENV`: 5xx bodies and the health report.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use common::{body_json, build_app_with, get};
use userhub::{
    config::AppConfig,
    error::RepoError,
    state::AppState,
    users::{
        repo::UserStore,
        repo_types::{CreatedUser, NewUser, PublicUser, UpdateUser, User},
    },
};

/// Every call fails as if the database had gone away mid-query.
struct BrokenStore;

fn broken() -> RepoError {
    RepoError::Database(sqlx::Error::Protocol("relation \"users\" vanished".into()))
}

#[async_trait]
impl UserStore for BrokenStore {
    async fn ensure_schema(&self) -> Result<(), RepoError> {
        Err(broken())
    }
    async fn list_all(&self) -> Result<Vec<PublicUser>, RepoError> {
        Err(broken())
    }
    async fn get_by_id(&self, _id: i64) -> Result<Option<PublicUser>, RepoError> {
        Err(broken())
    }
    async fn get_by_email(&self, _email: &str) -> Result<Option<User>, RepoError> {
        Err(broken())
    }
    async fn create(&self, _input: &NewUser) -> Result<CreatedUser, RepoError> {
        Err(broken())
    }
    async fn update(&self, _id: i64, _patch: &UpdateUser) -> Result<bool, RepoError> {
        Err(broken())
    }
    async fn delete(&self, _id: i64) -> Result<bool, RepoError> {
        Err(broken())
    }
    async fn count(&self) -> Result<i64, RepoError> {
        Err(broken())
    }
}

fn app_in(environment: &str) -> axum::Router {
    let mut config: AppConfig = AppState::in_memory().config.as_ref().clone();
    config.environment = environment.into();
    build_app_with(AppState::from_parts(Arc::new(BrokenStore), Arc::new(config)))
}

#[tokio::test]
async fn production_hides_server_error_detail() {
    let app = app_in("production");
    let res = get(&app, "/api/v1/users").await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(res).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Internal Server Error");
    assert!(json.get("stack").is_none());
}

#[tokio::test]
async fn development_includes_the_error_chain() {
    let app = app_in("development");
    let res = get(&app, "/api/v1/users/1").await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(res).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Internal Server Error");
    assert!(json["stack"].as_str().unwrap().contains("vanished"));
}

#[tokio::test]
async fn development_leaves_client_errors_alone() {
    let app = app_in("development");
    let json = body_json(get(&app, "/api/v1/users/abc").await).await;
    assert_eq!(json["success"], false);
    assert!(json.get("stack").is_none());
}

#[tokio::test]
async fn health_reports_the_environment() {
    for env in ["production", "development"] {
        let json = body_json(get(&app_in(env), "/health").await).await;
        assert_eq!(json["environment"], env);
    }
}
