use userhub::{
    app,
    config::{self, AppConfig},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "userhub=debug,axum=info,tower_http=info".to_string());
    let json_logs = config::json_logs(
        std::env::var("APP_ENV").ok().as_deref(),
        std::env::var("LOG_FORMAT").ok().as_deref(),
    );

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    tracing::info!(environment = %config.environment, "configuration loaded");
    let (state, pool) = match AppState::init(config.clone()).await {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = ?e, "startup failed");
            return Err(e);
        }
    };

    let app = app::build_app(state)?;
    app::serve(app, &config).await?;

    pool.close().await;
    Ok(())
}
