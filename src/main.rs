use std::sync::Arc;

use anyhow::Context;
use community_api::{
    AppState, Repositories,
    auth_provider::{AuthProviderState, SupabaseAuthClient},
    config::{AppConfig, Env},
    create_router,
    push::{DisabledPush, PushState, WebPushClient},
    storage::{S3StorageClient, StorageService, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let config = AppConfig::load().context("invalid configuration")?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "community_api=debug,tower_http=info".into());

    // Pretty output for humans locally, JSON for the log aggregator in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!(env = ?config.env, "application starting");

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.db_url)
        .await
        .context("failed to connect to Postgres, check DATABASE_URL")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to apply migrations")?;

    let repos = Repositories::postgres(pool);

    let s3_client = S3StorageClient::new(&config);
    if config.env == Env::Local {
        // MinIO starts empty under docker-compose.
        if let Err(e) = s3_client.ensure_bucket_exists().await {
            tracing::warn!(error = %e, "could not ensure local bucket");
        }
    }
    let storage = Arc::new(s3_client) as StorageState;

    let push: PushState = match &config.vapid {
        Some(vapid) => {
            let client = WebPushClient::new(vapid).context("invalid VAPID keys")?;
            tracing::info!("web push enabled");
            Arc::new(client)
        }
        None => {
            tracing::info!("web push disabled: VAPID keys not set");
            Arc::new(DisabledPush)
        }
    };

    let auth_provider = Arc::new(SupabaseAuthClient::new(&config)) as AuthProviderState;
    let bind_addr = config.bind_addr.clone();

    let app = create_router(AppState { repos, storage, push, auth_provider, config });

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "listening; Swagger UI at /swagger-ui");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
