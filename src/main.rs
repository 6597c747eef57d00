//! Folio auth server
//!
//! Wires the auth routes to PostgreSQL and Redis.

use folio_auth::{app, AuthConfig, AuthService, PgUserRepository, RedisSessionStore, ServerConfig};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio_auth=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AuthConfig::from_env()?;
    config.validate()?;
    let server = ServerConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(server.database_max_connections)
        .connect(&server.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;

    let users = PgUserRepository::new(pool);
    users.run_migrations().await?;

    let sessions = RedisSessionStore::connect(&server.redis_url)
        .await
        .context("failed to connect to Redis")?;

    let auth = Arc::new(AuthService::new(config, Arc::new(users), Arc::new(sessions))?);

    let listener = tokio::net::TcpListener::bind(&server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", server.bind_addr))?;
    tracing::info!("Listening on {}", server.bind_addr);

    axum::serve(listener, app(auth)).await?;
    Ok(())
}
