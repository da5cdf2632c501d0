// mediadrop server binary

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use mediadrop_server::attachment::{AttachmentConfig, AttachmentStore};
use mediadrop_server::{create_router, db, AppState, ItemStore, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mediadrop_server=info,tower_http=info")),
        )
        .init();

    let config = ServerConfig::from_env()?;

    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    let attachments =
        AttachmentStore::new(AttachmentConfig::picture(&config.hash_secret), &config.media_root);
    let state = AppState::new(ItemStore::new(pool, attachments), &config.public_dir)
        .with_max_upload_bytes(config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!(
        addr = %config.bind_addr,
        media_root = %config.media_root.display(),
        "mediadrop server listening"
    );

    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
