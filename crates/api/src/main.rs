use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use intervue_api::{build_router, state::AppState};
use intervue_config::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,intervue=debug")),
        )
        .init();

    let settings = Settings::load().context("failed to load settings")?;

    let client = mongodb::Client::with_uri_str(&settings.mongo.uri)
        .await
        .context("failed to create MongoDB client")?;
    let db = client.database(&settings.mongo.database);

    if let Err(e) = intervue_db::ensure_indexes(&db).await {
        warn!(%e, "Index bootstrap failed; continuing without");
    }

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let state = AppState::new(settings, &db);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Interview API listening");

    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}
