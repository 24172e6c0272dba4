mod catalog;
mod db;
mod measure;
mod model;
mod routes;
mod services;
mod state;
mod surface;

use std::path::PathBuf;

const DEFAULT_SNAPSHOT_FILE: &str = "groundplot-snapshot.json";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");
    let snapshot_path = std::env::var("SNAPSHOT_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SNAPSHOT_FILE));

    // Database is optional: without it the service runs offline against
    // the local snapshot only.
    let pool = match std::env::var("DATABASE_URL") {
        Ok(url) => match db::init_pool(&url).await {
            Ok(pool) => {
                tracing::info!("database pool ready; remote mirroring enabled");
                Some(pool)
            }
            Err(e) => {
                tracing::warn!(error = %e, "database unavailable — running offline");
                None
            }
        },
        Err(_) => {
            tracing::info!("DATABASE_URL not set — running offline");
            None
        }
    };

    // One-time capability probe: live provider surface or deterministic mock.
    let surface_config = surface::SurfaceConfig::from_env();
    let mounted = surface::probe_and_mount(&surface_config).await;
    tracing::info!(backend = mounted.backend(), "map surface mounted");

    let state = state::AppState::new(pool, mounted, snapshot_path);

    // Offline restarts pick up where the last snapshot left off.
    if !state.online() {
        let restored = services::persistence::load_snapshot(&state.snapshot_path).await;
        if !restored.is_empty() {
            let mut sessions = state.sessions.write().await;
            *sessions = restored;
        }
    }

    // Spawn background persistence task.
    let _persistence = services::persistence::spawn_persistence_task(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "groundplot listening");
    axum::serve(listener, app).await.expect("server failed");
}
