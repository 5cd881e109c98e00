//! social-autopilot service entrypoint.
//! Boots the axum HTTP server (cron triggers, dashboard, metrics) on Shuttle.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use social_autopilot::config::AutopilotConfig;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("social_autopilot=info,warn"));
    // Shuttle may already have a subscriber installed.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AutopilotConfig::load_default().map_err(shuttle_runtime::Error::Custom)?;
    let router = social_autopilot::app(cfg).map_err(shuttle_runtime::Error::Custom)?;
    tracing::info!(target: "api", "social-autopilot ready");

    Ok(router.into())
}
