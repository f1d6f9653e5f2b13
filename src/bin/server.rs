//! Phone Agent Server - HTTP control plane for the phone automation agent
//!
//! This is the entry point for the phone-agent-server binary.

use phone_agent_server::api;
use phone_agent_server::settings::Settings;
use std::env;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("phone_agent_server=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load();
    info!(
        "Agent: {} {} ({} / {})",
        settings.agent_command,
        settings.agent_args.join(" "),
        settings.provider,
        settings.model
    );
    info!("Data directory: {}", settings.data_dir.display());

    if env::var(&settings.api_key_env).map_or(true, |key| key.is_empty()) {
        warn!(
            "{} not found in environment. Tasks will fail until it is set.",
            settings.api_key_env
        );
    }

    api::serve(settings).await
}
