//! Router, shared state and the server entry point.

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::handlers;
use crate::adb::{AdbBridge, DeviceBridge};
use crate::agent::AgentFactory;
use crate::narration::{NotifierRef, SilentNotifier, SpeechNotifier};
use crate::orchestrator::Orchestrator;
use crate::settings::Settings;
use crate::storage::{BestEffortStore, CommandHistory, GuideLibrary, MacroLibrary, NoteStore};

/// Shared application state.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub macros: MacroLibrary,
    pub guides: GuideLibrary,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, store: BestEffortStore) -> Self {
        Self {
            orchestrator,
            macros: MacroLibrary::new(store.clone()),
            guides: GuideLibrary::new(store),
        }
    }

    /// Wire up the production collaborators described by `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        let store = BestEffortStore::new(settings.data_dir.clone());
        let notes = NoteStore::new(store.clone());

        let mut adb = AdbBridge::with_path(settings.adb_path.clone());
        if let Some(device_id) = &settings.device_id {
            adb = adb.with_device_id(device_id.clone());
        }
        let device: Arc<dyn DeviceBridge> = Arc::new(adb);

        let notifier: NotifierRef = if settings.narration {
            Arc::new(SpeechNotifier::new(settings.tts_command.clone()))
        } else {
            Arc::new(SilentNotifier)
        };

        let launcher = Arc::new(AgentFactory::new(settings.agent_config(), notes.clone()));
        let orchestrator = Orchestrator::new(
            device,
            launcher,
            notes,
            CommandHistory::new(store.clone()),
        )
        .with_notifier(notifier)
        .with_task_timeout(settings.task_timeout());

        Self::new(Arc::new(orchestrator), store)
    }
}

/// Build the HTTP router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .route("/execute", post(handlers::execute))
        .route("/stop", post(handlers::stop))
        .route("/fix_keyboard", post(handlers::fix_keyboard))
        .route("/history", get(handlers::history))
        .route("/macros", get(handlers::list_macros).post(handlers::save_macro))
        .route(
            "/app_guides",
            get(handlers::list_guides).post(handlers::save_guide),
        )
        .route("/connect_wireless", post(handlers::connect_wireless))
        .route("/devices", get(handlers::devices))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_settings(&settings));
    let app = router(Arc::clone(&state));

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM, then stop any running task so the keyboard
/// is put back before exit.
async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    if state.orchestrator.stop().await {
        info!("Stopped the running task");
    }
}
