//! Endpoint handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;
use tracing::{info, warn};

use super::error::ApiError;
use super::extract::ApiJson;
use super::routes::AppState;
use super::types::{
    ExecuteRequest, ExecuteResponse, HealthResponse, MessageResponse, SavedResponse,
    WirelessRequest, WirelessResponse,
};
use crate::adb::DeviceInfo;
use crate::agent::AgentRequest;
use crate::orchestrator::StatusSnapshot;
use crate::storage::{slugify, AppGuide, Library, LibraryEntry, Macro};

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        agent_status: state.orchestrator.status(),
    })
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusSnapshot> {
    Json(state.orchestrator.snapshot())
}

pub async fn execute(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ExecuteRequest>,
) -> Result<(StatusCode, Json<ExecuteResponse>), ApiError> {
    let request = AgentRequest {
        goal: req.command.clone(),
        app_card: req.app_card,
        structured_output: req.use_structured_output,
        reasoning: req.reasoning,
    };
    let id = state.orchestrator.start(request)?;
    info!("Accepted task {}: {}", id, req.command);

    Ok((
        StatusCode::ACCEPTED,
        Json(ExecuteResponse {
            message: "Task started",
            command: req.command,
        }),
    ))
}

pub async fn stop(State(state): State<Arc<AppState>>) -> Json<MessageResponse> {
    let message = if state.orchestrator.stop().await {
        "Task stopped"
    } else {
        "No active task"
    };
    Json(MessageResponse::new(message))
}

pub async fn fix_keyboard(State(state): State<Arc<AppState>>) -> Json<MessageResponse> {
    let target = state.orchestrator.fix_keyboard().await;
    Json(MessageResponse::new(format!("Keyboard reset to: {}", target)))
}

pub async fn history(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.orchestrator.history().list())
}

pub async fn list_macros(State(state): State<Arc<AppState>>) -> Json<Vec<Macro>> {
    Json(state.macros.list())
}

pub async fn save_macro(
    State(state): State<Arc<AppState>>,
    ApiJson(entry): ApiJson<Macro>,
) -> Result<Json<SavedResponse>, ApiError> {
    save_entry(&state.macros, &entry).map(Json)
}

pub async fn list_guides(State(state): State<Arc<AppState>>) -> Json<Vec<AppGuide>> {
    Json(state.guides.list())
}

pub async fn save_guide(
    State(state): State<Arc<AppState>>,
    ApiJson(entry): ApiJson<AppGuide>,
) -> Result<Json<SavedResponse>, ApiError> {
    save_entry(&state.guides, &entry).map(Json)
}

fn save_entry<T: LibraryEntry>(
    library: &Library<T>,
    entry: &T,
) -> Result<SavedResponse, ApiError> {
    if slugify(entry.slug_source()).is_empty() {
        return Err(ApiError::BadRequest(format!(
            "'{}' does not contain any usable characters",
            entry.slug_source()
        )));
    }

    match library.save(entry) {
        Some(filename) => Ok(SavedResponse {
            status: "saved",
            filename,
        }),
        None => Err(ApiError::Internal(format!(
            "Failed to write {}",
            Library::<T>::file_name(entry)
        ))),
    }
}

pub async fn connect_wireless(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<WirelessRequest>,
) -> Result<Json<WirelessResponse>, ApiError> {
    info!("📶 Wireless request received: {}:{}", req.ip, req.port);
    let notifier = state.orchestrator.notifier();
    notifier.announce(&format!("Initiating wireless connection to {}", req.ip));

    let outcome = state
        .orchestrator
        .device()
        .connect_wireless(&req.ip, &req.port)
        .await;

    if outcome.success {
        notifier.announce("Wireless connection established successfully");
        Ok(Json(WirelessResponse {
            status: "success",
            detail: outcome.message,
        }))
    } else {
        warn!("Wireless connection failed: {}", outcome.message);
        notifier.announce("Connection failed. Please check IP and Port");
        Err(ApiError::BadRequest(outcome.message))
    }
}

pub async fn devices(State(state): State<Arc<AppState>>) -> Json<Vec<DeviceInfo>> {
    Json(state.orchestrator.device().list_devices().await)
}
