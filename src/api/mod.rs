//! HTTP API.

mod error;
mod extract;
mod handlers;
mod routes;
mod types;

pub use error::ApiError;
pub use extract::ApiJson;
pub use routes::{router, serve, AppState};
pub use types::{
    ExecuteRequest, ExecuteResponse, HealthResponse, MessageResponse, SavedResponse,
    WirelessRequest, WirelessResponse,
};
