//! Request and response bodies.

use serde::{Deserialize, Deserializer, Serialize};

use crate::orchestrator::TaskStatus;

/// `POST /execute` body.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    pub command: String,
    #[serde(default)]
    pub app_card: Option<String>,
    #[serde(default)]
    pub use_structured_output: bool,
    #[serde(default)]
    pub reasoning: bool,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub message: &'static str,
    pub command: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub agent_status: TaskStatus,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Reply to a macro or app guide save.
#[derive(Debug, Serialize)]
pub struct SavedResponse {
    pub status: &'static str,
    pub filename: String,
}

/// `POST /connect_wireless` body. Clients send the port as either a string
/// or a number.
#[derive(Debug, Clone, Deserialize)]
pub struct WirelessRequest {
    pub ip: String,
    #[serde(deserialize_with = "port_string")]
    pub port: String,
}

#[derive(Debug, Serialize)]
pub struct WirelessResponse {
    pub status: &'static str,
    pub detail: String,
}

fn port_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Text(String),
        Number(u64),
    }

    Ok(match Port::deserialize(deserializer)? {
        Port::Text(text) => text,
        Port::Number(number) => number.to_string(),
    })
}
