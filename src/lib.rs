// Copyright 2025 ModerRAS
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Phone Agent Server
//!
//! HTTP control plane for an Android phone automation agent.
//!
//! The server accepts natural-language commands, runs them one at a time
//! through an external automation agent, and reports progress and results.
//! Around the agent it manages the device keyboard over ADB, wireless
//! connections, and a handful of small JSON stores (notes, command history,
//! macros, app guides).
//!
//! ## Example
//!
//! ```rust,no_run
//! use phone_agent_server::{api, Settings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load();
//!     api::serve(settings).await
//! }
//! ```

pub mod adb;
pub mod agent;
pub mod api;
pub mod config;
pub mod narration;
pub mod orchestrator;
pub mod settings;
pub mod storage;

pub use adb::{AdbBridge, DeviceBridge};
pub use agent::{AgentConfig, AgentError, AgentFactory, AgentOutcome, AutomationAgent};
pub use orchestrator::{Orchestrator, StartError, StatusSnapshot, TaskStatus};
pub use settings::Settings;
