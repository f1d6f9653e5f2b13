//! ADB process plumbing and connection management.

use serde::Serialize;
use std::process::{Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, info};

/// Timeout for `adb connect`.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for listing devices.
pub const LIST_TIMEOUT: Duration = Duration::from_secs(5);

/// Type of ADB connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Usb,
    Wifi,
    Remote,
}

/// Information about a connected device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub status: String,
    pub connection_type: ConnectionType,
    pub model: Option<String>,
}

/// ADB errors.
#[derive(Error, Debug)]
pub enum AdbError {
    #[error("adb command timed out after {0}s")]
    Timeout(u64),
    #[error("Failed to run adb: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("adb exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },
}

/// Outcome of a wireless connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WirelessOutcome {
    pub success: bool,
    pub message: String,
}

/// Shells out to the `adb` binary.
///
/// Device-scoped commands (`shell ...`) are prefixed with `-s <serial>` when a
/// device ID is configured; connection management commands are not.
///
/// # Example
/// ```rust,no_run
/// use phone_agent_server::adb::AdbBridge;
///
/// # async fn demo() {
/// let adb = AdbBridge::new().with_device_id("emulator-5554");
/// let outcome = adb.connect_wireless("192.168.1.100", "5555").await;
/// println!("{}", outcome.message);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AdbBridge {
    adb_path: String,
    device_id: Option<String>,
}

impl Default for AdbBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl AdbBridge {
    /// Create a bridge using `adb` from `PATH`.
    pub fn new() -> Self {
        Self {
            adb_path: "adb".to_string(),
            device_id: None,
        }
    }

    /// Create a bridge with a custom ADB path.
    pub fn with_path(adb_path: impl Into<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
            device_id: None,
        }
    }

    /// Target a specific device for shell commands.
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        let device_id = device_id.into();
        self.device_id = (!device_id.is_empty()).then_some(device_id);
        self
    }

    /// Configured device serial, if any.
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Arguments that select the target device.
    pub(crate) fn device_args(&self) -> Vec<String> {
        match &self.device_id {
            Some(id) => vec!["-s".to_string(), id.clone()],
            None => Vec::new(),
        }
    }

    /// Run adb with `args`, killing it if it outlives `timeout`.
    pub(crate) async fn run(&self, args: &[String], timeout: Duration) -> Result<Output, AdbError> {
        debug!("adb {}", args.join(" "));

        let child = Command::new(&self.adb_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => Ok(output?),
            Err(_) => Err(AdbError::Timeout(timeout.as_secs())),
        }
    }

    /// Run a device-scoped `adb shell` command.
    pub(crate) async fn shell(&self, shell_args: &[&str], timeout: Duration) -> Result<Output, AdbError> {
        let mut args = self.device_args();
        args.push("shell".to_string());
        args.extend(shell_args.iter().map(|s| s.to_string()));
        self.run(&args, timeout).await
    }

    /// Connect to a device over TCP/IP.
    ///
    /// adb's exit status is unreliable for `connect`, so success is decided by
    /// looking for "connected to" in stdout. Never fails; problems end up in
    /// the returned message.
    pub async fn connect_wireless(&self, ip: &str, port: &str) -> WirelessOutcome {
        let target = format!("{}:{}", ip.trim(), port.trim());
        info!("📡 Connecting to wireless device: {}", target);

        let args = vec!["connect".to_string(), target.clone()];
        match self.run(&args, CONNECT_TIMEOUT).await {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
                connect_outcome(&target, &stdout)
            }
            Err(e) => {
                error!("Wireless connection failed: {}", e);
                WirelessOutcome {
                    success: false,
                    message: e.to_string(),
                }
            }
        }
    }

    /// List attached devices. Errors yield an empty list.
    pub async fn list_devices(&self) -> Vec<DeviceInfo> {
        let args = vec!["devices".to_string(), "-l".to_string()];
        match self.run(&args, LIST_TIMEOUT).await {
            Ok(output) => parse_devices(&String::from_utf8_lossy(&output.stdout)),
            Err(e) => {
                error!("Failed to list devices: {}", e);
                Vec::new()
            }
        }
    }
}

/// Turn a non-zero exit into [`AdbError::CommandFailed`].
pub(crate) fn ensure_success(output: Output) -> Result<Output, AdbError> {
    if output.status.success() {
        Ok(output)
    } else {
        Err(AdbError::CommandFailed {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn connect_outcome(target: &str, stdout: &str) -> WirelessOutcome {
    if stdout.contains("connected to") {
        WirelessOutcome {
            success: true,
            message: format!("Connected to {}", target),
        }
    } else {
        WirelessOutcome {
            success: false,
            message: format!("Failed: {}", stdout),
        }
    }
}

/// Parse `adb devices -l` output.
pub(crate) fn parse_devices(stdout: &str) -> Vec<DeviceInfo> {
    stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('*'))
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 2 {
                return None;
            }

            let device_id = parts[0].to_string();
            let connection_type = if device_id.contains(':') {
                ConnectionType::Remote
            } else if parts.iter().any(|p| p.starts_with("usb:")) {
                ConnectionType::Usb
            } else {
                ConnectionType::Wifi
            };

            let model = parts
                .iter()
                .find_map(|p| p.strip_prefix("model:"))
                .map(str::to_string);

            Some(DeviceInfo {
                device_id,
                status: parts[1].to_string(),
                connection_type,
                model,
            })
        })
        .collect()
}
