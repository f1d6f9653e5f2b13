//! Device bridge abstraction used by the orchestrator and HTTP layer.

use async_trait::async_trait;

use super::connection::{AdbBridge, DeviceInfo, WirelessOutcome};

/// Device operations the server needs. None of them may fail: problems are
/// logged and folded into the return value.
#[async_trait]
pub trait DeviceBridge: Send + Sync {
    /// Active input method, if it could be determined.
    async fn current_keyboard(&self) -> Option<String>;

    /// Switch the active input method.
    async fn set_keyboard(&self, ime_id: &str);

    /// Connect to a device over the network.
    async fn connect_wireless(&self, ip: &str, port: &str) -> WirelessOutcome;

    /// Attached devices.
    async fn list_devices(&self) -> Vec<DeviceInfo>;
}

#[async_trait]
impl DeviceBridge for AdbBridge {
    async fn current_keyboard(&self) -> Option<String> {
        AdbBridge::current_keyboard(self).await
    }

    async fn set_keyboard(&self, ime_id: &str) {
        AdbBridge::set_keyboard(self, ime_id).await
    }

    async fn connect_wireless(&self, ip: &str, port: &str) -> WirelessOutcome {
        AdbBridge::connect_wireless(self, ip, port).await
    }

    async fn list_devices(&self) -> Vec<DeviceInfo> {
        AdbBridge::list_devices(self).await
    }
}
