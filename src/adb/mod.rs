//! ADB (Android Debug Bridge) module for device interaction.

mod bridge;
mod connection;
mod input;

pub use bridge::DeviceBridge;
pub use connection::{AdbBridge, AdbError, ConnectionType, DeviceInfo, WirelessOutcome};
pub use input::DEFAULT_IME;
