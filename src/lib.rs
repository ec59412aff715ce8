//! BLE WiFi provisioning firmware library.
//!
//! A headless device advertises a GATT service; a phone connects, writes a
//! network identifier and secret, and reads back the connection status.
//! Everything except the ESP32 drivers is platform-independent and can be
//! tested on the host machine.

pub mod ble;
pub mod config;
pub mod console;
pub mod indicator;
pub mod network;
pub mod provision;
pub mod wifi;

use std::sync::{Mutex, MutexGuard, PoisonError};

// Re-export commonly used items
pub use ble::{Advertiser, AdvertisingPayload, GattRadio, RadioError, RadioEvent, ServiceHandles};
pub use config::{ConfigError, ProvisionConfig};
pub use indicator::{Indicator, LogIndicator, NoIndicator};
pub use network::{LinkStatus, NetworkError, NetworkInterface};
pub use provision::{
    ConnectFailure, ConnectionState, CredentialStore, ProvisionError, Provisioner, ServiceHandler,
};

#[cfg(not(feature = "esp32"))]
pub use ble::SimRadio;
#[cfg(not(feature = "esp32"))]
pub use network::SimNetwork;

/// Lock a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
