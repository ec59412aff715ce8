//! GATT service definition and the radio driver seam.
//!
//! # GATT Service Structure
//!
//! ```text
//! Service: WiFi Provisioning
//! ├── Network ID (Read, Write)     - up to 32 bytes, pad-stripped on store
//! ├── Network Secret (Write)       - up to 64 bytes, never readable
//! └── Status (Read, Notify)        - 1 byte: 0 idle, 1 connecting, 2 connected, 3 error
//! ```

use super::advertising::AdvertisingPayload;
use crate::config::{ProvisionConfig, MAX_NETWORK_ID_LEN, MAX_NETWORK_SECRET_LEN};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Attribute handle assigned by the radio stack at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharHandle(pub u16);

impl fmt::Display for CharHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Operations a central may perform on a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharAccess {
    pub read: bool,
    pub write: bool,
    pub notify: bool,
}

impl CharAccess {
    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
        notify: false,
    };
    pub const WRITE_ONLY: Self = Self {
        read: false,
        write: true,
        notify: false,
    };
    pub const READ_NOTIFY: Self = Self {
        read: true,
        write: false,
        notify: true,
    };
}

/// One characteristic of the provisioning service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicDef {
    pub uuid: Uuid,
    pub access: CharAccess,
    /// Size of the backing buffer; longer writes are truncated by the stack.
    pub capacity: usize,
}

/// The provisioning service: one service UUID, three characteristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub uuid: Uuid,
    pub network_id: CharacteristicDef,
    pub network_secret: CharacteristicDef,
    pub status: CharacteristicDef,
}

impl ServiceDefinition {
    /// Build the provisioning service from configured identifiers.
    pub fn provisioning(config: &ProvisionConfig) -> Self {
        Self {
            uuid: config.service_uuid,
            network_id: CharacteristicDef {
                uuid: config.network_id_uuid,
                access: CharAccess::READ_WRITE,
                capacity: MAX_NETWORK_ID_LEN,
            },
            network_secret: CharacteristicDef {
                uuid: config.network_secret_uuid,
                access: CharAccess::WRITE_ONLY,
                capacity: MAX_NETWORK_SECRET_LEN,
            },
            status: CharacteristicDef {
                uuid: config.status_uuid,
                access: CharAccess::READ_NOTIFY,
                capacity: 1,
            },
        }
    }

    /// Characteristics in registration order.
    pub fn characteristics(&self) -> [&CharacteristicDef; 3] {
        [&self.network_id, &self.network_secret, &self.status]
    }
}

/// Handles returned by [`GattRadio::register_service`], in definition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceHandles {
    pub network_id: CharHandle,
    pub network_secret: CharHandle,
    pub status: CharHandle,
}

/// Events delivered by the radio stack.
///
/// The driver resolves its native callback kinds into this type once; the
/// service handler matches on it and never inspects raw event codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// A central connected.
    CentralConnect,
    /// The central disconnected (advertising has stopped).
    CentralDisconnect,
    /// A central wrote `data` to the characteristic at `handle`.
    Write { handle: CharHandle, data: Vec<u8> },
}

/// Radio and advertising driver.
///
/// Methods take `&self`: the driver is shared between the event callback
/// context (re-advertising) and the main loop (status updates).
pub trait GattRadio: Send + Sync {
    /// Register the service and return the assigned characteristic handles.
    fn register_service(&self, service: &ServiceDefinition) -> Result<ServiceHandles, RadioError>;

    /// Start (or restart) broadcasting `payload` every `interval`.
    fn advertise(&self, payload: &AdvertisingPayload, interval: Duration)
        -> Result<(), RadioError>;

    /// Replace the backing value of a characteristic.
    fn gatt_write(&self, handle: CharHandle, value: &[u8]) -> Result<(), RadioError>;

    /// Read the backing value of a characteristic.
    fn gatt_read(&self, handle: CharHandle) -> Result<Vec<u8>, RadioError>;

    /// Push the current backing value to subscribed centrals.
    ///
    /// Succeeds without sending anything when nobody has enabled notifications.
    fn notify(&self, handle: CharHandle) -> Result<(), RadioError>;
}

/// Errors reported by a radio driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    /// The BLE stack could not be brought up.
    Unavailable(String),
    /// No characteristic is registered under this handle.
    UnknownHandle(CharHandle),
    /// The characteristic does not permit this operation.
    NotPermitted { handle: CharHandle, op: &'static str },
    /// Driver-specific failure.
    Driver(String),
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "radio unavailable: {}", msg),
            Self::UnknownHandle(handle) => write!(f, "unknown characteristic handle {}", handle),
            Self::NotPermitted { handle, op } => {
                write!(f, "{} not permitted on characteristic {}", op, handle)
            }
            Self::Driver(msg) => write!(f, "radio driver error: {}", msg),
        }
    }
}

impl std::error::Error for RadioError {}
