//! Provisioning configuration.
//!
//! Platform-independent settings for the advertised service and the connect
//! procedure. Host builds can load them from a JSON file; any field missing
//! from the file keeps its default.
//!
//! # Example
//!
//! ```
//! use ble_wifi_provision::config::ProvisionConfig;
//! use std::time::Duration;
//!
//! let config = ProvisionConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.max_polls, 30);
//! assert_eq!(config.poll_interval(), Duration::from_secs(1));
//! ```

use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Maximum network identifier length (IEEE 802.11 SSID limit).
pub const MAX_NETWORK_ID_LEN: usize = 32;

/// Maximum network secret length (WPA2 passphrase / PSK hex limit).
pub const MAX_NETWORK_SECRET_LEN: usize = 64;

/// Link status polls before a connect attempt is declared timed out.
pub const DEFAULT_MAX_POLLS: u32 = 30;

/// Longest device name accepted: a legacy advertising PDU minus the AD header.
pub const MAX_DEVICE_NAME_LEN: usize = 29;

/// Default advertised device name.
pub const DEFAULT_DEVICE_NAME: &str = "HotBox";

/// Provisioning service identifier.
pub const DEFAULT_SERVICE_UUID: Uuid = Uuid::from_u128(0xA5A5A5A5_A5A5_A5A5_A5A5_A5A5A5A5A5A5);

/// Network ID characteristic (read/write).
pub const DEFAULT_NETWORK_ID_UUID: Uuid = Uuid::from_u128(0xB5B5B5B5_B5B5_B5B5_B5B5_B5B5B5B5B5B5);

/// Network secret characteristic (write only).
pub const DEFAULT_NETWORK_SECRET_UUID: Uuid =
    Uuid::from_u128(0xC5C5C5C5_C5C5_C5C5_C5C5_C5C5C5C5C5C5);

/// Status characteristic (read/notify).
pub const DEFAULT_STATUS_UUID: Uuid = Uuid::from_u128(0xD5D5D5D5_D5D5_C5C5_C5C5_C5C5C5C5C5C5);

/// BLE advertising interval bounds in microseconds (20 ms .. 10.24 s).
const MIN_ADVERTISING_INTERVAL_US: u32 = 20_000;
const MAX_ADVERTISING_INTERVAL_US: u32 = 10_240_000;

/// Settings for the provisioning service and its connect procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    not(target_os = "espidf"),
    derive(serde::Deserialize),
    serde(default, deny_unknown_fields)
)]
pub struct ProvisionConfig {
    /// Name placed in the advertising payload.
    pub device_name: String,
    /// Service identifier placed in the advertising payload.
    pub service_uuid: Uuid,
    /// Network ID characteristic identifier.
    pub network_id_uuid: Uuid,
    /// Network secret characteristic identifier.
    pub network_secret_uuid: Uuid,
    /// Status characteristic identifier.
    pub status_uuid: Uuid,
    /// Advertising interval in microseconds.
    pub advertising_interval_us: u32,
    /// Delay between link status polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Number of link status polls before giving up.
    pub max_polls: u32,
    /// Pause after dropping a previous association, in milliseconds.
    pub settle_delay_ms: u64,
    /// Main loop sleep between checks for a requested attempt, in milliseconds.
    pub loop_tick_ms: u64,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            service_uuid: DEFAULT_SERVICE_UUID,
            network_id_uuid: DEFAULT_NETWORK_ID_UUID,
            network_secret_uuid: DEFAULT_NETWORK_SECRET_UUID,
            status_uuid: DEFAULT_STATUS_UUID,
            advertising_interval_us: 100_000,
            poll_interval_ms: 1_000,
            max_polls: DEFAULT_MAX_POLLS,
            settle_delay_ms: 1_000,
            loop_tick_ms: 100,
        }
    }
}

impl ProvisionConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_name.is_empty() {
            return Err(ConfigError::DeviceNameEmpty);
        }
        if self.device_name.len() > MAX_DEVICE_NAME_LEN {
            return Err(ConfigError::DeviceNameTooLong {
                len: self.device_name.len(),
                max: MAX_DEVICE_NAME_LEN,
            });
        }
        if self.max_polls == 0 {
            return Err(ConfigError::NoPolls);
        }
        if !(MIN_ADVERTISING_INTERVAL_US..=MAX_ADVERTISING_INTERVAL_US)
            .contains(&self.advertising_interval_us)
        {
            return Err(ConfigError::AdvertisingIntervalOutOfRange {
                interval_us: self.advertising_interval_us,
            });
        }

        let uuids = [
            self.service_uuid,
            self.network_id_uuid,
            self.network_secret_uuid,
            self.status_uuid,
        ];
        for (i, uuid) in uuids.iter().enumerate() {
            if uuids[i + 1..].contains(uuid) {
                return Err(ConfigError::DuplicateUuid(*uuid));
            }
        }

        Ok(())
    }

    pub fn advertising_interval(&self) -> Duration {
        Duration::from_micros(u64::from(self.advertising_interval_us))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn loop_tick(&self) -> Duration {
        Duration::from_millis(self.loop_tick_ms)
    }

    /// Parse and validate a configuration from JSON text.
    #[cfg(not(target_os = "espidf"))]
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration from a JSON file.
    #[cfg(not(target_os = "espidf"))]
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }
}

/// Errors that can occur while building a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Device name is empty.
    DeviceNameEmpty,
    /// Device name exceeds what an advertising PDU can carry.
    DeviceNameTooLong { len: usize, max: usize },
    /// `max_polls` is zero.
    NoPolls,
    /// Advertising interval outside the range the radio accepts.
    AdvertisingIntervalOutOfRange { interval_us: u32 },
    /// The same identifier is used twice.
    DuplicateUuid(Uuid),
    /// Configuration file could not be read.
    Io(String),
    /// Configuration file could not be parsed.
    InvalidFormat(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceNameEmpty => write!(f, "device name cannot be empty"),
            Self::DeviceNameTooLong { len, max } => {
                write!(f, "device name too long: {} bytes (max {})", len, max)
            }
            Self::NoPolls => write!(f, "max_polls must be at least 1"),
            Self::AdvertisingIntervalOutOfRange { interval_us } => write!(
                f,
                "advertising interval {} us outside {}..={} us",
                interval_us, MIN_ADVERTISING_INTERVAL_US, MAX_ADVERTISING_INTERVAL_US
            ),
            Self::DuplicateUuid(uuid) => write!(f, "identifier {} used more than once", uuid),
            Self::Io(msg) => write!(f, "cannot read configuration: {}", msg),
            Self::InvalidFormat(msg) => write!(f, "invalid format: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
