//! Provisioning configuration.
//!
//! # Components
//!
//! - [`ProvisionConfig`] - advertised identity, characteristic identifiers and
//!   connect timing (host-testable, JSON-loadable on host)

mod provision;

pub use provision::{
    ConfigError, ProvisionConfig, DEFAULT_DEVICE_NAME, DEFAULT_MAX_POLLS,
    DEFAULT_NETWORK_ID_UUID, DEFAULT_NETWORK_SECRET_UUID, DEFAULT_SERVICE_UUID,
    DEFAULT_STATUS_UUID, MAX_DEVICE_NAME_LEN, MAX_NETWORK_ID_LEN, MAX_NETWORK_SECRET_LEN,
};
