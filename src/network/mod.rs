//! Network interface abstraction.
//!
//! The connection manager drives any [`NetworkInterface`]:
//! - **ESP32** (`esp32` feature): the station interface in [`crate::wifi`]
//! - **Host**: [`SimNetwork`], a scripted table of known networks
//!
//! # Example
//!
//! ```
//! use ble_wifi_provision::network::{LinkStatus, NetworkInterface, SimNetwork};
//!
//! let mut network = SimNetwork::new().with_network("HomeNet", "pw1234");
//! network.connect("HomeNet", "pw1234").unwrap();
//! assert_eq!(network.link_status(), LinkStatus::GotIp);
//! assert_eq!(network.current_network_id().as_deref(), Some("HomeNet"));
//! ```

use std::fmt;

#[cfg(not(feature = "esp32"))]
mod host;

#[cfg(not(feature = "esp32"))]
pub use host::SimNetwork;

/// Link status reported by the network interface while joining.
///
/// Mirrors the station status codes of common embedded WiFi stacks
/// (see [`LinkStatus::from_raw`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkStatus {
    /// No association in progress.
    #[default]
    Idle,
    /// Association in progress.
    Connecting,
    /// Associated, waiting for an address.
    NoIp,
    /// Associated with an address.
    GotIp,
    /// The access point rejected the secret.
    WrongSecret,
    /// No access point with the requested identifier was found.
    NoPeerFound,
    /// Any other failure.
    ConnectFail,
}

impl LinkStatus {
    /// Map a raw station status code.
    ///
    /// `0` idle, `1` connecting, `2` no IP, `3` got IP, `-1` failure,
    /// `-2` no AP found, `-3` wrong password. Unknown negative codes are
    /// failures; unknown positive codes are treated as still connecting.
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => Self::Idle,
            1 => Self::Connecting,
            2 => Self::NoIp,
            3 => Self::GotIp,
            -2 => Self::NoPeerFound,
            -3 => Self::WrongSecret,
            n if n < 0 => Self::ConnectFail,
            _ => Self::Connecting,
        }
    }

    /// The raw station status code for this status.
    pub fn raw(self) -> i32 {
        match self {
            Self::Idle => 0,
            Self::Connecting => 1,
            Self::NoIp => 2,
            Self::GotIp => 3,
            Self::ConnectFail => -1,
            Self::NoPeerFound => -2,
            Self::WrongSecret => -3,
        }
    }

    /// True once the join has either succeeded or definitely failed.
    pub fn is_definitive(self) -> bool {
        matches!(
            self,
            Self::GotIp | Self::WrongSecret | Self::NoPeerFound | Self::ConnectFail
        )
    }

    pub fn is_success(self) -> bool {
        self == Self::GotIp
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::NoIp => "associated, no IP",
            Self::GotIp => "got IP",
            Self::WrongSecret => "wrong secret",
            Self::NoPeerFound => "no access point found",
            Self::ConnectFail => "connect failed",
        };
        write!(f, "{} ({})", name, self.raw())
    }
}

/// The network interface owned by the connection manager.
///
/// `connect` only starts the join; progress is observed by polling
/// [`link_status`](NetworkInterface::link_status).
pub trait NetworkInterface: Send {
    /// True while associated with a network.
    fn is_connected(&self) -> bool;

    /// Identifier of the network currently associated with, if any.
    fn current_network_id(&self) -> Option<String>;

    /// Drop any existing association. Succeeds when there is none.
    fn disconnect(&mut self) -> Result<(), NetworkError>;

    /// Start joining `network_id` with `secret` (empty for open networks).
    fn connect(&mut self, network_id: &str, secret: &str) -> Result<(), NetworkError>;

    /// Current progress of the join.
    fn link_status(&mut self) -> LinkStatus;
}

/// Network interface errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// The driver refused the credentials before trying (e.g. too long).
    Rejected(String),
    /// Driver-level failure.
    Driver(String),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(msg) => write!(f, "credentials rejected: {}", msg),
            Self::Driver(msg) => write!(f, "network driver error: {}", msg),
        }
    }
}

impl std::error::Error for NetworkError {}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for NetworkError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Driver(format!("ESP error: {:?}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_known_codes() {
        assert_eq!(LinkStatus::from_raw(0), LinkStatus::Idle);
        assert_eq!(LinkStatus::from_raw(1), LinkStatus::Connecting);
        assert_eq!(LinkStatus::from_raw(2), LinkStatus::NoIp);
        assert_eq!(LinkStatus::from_raw(3), LinkStatus::GotIp);
        assert_eq!(LinkStatus::from_raw(-1), LinkStatus::ConnectFail);
        assert_eq!(LinkStatus::from_raw(-2), LinkStatus::NoPeerFound);
        assert_eq!(LinkStatus::from_raw(-3), LinkStatus::WrongSecret);
    }

    #[test]
    fn test_from_raw_unknown_codes() {
        assert_eq!(LinkStatus::from_raw(-7), LinkStatus::ConnectFail);
        assert_eq!(LinkStatus::from_raw(9), LinkStatus::Connecting);
    }

    #[test]
    fn test_raw_inverts_from_raw() {
        for code in -3..=3 {
            assert_eq!(LinkStatus::from_raw(code).raw(), code);
        }
    }

    #[test]
    fn test_definitive_statuses() {
        assert!(!LinkStatus::Idle.is_definitive());
        assert!(!LinkStatus::Connecting.is_definitive());
        assert!(!LinkStatus::NoIp.is_definitive());
        assert!(LinkStatus::GotIp.is_definitive());
        assert!(LinkStatus::WrongSecret.is_definitive());
        assert!(LinkStatus::NoPeerFound.is_definitive());
        assert!(LinkStatus::ConnectFail.is_definitive());
    }

    #[test]
    fn test_only_got_ip_is_success() {
        assert!(LinkStatus::GotIp.is_success());
        assert!(!LinkStatus::NoIp.is_success());
        assert!(!LinkStatus::WrongSecret.is_success());
    }

    #[test]
    fn test_display() {
        assert_eq!(LinkStatus::WrongSecret.to_string(), "wrong secret (-3)");
        assert_eq!(
            NetworkError::Rejected("network id too long".into()).to_string(),
            "credentials rejected: network id too long"
        );
    }
}
