//! ESP-IDF WiFi station backend.
//!
//! # Components
//!
//! - [`link_status_from_reason`] - maps station disconnect reasons to
//!   [`LinkStatus`] (host-testable)
//! - `connection` - [`NetworkInterface`](crate::network::NetworkInterface)
//!   over the ESP-IDF WiFi driver (ESP32 only)

use crate::network::LinkStatus;

#[cfg(feature = "esp32")]
mod connection;

#[cfg(feature = "esp32")]
pub use connection::EspNetwork;

// ESP-IDF `wifi_err_reason_t` values that matter for classification.
const REASON_AUTH_EXPIRE: u16 = 2;
const REASON_4WAY_HANDSHAKE_TIMEOUT: u16 = 15;
const REASON_NO_AP_FOUND: u16 = 201;
const REASON_AUTH_FAIL: u16 = 202;
const REASON_HANDSHAKE_TIMEOUT: u16 = 204;
const REASON_NO_AP_FOUND_COMPATIBLE_SECURITY: u16 = 210;
const REASON_NO_AP_FOUND_AUTHMODE_THRESHOLD: u16 = 211;
const REASON_NO_AP_FOUND_RSSI_THRESHOLD: u16 = 212;

/// Classify a station disconnect reason reported while joining.
///
/// `0` means no disconnect has been reported and the join is still running.
pub fn link_status_from_reason(reason: u16) -> LinkStatus {
    match reason {
        0 => LinkStatus::Connecting,
        REASON_AUTH_EXPIRE
        | REASON_4WAY_HANDSHAKE_TIMEOUT
        | REASON_AUTH_FAIL
        | REASON_HANDSHAKE_TIMEOUT => LinkStatus::WrongSecret,
        REASON_NO_AP_FOUND
        | REASON_NO_AP_FOUND_COMPATIBLE_SECURITY
        | REASON_NO_AP_FOUND_AUTHMODE_THRESHOLD
        | REASON_NO_AP_FOUND_RSSI_THRESHOLD => LinkStatus::NoPeerFound,
        _ => LinkStatus::ConnectFail,
    }
}
