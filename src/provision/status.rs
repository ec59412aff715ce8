//! Connection state and the one-byte status characteristic.

use crate::ble::{CharHandle, GattRadio};
use log::{error, warn};
use std::fmt;
use std::sync::Arc;

/// Connection state as seen by the central.
///
/// `Idle → Connecting → {Connected, Error}`; both end states go back to
/// `Connecting` when new credentials arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    /// Encoding used on the status characteristic.
    pub fn status_byte(self) -> u8 {
        match self {
            Self::Idle => 0x00,
            Self::Connecting => 0x01,
            Self::Connected => 0x02,
            Self::Error => 0x03,
        }
    }

    pub fn from_status_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Idle),
            0x01 => Some(Self::Connecting),
            0x02 => Some(Self::Connected),
            0x03 => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Mirrors the connection state into the status characteristic.
pub struct StatusChannel<R: GattRadio> {
    radio: Arc<R>,
    handle: CharHandle,
    last: ConnectionState,
}

impl<R: GattRadio> StatusChannel<R> {
    pub fn new(radio: Arc<R>, handle: CharHandle) -> Self {
        Self {
            radio,
            handle,
            last: ConnectionState::Idle,
        }
    }

    /// Store the encoded state and notify subscribers.
    ///
    /// Radio failures are logged; the state is still recorded as published.
    pub fn publish(&mut self, state: ConnectionState) {
        self.last = state;
        if let Err(e) = self.radio.gatt_write(self.handle, &[state.status_byte()]) {
            error!("Failed to update status characteristic: {}", e);
            return;
        }
        if let Err(e) = self.radio.notify(self.handle) {
            warn!("Status notification failed: {}", e);
        }
    }

    pub fn last_published(&self) -> ConnectionState {
        self.last
    }

    pub fn handle(&self) -> CharHandle {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::{ServiceDefinition, SimRadio};
    use crate::config::ProvisionConfig;

    fn channel() -> (Arc<SimRadio>, StatusChannel<SimRadio>) {
        let radio = Arc::new(SimRadio::new());
        let handles = radio
            .register_service(&ServiceDefinition::provisioning(&ProvisionConfig::default()))
            .unwrap();
        let channel = StatusChannel::new(radio.clone(), handles.status);
        (radio, channel)
    }

    #[test]
    fn test_status_bytes() {
        assert_eq!(ConnectionState::Idle.status_byte(), 0);
        assert_eq!(ConnectionState::Connecting.status_byte(), 1);
        assert_eq!(ConnectionState::Connected.status_byte(), 2);
        assert_eq!(ConnectionState::Error.status_byte(), 3);
    }

    #[test]
    fn test_status_byte_decoding() {
        for byte in 0..=3u8 {
            let state = ConnectionState::from_status_byte(byte).unwrap();
            assert_eq!(state.status_byte(), byte);
        }
        assert_eq!(ConnectionState::from_status_byte(4), None);
    }

    #[test]
    fn test_publish_updates_backing_value() {
        let (radio, mut channel) = channel();
        channel.publish(ConnectionState::Connecting);

        assert_eq!(radio.central_read(channel.handle()).unwrap(), vec![1]);
        assert_eq!(channel.last_published(), ConnectionState::Connecting);
        // nobody subscribed
        assert!(radio.notifications().is_empty());
    }

    #[test]
    fn test_publish_notifies_subscriber() {
        let (radio, mut channel) = channel();
        radio.central_connect();
        radio.central_subscribe(true);

        channel.publish(ConnectionState::Connecting);
        channel.publish(ConnectionState::Error);

        let bytes: Vec<Vec<u8>> = radio.notifications().into_iter().map(|(_, v)| v).collect();
        assert_eq!(bytes, vec![vec![1], vec![3]]);
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
    }
}
