//! Service handler: dispatches radio events.
//!
//! Runs in the radio's callback context. It only records credentials and
//! raises a [`ConnectRequest`]; the blocking connect procedure runs on the
//! main loop.

use super::credentials::{CredentialField, CredentialStore, WriteOutcome};
use super::provisioner::ConnectRequest;
use crate::ble::{Advertiser, CharHandle, GattRadio, RadioEvent, ServiceHandles};
use crate::indicator::Indicator;
use crate::lock;
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex};
use zeroize::Zeroize;

/// Routes connect, disconnect and write events.
pub struct ServiceHandler<R: GattRadio, I: Indicator> {
    radio: Arc<R>,
    advertiser: Advertiser<R>,
    handles: ServiceHandles,
    credentials: Arc<Mutex<CredentialStore>>,
    request: Arc<ConnectRequest>,
    indicator: I,
    central_connected: bool,
}

impl<R: GattRadio, I: Indicator> ServiceHandler<R, I> {
    pub(crate) fn new(
        radio: Arc<R>,
        advertiser: Advertiser<R>,
        handles: ServiceHandles,
        credentials: Arc<Mutex<CredentialStore>>,
        request: Arc<ConnectRequest>,
        indicator: I,
    ) -> Self {
        Self {
            radio,
            advertiser,
            handles,
            credentials,
            request,
            indicator,
            central_connected: false,
        }
    }

    pub fn handle_event(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::CentralConnect => {
                info!("Central connected");
                self.central_connected = true;
                self.indicator.set(true);
            }
            RadioEvent::CentralDisconnect => {
                info!("Central disconnected");
                self.central_connected = false;
                self.indicator.set(false);
                if let Err(e) = self.advertiser.start_advertising() {
                    error!("Failed to restart advertising: {}", e);
                }
            }
            RadioEvent::Write { handle, data } => self.handle_write(handle, data),
        }
    }

    fn field_for(&self, handle: CharHandle) -> Option<CredentialField> {
        if handle == self.handles.network_id {
            Some(CredentialField::NetworkId)
        } else if handle == self.handles.network_secret {
            Some(CredentialField::NetworkSecret)
        } else {
            None
        }
    }

    fn handle_write(&mut self, handle: CharHandle, mut data: Vec<u8>) {
        let Some(field) = self.field_for(handle) else {
            warn!("Ignoring write to characteristic {}", handle);
            return;
        };
        data.truncate(field.capacity());

        let (result, complete, network_id) = {
            let mut store = lock(&self.credentials);
            let result = store.write_field(field, &data);
            (result, store.is_complete(), store.network_id().to_string())
        };
        let written_len = data.len();
        data.zeroize();

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Rejected write: {}", e);
                return;
            }
        };

        match field {
            CredentialField::NetworkId => {
                info!("Network ID: '{}' ({:?})", network_id, outcome);
                // reads return the stored value, not the padded buffer
                if let Err(e) = self.radio.gatt_write(handle, network_id.as_bytes()) {
                    error!("Failed to update network ID characteristic: {}", e);
                }
            }
            CredentialField::NetworkSecret => {
                info!("Network secret written ({} bytes, {:?})", written_len, outcome);
            }
        }

        if outcome == WriteOutcome::Changed && complete {
            if self.request.request() {
                info!("Credentials complete, connect requested");
            }
        } else {
            debug!(
                "No connect requested (outcome {:?}, complete {})",
                outcome, complete
            );
        }
    }

    pub fn handles(&self) -> ServiceHandles {
        self.handles
    }

    pub fn is_central_connected(&self) -> bool {
        self.central_connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::{ServiceDefinition, SimRadio};
    use crate::config::ProvisionConfig;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Clone, Default)]
    struct SharedIndicator(Arc<AtomicBool>);

    impl Indicator for SharedIndicator {
        fn set(&mut self, on: bool) {
            self.0.store(on, Ordering::SeqCst);
        }
    }

    struct Fixture {
        radio: Arc<SimRadio>,
        handler: ServiceHandler<SimRadio, SharedIndicator>,
        request: Arc<ConnectRequest>,
        led: SharedIndicator,
    }

    fn fixture() -> Fixture {
        let config = ProvisionConfig::default();
        let radio = Arc::new(SimRadio::new());
        let handles = radio
            .register_service(&ServiceDefinition::provisioning(&config))
            .unwrap();
        let request = Arc::new(ConnectRequest::new());
        let led = SharedIndicator::default();
        let handler = ServiceHandler::new(
            radio.clone(),
            Advertiser::new(radio.clone(), &config),
            handles,
            Arc::new(Mutex::new(CredentialStore::new())),
            request.clone(),
            led.clone(),
        );
        Fixture {
            radio,
            handler,
            request,
            led,
        }
    }

    impl Fixture {
        fn write(&mut self, handle: CharHandle, data: &[u8]) {
            let event = self.radio.central_write(handle, data).unwrap();
            self.handler.handle_event(event);
        }

        fn id(&self) -> CharHandle {
            self.handler.handles().network_id
        }

        fn secret(&self) -> CharHandle {
            self.handler.handles().network_secret
        }
    }

    #[test]
    fn test_connect_and_disconnect_drive_indicator() {
        let mut f = fixture();
        let event = f.radio.central_connect();
        f.handler.handle_event(event);
        assert!(f.handler.is_central_connected());
        assert!(f.led.0.load(Ordering::SeqCst));

        let event = f.radio.central_disconnect();
        f.handler.handle_event(event);
        assert!(!f.handler.is_central_connected());
        assert!(!f.led.0.load(Ordering::SeqCst));
    }

    #[test]
    fn test_disconnect_restarts_advertising() {
        let mut f = fixture();
        let event = f.radio.central_connect();
        f.handler.handle_event(event);
        assert!(!f.radio.is_advertising());

        let event = f.radio.central_disconnect();
        f.handler.handle_event(event);
        assert!(f.radio.is_advertising());
        assert_eq!(f.radio.advertise_count(), 1);
    }

    #[test]
    fn test_request_only_when_complete() {
        let mut f = fixture();
        let (id, secret) = (f.id(), f.secret());

        f.write(id, b"HomeNet");
        assert_eq!(f.request.generation(), 0);

        f.write(secret, b"pw1234");
        assert_eq!(f.request.generation(), 1);
    }

    #[test]
    fn test_either_order() {
        let mut f = fixture();
        let (id, secret) = (f.id(), f.secret());
        f.write(secret, b"pw1234");
        f.write(id, b"HomeNet");
        assert_eq!(f.request.generation(), 1);
    }

    #[test]
    fn test_identical_rewrite_does_not_request() {
        let mut f = fixture();
        let (id, secret) = (f.id(), f.secret());
        f.write(id, b"HomeNet");
        f.write(secret, b"pw1234");
        f.write(id, b"HomeNet");
        f.write(secret, b"pw1234\0\0\0");
        assert_eq!(f.request.generation(), 1);
    }

    #[test]
    fn test_changed_secret_requests_again() {
        let mut f = fixture();
        let (id, secret) = (f.id(), f.secret());
        f.write(id, b"HomeNet");
        f.write(secret, b"wrongpw");
        f.write(secret, b"correctpw");
        assert_eq!(f.request.generation(), 2);
    }

    #[test]
    fn test_id_read_returns_stripped_value() {
        let mut f = fixture();
        let id = f.id();
        let mut padded = b"HomeNet".to_vec();
        padded.resize(32, 0);
        f.write(id, &padded);

        assert_eq!(f.radio.central_read(id).unwrap(), b"HomeNet".to_vec());
    }

    #[test]
    fn test_invalid_utf8_ignored() {
        let mut f = fixture();
        let (id, secret) = (f.id(), f.secret());
        f.write(secret, b"pw1234");
        f.write(id, &[0xc3, 0x28]);
        assert_eq!(f.request.generation(), 0);
    }

    #[test]
    fn test_write_to_status_handle_ignored() {
        let mut f = fixture();
        let status = f.handler.handles().status;
        f.handler.handle_event(RadioEvent::Write {
            handle: status,
            data: vec![2],
        });
        assert_eq!(f.request.generation(), 0);
    }

    #[test]
    fn test_oversize_write_truncated_to_field() {
        let mut f = fixture();
        let (id, secret) = (f.id(), f.secret());
        f.write(secret, b"pw");
        // bypass the stack truncation
        f.handler.handle_event(RadioEvent::Write {
            handle: id,
            data: vec![b'n'; 40],
        });
        assert_eq!(f.radio.central_read(id).unwrap().len(), 32);
    }
}
