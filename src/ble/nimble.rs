//! NimBLE radio driver (ESP32).
//!
//! Registers the provisioning service with the NimBLE host and turns its
//! callbacks into [`RadioEvent`]s. Backing values for readable characteristics
//! live in a cache that the `on_read` callbacks serve from, so the event
//! handler never has to lock a NimBLE characteristic from inside a callback.
//!
//! # Security Considerations
//!
//! Credentials travel as plaintext at the application layer. Provision in a
//! physically controlled environment; pairing/bonding is not enabled.

use super::advertising::{uuid_le_bytes, AdvertisingPayload};
use super::gatt::{
    CharAccess, CharHandle, GattRadio, RadioError, RadioEvent, ServiceDefinition, ServiceHandles,
};
use crate::lock;
use esp32_nimble::utilities::mutex::Mutex as NimbleMutex;
use esp32_nimble::utilities::BleUuid;
use esp32_nimble::{BLECharacteristic, BLEDevice, NimbleProperties};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Advertising interval unit used by the controller.
const ADV_INTERVAL_UNIT_US: u128 = 625;

type EventSink = Box<dyn FnMut(RadioEvent) + Send>;

/// Routes callback events to the installed sink.
///
/// Events raised before a sink is installed are kept and replayed on install.
#[derive(Default)]
struct Dispatch {
    sink: Option<EventSink>,
    backlog: Vec<RadioEvent>,
}

impl Dispatch {
    fn deliver(&mut self, event: RadioEvent) {
        match self.sink.as_mut() {
            Some(sink) => sink(event),
            None => self.backlog.push(event),
        }
    }
}

/// NimBLE-backed [`GattRadio`].
pub struct NimbleRadio {
    dispatch: Arc<Mutex<Dispatch>>,
    values: Arc<Mutex<HashMap<CharHandle, Vec<u8>>>>,
    notifiers: Mutex<HashMap<CharHandle, Arc<NimbleMutex<BLECharacteristic>>>>,
}

impl NimbleRadio {
    /// Bring up the NimBLE host and hook connection callbacks.
    pub fn new(device_name: &str) -> Result<Self, RadioError> {
        let device = BLEDevice::take();
        BLEDevice::set_device_name(device_name)
            .map_err(|e| RadioError::Unavailable(format!("set device name: {:?}", e)))?;

        let server = device.get_server();
        // Re-advertising is driven by the service handler.
        server.advertise_on_disconnect(false);

        let dispatch = Arc::new(Mutex::new(Dispatch::default()));

        let connect_dispatch = dispatch.clone();
        server.on_connect(move |_server, desc| {
            debug!("NimBLE connect: {:?}", desc.address());
            lock(&connect_dispatch).deliver(RadioEvent::CentralConnect);
        });

        let disconnect_dispatch = dispatch.clone();
        server.on_disconnect(move |_desc, reason| {
            debug!("NimBLE disconnect: {:?}", reason);
            lock(&disconnect_dispatch).deliver(RadioEvent::CentralDisconnect);
        });

        Ok(Self {
            dispatch,
            values: Arc::new(Mutex::new(HashMap::new())),
            notifiers: Mutex::new(HashMap::new()),
        })
    }

    /// Install the event sink, replaying anything that arrived before it.
    pub fn set_event_sink(&self, sink: impl FnMut(RadioEvent) + Send + 'static) {
        let mut dispatch = lock(&self.dispatch);
        let mut sink: EventSink = Box::new(sink);
        for event in dispatch.backlog.drain(..) {
            sink(event);
        }
        dispatch.sink = Some(sink);
    }
}

fn ble_uuid(uuid: &uuid::Uuid) -> BleUuid {
    BleUuid::from_uuid128(uuid_le_bytes(uuid))
}

fn properties(access: CharAccess) -> NimbleProperties {
    let mut props = NimbleProperties::empty();
    if access.read {
        props |= NimbleProperties::READ;
    }
    if access.write {
        props |= NimbleProperties::WRITE;
    }
    if access.notify {
        props |= NimbleProperties::NOTIFY;
    }
    props
}

fn driver_error(e: impl std::fmt::Debug) -> RadioError {
    RadioError::Driver(format!("{:?}", e))
}

impl GattRadio for NimbleRadio {
    fn register_service(&self, service: &ServiceDefinition) -> Result<ServiceHandles, RadioError> {
        let server = BLEDevice::take().get_server();
        let ble_service = server.create_service(ble_uuid(&service.uuid));

        let mut handles = [CharHandle(0); 3];
        for (i, def) in service.characteristics().into_iter().enumerate() {
            let handle = CharHandle(i as u16 + 1);
            let characteristic = ble_service
                .lock()
                .create_characteristic(ble_uuid(&def.uuid), properties(def.access));

            if def.access.read {
                let values = self.values.clone();
                characteristic.lock().on_read(move |attr, _conn| {
                    if let Some(value) = lock(&values).get(&handle) {
                        attr.set_value(value);
                    }
                });
            }

            if def.access.write {
                let dispatch = self.dispatch.clone();
                let capacity = def.capacity;
                characteristic.lock().on_write(move |args| {
                    let data = args.recv_data();
                    let len = data.len().min(capacity);
                    lock(&dispatch).deliver(RadioEvent::Write {
                        handle,
                        data: data[..len].to_vec(),
                    });
                });
            }

            if def.access.notify {
                lock(&self.notifiers).insert(handle, characteristic.clone());
            }

            handles[i] = handle;
        }

        Ok(ServiceHandles {
            network_id: handles[0],
            network_secret: handles[1],
            status: handles[2],
        })
    }

    fn advertise(&self, payload: &AdvertisingPayload, interval: Duration) -> Result<(), RadioError> {
        let units = (interval.as_micros() / ADV_INTERVAL_UNIT_US).min(u128::from(u16::MAX)) as u16;

        let mut advertising = BLEDevice::take().get_advertising().lock();
        if advertising.is_advertising() {
            advertising.stop().map_err(driver_error)?;
        }
        advertising.min_interval(units).max_interval(units);
        advertising
            .set_raw_data(payload.as_bytes())
            .map_err(driver_error)?;
        advertising.start().map_err(driver_error)
    }

    fn gatt_write(&self, handle: CharHandle, value: &[u8]) -> Result<(), RadioError> {
        lock(&self.values).insert(handle, value.to_vec());
        if let Some(characteristic) = lock(&self.notifiers).get(&handle) {
            characteristic.lock().set_value(value);
        }
        Ok(())
    }

    fn gatt_read(&self, handle: CharHandle) -> Result<Vec<u8>, RadioError> {
        lock(&self.values)
            .get(&handle)
            .cloned()
            .ok_or(RadioError::UnknownHandle(handle))
    }

    fn notify(&self, handle: CharHandle) -> Result<(), RadioError> {
        match lock(&self.notifiers).get(&handle) {
            Some(characteristic) => {
                characteristic.lock().notify();
                Ok(())
            }
            None => {
                warn!("Notify on non-notifying characteristic {}", handle);
                Err(RadioError::NotPermitted {
                    handle,
                    op: "notify",
                })
            }
        }
    }
}
