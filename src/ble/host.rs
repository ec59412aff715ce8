//! In-memory radio for host builds.
//!
//! Behaves like a single-connection peripheral stack: a GATT table with fixed
//! size backing buffers, advertising that stops when a central connects, and
//! notifications that are only delivered once the central subscribes. The
//! `central_*` methods play the phone side and return the [`RadioEvent`] the
//! real stack would raise, so callers can feed it to the service handler.

use super::advertising::AdvertisingPayload;
use super::gatt::{
    CharAccess, CharHandle, GattRadio, RadioError, RadioEvent, ServiceDefinition, ServiceHandles,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// First handle assigned at registration (0x0001 is usually the service itself).
const FIRST_CHAR_HANDLE: u16 = 0x0010;

#[derive(Debug)]
struct SimCharacteristic {
    access: CharAccess,
    capacity: usize,
    value: Vec<u8>,
}

#[derive(Debug, Default)]
struct SimRadioState {
    characteristics: BTreeMap<CharHandle, SimCharacteristic>,
    advertising: Option<(AdvertisingPayload, Duration)>,
    advertise_count: u32,
    central_connected: bool,
    subscribed: bool,
    notifications: Vec<(CharHandle, Vec<u8>)>,
}

/// Simulated BLE peripheral stack.
#[derive(Debug, Default)]
pub struct SimRadio {
    state: Mutex<SimRadioState>,
    unavailable: bool,
}

impl SimRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// A radio whose stack never comes up; registration and advertising fail.
    pub fn unavailable() -> Self {
        Self {
            state: Mutex::default(),
            unavailable: true,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimRadioState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Central side ====================

    /// A central connects; the peripheral stops advertising.
    pub fn central_connect(&self) -> RadioEvent {
        let mut state = self.lock();
        state.central_connected = true;
        state.advertising = None;
        RadioEvent::CentralConnect
    }

    /// The central disconnects and its subscriptions are dropped.
    pub fn central_disconnect(&self) -> RadioEvent {
        let mut state = self.lock();
        state.central_connected = false;
        state.subscribed = false;
        RadioEvent::CentralDisconnect
    }

    /// Enable or disable notifications (CCCD write) for the connected central.
    pub fn central_subscribe(&self, enabled: bool) {
        self.lock().subscribed = enabled;
    }

    /// Write from the central.
    ///
    /// Data longer than the characteristic buffer is truncated, as the real
    /// stack does, before the write event is raised.
    pub fn central_write(&self, handle: CharHandle, data: &[u8]) -> Result<RadioEvent, RadioError> {
        let mut state = self.lock();
        let characteristic = state
            .characteristics
            .get_mut(&handle)
            .ok_or(RadioError::UnknownHandle(handle))?;
        if !characteristic.access.write {
            return Err(RadioError::NotPermitted { handle, op: "write" });
        }
        let len = data.len().min(characteristic.capacity);
        characteristic.value = data[..len].to_vec();
        Ok(RadioEvent::Write {
            handle,
            data: characteristic.value.clone(),
        })
    }

    /// Read from the central; write-only characteristics are refused.
    pub fn central_read(&self, handle: CharHandle) -> Result<Vec<u8>, RadioError> {
        let state = self.lock();
        let characteristic = state
            .characteristics
            .get(&handle)
            .ok_or(RadioError::UnknownHandle(handle))?;
        if !characteristic.access.read {
            return Err(RadioError::NotPermitted { handle, op: "read" });
        }
        Ok(characteristic.value.clone())
    }

    // ==================== Inspection ====================

    pub fn is_advertising(&self) -> bool {
        self.lock().advertising.is_some()
    }

    /// Number of times advertising was (re)started.
    pub fn advertise_count(&self) -> u32 {
        self.lock().advertise_count
    }

    /// Payload currently being broadcast.
    pub fn advertising_payload(&self) -> Option<AdvertisingPayload> {
        self.lock().advertising.as_ref().map(|(p, _)| p.clone())
    }

    pub fn advertising_interval(&self) -> Option<Duration> {
        self.lock().advertising.as_ref().map(|(_, i)| *i)
    }

    pub fn is_central_connected(&self) -> bool {
        self.lock().central_connected
    }

    /// Notifications delivered so far, oldest first.
    pub fn notifications(&self) -> Vec<(CharHandle, Vec<u8>)> {
        self.lock().notifications.clone()
    }
}

impl GattRadio for SimRadio {
    fn register_service(&self, service: &ServiceDefinition) -> Result<ServiceHandles, RadioError> {
        if self.unavailable {
            return Err(RadioError::Unavailable("simulated stack failure".to_string()));
        }

        let mut state = self.lock();
        state.characteristics.clear();

        let mut handles = Vec::with_capacity(3);
        for (i, def) in service.characteristics().into_iter().enumerate() {
            let handle = CharHandle(FIRST_CHAR_HANDLE + 2 * i as u16);
            state.characteristics.insert(
                handle,
                SimCharacteristic {
                    access: def.access,
                    capacity: def.capacity,
                    value: Vec::new(),
                },
            );
            handles.push(handle);
        }

        Ok(ServiceHandles {
            network_id: handles[0],
            network_secret: handles[1],
            status: handles[2],
        })
    }

    fn advertise(&self, payload: &AdvertisingPayload, interval: Duration) -> Result<(), RadioError> {
        if self.unavailable {
            return Err(RadioError::Unavailable("simulated stack failure".to_string()));
        }
        let mut state = self.lock();
        state.advertising = Some((payload.clone(), interval));
        state.advertise_count += 1;
        Ok(())
    }

    fn gatt_write(&self, handle: CharHandle, value: &[u8]) -> Result<(), RadioError> {
        let mut state = self.lock();
        let characteristic = state
            .characteristics
            .get_mut(&handle)
            .ok_or(RadioError::UnknownHandle(handle))?;
        let len = value.len().min(characteristic.capacity);
        characteristic.value = value[..len].to_vec();
        Ok(())
    }

    fn gatt_read(&self, handle: CharHandle) -> Result<Vec<u8>, RadioError> {
        self.lock()
            .characteristics
            .get(&handle)
            .map(|c| c.value.clone())
            .ok_or(RadioError::UnknownHandle(handle))
    }

    fn notify(&self, handle: CharHandle) -> Result<(), RadioError> {
        let mut state = self.lock();
        let characteristic = state
            .characteristics
            .get(&handle)
            .ok_or(RadioError::UnknownHandle(handle))?;
        if !characteristic.access.notify {
            return Err(RadioError::NotPermitted {
                handle,
                op: "notify",
            });
        }
        if state.central_connected && state.subscribed {
            let value = characteristic.value.clone();
            state.notifications.push((handle, value));
        }
        Ok(())
    }
}
