//! Provisioner: construction point and main loop.
//!
//! [`Provisioner::start`] brings the service up and splits it into two
//! halves: the [`ServiceHandler`], which belongs to the radio callback
//! context, and the `Provisioner` itself, which runs connect attempts on the
//! main loop. They share the credential store and a [`ConnectRequest`].

use super::connection::{ConnectFailure, ConnectTiming, ConnectionManager};
use super::credentials::{CredentialStore, Credentials};
use super::handler::ServiceHandler;
use super::status::{ConnectionState, StatusChannel};
use crate::ble::{Advertiser, GattRadio, RadioError, ServiceDefinition, ServiceHandles};
use crate::config::{ConfigError, ProvisionConfig, MAX_NETWORK_ID_LEN, MAX_NETWORK_SECRET_LEN};
use crate::indicator::Indicator;
use crate::lock;
use crate::network::NetworkInterface;
use log::info;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Connect trigger shared between the callback context and the main loop.
///
/// Each request bumps a generation counter. At most one attempt is in flight;
/// requests made meanwhile are not run on their own, the running attempt
/// re-checks the stored credentials when it finishes.
#[derive(Debug, Default)]
pub struct ConnectRequest {
    generation: AtomicU32,
    in_flight: AtomicBool,
}

impl ConnectRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an attempt. Returns `false` if one is already in flight.
    pub fn request(&self) -> bool {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if self.in_flight.load(Ordering::SeqCst) {
            info!("Connect attempt in flight, new credentials will be checked when it ends");
            return false;
        }
        true
    }

    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Mark an attempt as running; `None` if one already is.
    pub fn try_begin(&self) -> Option<InFlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlightGuard { request: self })
    }
}

/// Clears the in-flight flag when dropped.
pub struct InFlightGuard<'a> {
    request: &'a ConnectRequest,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.request.in_flight.store(false, Ordering::SeqCst);
    }
}

/// Main-loop half of the provisioning service.
pub struct Provisioner<R: GattRadio, N: NetworkInterface> {
    manager: ConnectionManager<N, R>,
    credentials: Arc<Mutex<CredentialStore>>,
    request: Arc<ConnectRequest>,
    handled_generation: u32,
    loop_tick: Duration,
}

impl<R: GattRadio, N: NetworkInterface> Provisioner<R, N> {
    /// Register the service, publish `Idle` and start advertising.
    ///
    /// Returns the main-loop half and the handler to hook into the radio's
    /// event callback.
    pub fn start<I: Indicator>(
        radio: Arc<R>,
        network: N,
        indicator: I,
        config: &ProvisionConfig,
    ) -> Result<(Self, ServiceHandler<R, I>), ProvisionError> {
        config.validate()?;

        let service = ServiceDefinition::provisioning(config);
        let handles = radio
            .register_service(&service)
            .map_err(ProvisionError::TransportUnavailable)?;
        write_initial_values(radio.as_ref(), &handles)?;

        let status = StatusChannel::new(radio.clone(), handles.status);
        let manager = ConnectionManager::new(network, status, ConnectTiming::from_config(config));

        let advertiser = Advertiser::new(radio.clone(), config);
        advertiser
            .start_advertising()
            .map_err(ProvisionError::TransportUnavailable)?;

        let credentials = Arc::new(Mutex::new(CredentialStore::new()));
        let request = Arc::new(ConnectRequest::new());
        let handler = ServiceHandler::new(
            radio,
            advertiser,
            handles,
            credentials.clone(),
            request.clone(),
            indicator,
        );

        info!("Provisioning service '{}' ready", config.device_name);
        Ok((
            Self {
                manager,
                credentials,
                request,
                handled_generation: 0,
                loop_tick: config.loop_tick(),
            },
            handler,
        ))
    }

    /// One main-loop step.
    ///
    /// Runs the requested attempt, if any, to completion. Afterwards the
    /// latest stored credentials are compared with the ones just tried and a
    /// fresh attempt follows if they differ. Returns `None` when nothing was
    /// attempted.
    pub fn run_pending(&mut self) -> Option<Result<(), ConnectFailure>> {
        let generation = self.request.generation();
        if generation == self.handled_generation {
            return None;
        }

        let request = Arc::clone(&self.request);
        let _guard = request.try_begin()?;
        self.handled_generation = generation;
        let mut credentials = self.snapshot()?;

        loop {
            let result = self.manager.attempt_connect(&credentials);

            let latest_generation = request.generation();
            if latest_generation == self.handled_generation {
                return Some(result);
            }
            self.handled_generation = latest_generation;

            match self.snapshot() {
                Some(latest) if latest != credentials => {
                    info!("Credentials changed during the attempt, retrying with the latest");
                    credentials = latest;
                }
                _ => return Some(result),
            }
        }
    }

    /// Run until `shutdown` is set.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        info!("Provisioning loop running");
        while !shutdown.load(Ordering::SeqCst) {
            std::thread::sleep(self.loop_tick);
            self.run_pending();
        }
        info!("Provisioning loop stopped");
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// The live network interface, only while `Connected`.
    pub fn network(&self) -> Option<&N> {
        self.manager.network()
    }

    pub fn network_mut(&mut self) -> Option<&mut N> {
        self.manager.network_mut()
    }

    fn snapshot(&self) -> Option<Credentials> {
        lock(&self.credentials).snapshot()
    }
}

fn write_initial_values<R: GattRadio>(
    radio: &R,
    handles: &ServiceHandles,
) -> Result<(), ProvisionError> {
    radio
        .gatt_write(handles.network_id, &[0; MAX_NETWORK_ID_LEN])
        .and_then(|_| radio.gatt_write(handles.network_secret, &[0; MAX_NETWORK_SECRET_LEN]))
        .map_err(ProvisionError::TransportUnavailable)
}

/// Errors that stop the service from starting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    /// The radio stack could not register the service or advertise.
    TransportUnavailable(RadioError),
    /// The configuration is invalid.
    Config(ConfigError),
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportUnavailable(e) => write!(f, "transport unavailable: {}", e),
            Self::Config(e) => write!(f, "invalid configuration: {}", e),
        }
    }
}

impl std::error::Error for ProvisionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TransportUnavailable(e) => Some(e),
            Self::Config(e) => Some(e),
        }
    }
}

impl From<ConfigError> for ProvisionError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
