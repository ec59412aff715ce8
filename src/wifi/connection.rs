//! WiFi station over the ESP-IDF driver.
//!
//! `connect` is non-blocking: the join runs in the driver and its progress is
//! read back through [`NetworkInterface::link_status`]. Failure reasons come
//! from `StaDisconnected` events on the system event loop.

use super::link_status_from_reason;
use crate::network::{LinkStatus, NetworkError, NetworkInterface};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi, WifiEvent};
use log::{debug, info};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

/// ESP32 WiFi station.
pub struct EspNetwork {
    wifi: EspWifi<'static>,
    /// Last disconnect reason seen since the current join started (0 = none).
    last_reason: Arc<AtomicU16>,
    joining: bool,
    _subscription: EspSubscription<'static, System>,
}

impl EspNetwork {
    /// Create the station driver and subscribe to its disconnect events.
    pub fn new(modem: Modem, sysloop: EspSystemEventLoop) -> Result<Self, NetworkError> {
        let wifi = EspWifi::new(modem, sysloop.clone(), None)?;

        let last_reason = Arc::new(AtomicU16::new(0));
        let event_reason = last_reason.clone();
        let subscription = sysloop.subscribe::<WifiEvent, _>(move |event| {
            if let WifiEvent::StaDisconnected(disconnected) = event {
                let reason = disconnected.reason() as u16;
                debug!("WiFi station disconnected, reason {}", reason);
                event_reason.store(reason, Ordering::SeqCst);
            }
        })?;

        Ok(Self {
            wifi,
            last_reason,
            joining: false,
            _subscription: subscription,
        })
    }

    fn netif_up(&self) -> bool {
        self.wifi.sta_netif().is_up().unwrap_or(false)
    }
}

impl NetworkInterface for EspNetwork {
    fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    fn current_network_id(&self) -> Option<String> {
        if !self.is_connected() {
            return None;
        }
        match self.wifi.get_configuration() {
            Ok(Configuration::Client(client)) => Some(client.ssid.as_str().to_string()),
            _ => None,
        }
    }

    fn disconnect(&mut self) -> Result<(), NetworkError> {
        self.joining = false;
        if self.wifi.is_started()? && self.is_connected() {
            info!("Dropping current WiFi association");
            self.wifi.disconnect()?;
        }
        Ok(())
    }

    fn connect(&mut self, network_id: &str, secret: &str) -> Result<(), NetworkError> {
        let auth_method = if secret.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        let config = Configuration::Client(ClientConfiguration {
            ssid: network_id
                .try_into()
                .map_err(|_| NetworkError::Rejected("network id too long".into()))?,
            password: secret
                .try_into()
                .map_err(|_| NetworkError::Rejected("network secret too long".into()))?,
            auth_method,
            ..Default::default()
        });

        self.wifi.set_configuration(&config)?;
        if !self.wifi.is_started()? {
            self.wifi.start()?;
        }

        self.last_reason.store(0, Ordering::SeqCst);
        self.wifi.connect()?;
        self.joining = true;
        Ok(())
    }

    fn link_status(&mut self) -> LinkStatus {
        if self.is_connected() {
            return if self.netif_up() {
                LinkStatus::GotIp
            } else {
                LinkStatus::NoIp
            };
        }
        if !self.joining {
            return LinkStatus::Idle;
        }
        link_status_from_reason(self.last_reason.load(Ordering::SeqCst))
    }
}
