//! Connection manager: the bounded connect procedure.
//!
//! Owns the network interface and the status channel. An attempt publishes
//! `Connecting`, drops any previous association, waits for the radio to
//! settle, starts the join and polls the link status once per tick until it
//! is definitive or the poll budget runs out.

use super::credentials::Credentials;
use super::status::{ConnectionState, StatusChannel};
use crate::ble::GattRadio;
use crate::config::ProvisionConfig;
use crate::network::{LinkStatus, NetworkInterface};
use log::{debug, info, warn};
use std::fmt;
use std::time::Duration;

/// Timing of a connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectTiming {
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub settle_delay: Duration,
}

impl ConnectTiming {
    pub fn from_config(config: &ProvisionConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_polls: config.max_polls,
            settle_delay: config.settle_delay(),
        }
    }

    /// Upper bound on time spent waiting inside one attempt.
    pub fn worst_case(&self) -> Duration {
        self.settle_delay + self.poll_interval * self.max_polls
    }
}

impl Default for ConnectTiming {
    fn default() -> Self {
        Self::from_config(&ProvisionConfig::default())
    }
}

/// Why an attempt did not end connected.
///
/// The central only ever sees the `Error` status byte; these are for logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectFailure {
    /// The poll budget ran out; `last` is the final link status seen.
    Timeout { last: LinkStatus },
    /// The access point rejected the secret.
    AuthFailure,
    /// No access point with the identifier was found.
    PeerNotFound,
    /// The interface refused the request or reported a generic failure.
    Other(String),
}

impl ConnectFailure {
    /// Classify the link status an attempt ended with.
    pub fn classify(status: LinkStatus) -> Result<(), ConnectFailure> {
        match status {
            LinkStatus::GotIp => Ok(()),
            LinkStatus::WrongSecret => Err(Self::AuthFailure),
            LinkStatus::NoPeerFound => Err(Self::PeerNotFound),
            LinkStatus::ConnectFail => Err(Self::Other(format!("link reported {}", status))),
            last @ (LinkStatus::Idle | LinkStatus::Connecting | LinkStatus::NoIp) => {
                Err(Self::Timeout { last })
            }
        }
    }
}

impl fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { last } => write!(f, "timed out (last link status: {})", last),
            Self::AuthFailure => write!(f, "authentication failed"),
            Self::PeerNotFound => write!(f, "network not found"),
            Self::Other(msg) => write!(f, "connect failed: {}", msg),
        }
    }
}

impl std::error::Error for ConnectFailure {}

/// Drives the network interface and reports progress on the status channel.
pub struct ConnectionManager<N: NetworkInterface, R: GattRadio> {
    network: N,
    status: StatusChannel<R>,
    state: ConnectionState,
    timing: ConnectTiming,
}

impl<N: NetworkInterface, R: GattRadio> ConnectionManager<N, R> {
    /// Take ownership of `network` and publish `Idle`.
    pub fn new(network: N, mut status: StatusChannel<R>, timing: ConnectTiming) -> Self {
        status.publish(ConnectionState::Idle);
        Self {
            network,
            status,
            state: ConnectionState::Idle,
            timing,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The live interface, only while `Connected`.
    pub fn network(&self) -> Option<&N> {
        (self.state == ConnectionState::Connected).then_some(&self.network)
    }

    pub fn network_mut(&mut self) -> Option<&mut N> {
        if self.state == ConnectionState::Connected {
            Some(&mut self.network)
        } else {
            None
        }
    }

    /// Associated with the network named `network_id` right now.
    pub fn is_connected_to(&self, network_id: &str) -> bool {
        self.network.is_connected()
            && self.network.current_network_id().as_deref() == Some(network_id)
    }

    /// Run one connect attempt to completion.
    ///
    /// Already being associated with `network_id` short-circuits to
    /// `Connected` without touching the interface.
    pub fn attempt_connect(&mut self, credentials: &Credentials) -> Result<(), ConnectFailure> {
        let network_id = credentials.network_id();

        if self.is_connected_to(network_id) {
            info!("Already connected to '{}'", network_id);
            self.transition(ConnectionState::Connected);
            return Ok(());
        }

        self.transition(ConnectionState::Connecting);
        info!(
            "Connecting to '{}' (secret: {} bytes)",
            network_id,
            credentials.network_secret().len()
        );

        let result = self.join(credentials);
        match &result {
            Ok(()) => {
                info!("Connected to '{}'", network_id);
                self.transition(ConnectionState::Connected);
            }
            Err(failure) => {
                warn!("Connecting to '{}' failed: {}", network_id, failure);
                self.transition(ConnectionState::Error);
            }
        }
        result
    }

    fn join(&mut self, credentials: &Credentials) -> Result<(), ConnectFailure> {
        if let Err(e) = self.network.disconnect() {
            debug!("Ignoring disconnect failure before join: {}", e);
        }
        pause(self.timing.settle_delay);

        self.network
            .connect(credentials.network_id(), credentials.network_secret())
            .map_err(|e| ConnectFailure::Other(e.to_string()))?;

        ConnectFailure::classify(self.poll_link())
    }

    fn poll_link(&mut self) -> LinkStatus {
        let max_polls = self.timing.max_polls;
        let mut status = LinkStatus::Connecting;
        for tick in 1..=max_polls {
            status = self.network.link_status();
            debug!("Link status {}/{}: {}", tick, max_polls, status);
            if status.is_definitive() {
                break;
            }
            if tick < max_polls {
                pause(self.timing.poll_interval);
            }
        }
        status
    }

    fn transition(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!("Connection state {} -> {}", self.state, state);
        }
        self.state = state;
        self.status.publish(state);
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::{ServiceDefinition, SimRadio};
    use crate::network::SimNetwork;
    use std::sync::Arc;

    fn instant(max_polls: u32) -> ConnectTiming {
        ConnectTiming {
            poll_interval: Duration::ZERO,
            max_polls,
            settle_delay: Duration::ZERO,
        }
    }

    fn manager(
        network: &SimNetwork,
        max_polls: u32,
    ) -> (Arc<SimRadio>, ConnectionManager<SimNetwork, SimRadio>) {
        let radio = Arc::new(SimRadio::new());
        let handles = radio
            .register_service(&ServiceDefinition::provisioning(&ProvisionConfig::default()))
            .unwrap();
        let status = StatusChannel::new(radio.clone(), handles.status);
        let manager = ConnectionManager::new(network.clone(), status, instant(max_polls));
        (radio, manager)
    }

    // ==================== Classification Tests ====================

    #[test]
    fn test_classify() {
        assert_eq!(ConnectFailure::classify(LinkStatus::GotIp), Ok(()));
        assert_eq!(
            ConnectFailure::classify(LinkStatus::WrongSecret),
            Err(ConnectFailure::AuthFailure)
        );
        assert_eq!(
            ConnectFailure::classify(LinkStatus::NoPeerFound),
            Err(ConnectFailure::PeerNotFound)
        );
        assert!(matches!(
            ConnectFailure::classify(LinkStatus::ConnectFail),
            Err(ConnectFailure::Other(_))
        ));
        assert_eq!(
            ConnectFailure::classify(LinkStatus::NoIp),
            Err(ConnectFailure::Timeout {
                last: LinkStatus::NoIp
            })
        );
    }

    #[test]
    fn test_default_timing() {
        let timing = ConnectTiming::default();
        assert_eq!(timing.max_polls, 30);
        assert_eq!(timing.poll_interval, Duration::from_secs(1));
        assert_eq!(timing.worst_case(), Duration::from_secs(31));
    }

    // ==================== Attempt Tests ====================

    #[test]
    fn test_starts_idle() {
        let network = SimNetwork::new();
        let (_, manager) = manager(&network, 30);
        assert_eq!(manager.state(), ConnectionState::Idle);
        assert!(manager.network().is_none());
    }

    #[test]
    fn test_successful_attempt() {
        let network = SimNetwork::new().with_network("HomeNet", "pw1234");
        network.set_polls_to_resolve(3);
        let (_, mut manager) = manager(&network, 30);

        let result = manager.attempt_connect(&Credentials::new("HomeNet", "pw1234"));

        assert_eq!(result, Ok(()));
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(network.link_status_polls(), 3);
        assert!(manager.network().is_some());
    }

    #[test]
    fn test_wrong_secret_is_auth_failure() {
        let network = SimNetwork::new().with_network("HomeNet", "pw1234");
        let (_, mut manager) = manager(&network, 30);

        let result = manager.attempt_connect(&Credentials::new("HomeNet", "wrongpw"));

        assert_eq!(result, Err(ConnectFailure::AuthFailure));
        assert_eq!(manager.state(), ConnectionState::Error);
        assert_eq!(network.link_status_polls(), 1);
    }

    #[test]
    fn test_unknown_network_is_peer_not_found() {
        let network = SimNetwork::new();
        let (_, mut manager) = manager(&network, 30);
        assert_eq!(
            manager.attempt_connect(&Credentials::new("Nowhere", "x")),
            Err(ConnectFailure::PeerNotFound)
        );
    }

    #[test]
    fn test_timeout_after_exact_poll_budget() {
        let network = SimNetwork::new().with_network("HomeNet", "pw1234");
        network.set_unresponsive(true);
        let (_, mut manager) = manager(&network, 30);

        let result = manager.attempt_connect(&Credentials::new("HomeNet", "pw1234"));

        assert_eq!(
            result,
            Err(ConnectFailure::Timeout {
                last: LinkStatus::Connecting
            })
        );
        assert_eq!(network.link_status_polls(), 30);
        assert_eq!(manager.state(), ConnectionState::Error);
    }

    #[test]
    fn test_disconnects_before_join() {
        let network = SimNetwork::new().with_network("HomeNet", "pw1234");
        let (_, mut manager) = manager(&network, 30);
        manager
            .attempt_connect(&Credentials::new("HomeNet", "pw1234"))
            .unwrap();

        assert_eq!(network.disconnect_calls(), 1);
        assert_eq!(network.connect_calls(), 1);
    }

    #[test]
    fn test_already_connected_short_circuits() {
        let network = SimNetwork::new().with_network("HomeNet", "pw1234");
        let (_, mut manager) = manager(&network, 30);
        let creds = Credentials::new("HomeNet", "pw1234");
        manager.attempt_connect(&creds).unwrap();

        manager.attempt_connect(&creds).unwrap();

        assert_eq!(network.connect_calls(), 1);
        assert_eq!(network.disconnect_calls(), 1);
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_lost_association_reconnects() {
        let network = SimNetwork::new().with_network("HomeNet", "pw1234");
        let (_, mut manager) = manager(&network, 30);
        let creds = Credentials::new("HomeNet", "pw1234");
        manager.attempt_connect(&creds).unwrap();

        network.drop_association();
        manager.attempt_connect(&creds).unwrap();

        assert_eq!(network.connect_calls(), 2);
    }

    #[test]
    fn test_status_sequence_notified() {
        let network = SimNetwork::new().with_network("HomeNet", "pw1234");
        let (radio, mut manager) = manager(&network, 30);
        radio.central_connect();
        radio.central_subscribe(true);

        manager
            .attempt_connect(&Credentials::new("HomeNet", "pw1234"))
            .unwrap();

        let bytes: Vec<u8> = radio.notifications().iter().map(|(_, v)| v[0]).collect();
        assert_eq!(bytes, vec![1, 2]);
    }

    #[test]
    fn test_recovers_from_error() {
        let network = SimNetwork::new().with_network("HomeNet", "correctpw");
        let (_, mut manager) = manager(&network, 30);

        assert!(manager
            .attempt_connect(&Credentials::new("HomeNet", "wrongpw"))
            .is_err());
        assert!(manager
            .attempt_connect(&Credentials::new("HomeNet", "correctpw"))
            .is_ok());
        assert_eq!(manager.state(), ConnectionState::Connected);
    }
}
