//! Simulated network interface for host builds.
//!
//! A table of known networks (identifier → secret). A join resolves after a
//! configurable number of link status polls: unknown identifiers end in
//! [`LinkStatus::NoPeerFound`], a mismatched secret in
//! [`LinkStatus::WrongSecret`], otherwise [`LinkStatus::GotIp`].
//!
//! Clones share state, so a test (or the host console) can keep a handle for
//! inspection after moving one into the connection manager.

use super::{LinkStatus, NetworkError, NetworkInterface};
use crate::config::ConfigError;
use crate::lock;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct PendingJoin {
    network_id: String,
    outcome: LinkStatus,
    polls_left: u32,
}

#[derive(Debug)]
struct SimNetworkState {
    known: BTreeMap<String, String>,
    polls_to_resolve: u32,
    unresponsive: bool,
    associated: Option<String>,
    pending: Option<PendingJoin>,
    status: LinkStatus,
    connect_calls: u32,
    disconnect_calls: u32,
    link_status_polls: u32,
}

impl Default for SimNetworkState {
    fn default() -> Self {
        Self {
            known: BTreeMap::new(),
            polls_to_resolve: 1,
            unresponsive: false,
            associated: None,
            pending: None,
            status: LinkStatus::Idle,
            connect_calls: 0,
            disconnect_calls: 0,
            link_status_polls: 0,
        }
    }
}

/// Simulated WiFi station.
#[derive(Debug, Clone, Default)]
pub struct SimNetwork {
    state: Arc<Mutex<SimNetworkState>>,
}

impl SimNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `id:secret,id:secret` list. An empty secret is an open network.
    pub fn from_spec(spec: &str) -> Result<Self, ConfigError> {
        let network = Self::new();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (id, secret) = entry.split_once(':').ok_or_else(|| {
                ConfigError::InvalidFormat(format!("expected id:secret, got '{}'", entry))
            })?;
            if id.is_empty() {
                return Err(ConfigError::InvalidFormat(format!(
                    "empty network id in '{}'",
                    entry
                )));
            }
            network.add_network(id, secret);
        }
        Ok(network)
    }

    pub fn with_network(self, network_id: &str, secret: &str) -> Self {
        self.add_network(network_id, secret);
        self
    }

    pub fn add_network(&self, network_id: &str, secret: &str) {
        lock(&self.state)
            .known
            .insert(network_id.to_string(), secret.to_string());
    }

    /// Polls a join takes to reach its outcome (minimum 1).
    pub fn set_polls_to_resolve(&self, polls: u32) {
        lock(&self.state).polls_to_resolve = polls.max(1);
    }

    /// Joins never resolve; the link stays `Connecting` forever.
    pub fn set_unresponsive(&self, unresponsive: bool) {
        lock(&self.state).unresponsive = unresponsive;
    }

    /// The access point goes away; the association is lost.
    pub fn drop_association(&self) {
        let mut state = lock(&self.state);
        state.associated = None;
        state.status = LinkStatus::ConnectFail;
    }

    pub fn connect_calls(&self) -> u32 {
        lock(&self.state).connect_calls
    }

    pub fn disconnect_calls(&self) -> u32 {
        lock(&self.state).disconnect_calls
    }

    pub fn link_status_polls(&self) -> u32 {
        lock(&self.state).link_status_polls
    }

    /// Known network identifiers, sorted.
    pub fn known_networks(&self) -> Vec<String> {
        lock(&self.state).known.keys().cloned().collect()
    }
}

impl NetworkInterface for SimNetwork {
    fn is_connected(&self) -> bool {
        lock(&self.state).associated.is_some()
    }

    fn current_network_id(&self) -> Option<String> {
        lock(&self.state).associated.clone()
    }

    fn disconnect(&mut self) -> Result<(), NetworkError> {
        let mut state = lock(&self.state);
        state.disconnect_calls += 1;
        state.associated = None;
        state.pending = None;
        state.status = LinkStatus::Idle;
        Ok(())
    }

    fn connect(&mut self, network_id: &str, secret: &str) -> Result<(), NetworkError> {
        let mut state = lock(&self.state);
        state.connect_calls += 1;

        let outcome = match state.known.get(network_id) {
            None => LinkStatus::NoPeerFound,
            Some(expected) if expected == secret => LinkStatus::GotIp,
            Some(_) => LinkStatus::WrongSecret,
        };
        state.associated = None;
        state.status = LinkStatus::Connecting;
        state.pending = Some(PendingJoin {
            network_id: network_id.to_string(),
            outcome,
            polls_left: state.polls_to_resolve,
        });
        Ok(())
    }

    fn link_status(&mut self) -> LinkStatus {
        let mut state = lock(&self.state);
        state.link_status_polls += 1;

        if state.unresponsive {
            return state.status;
        }

        if let Some(mut join) = state.pending.take() {
            join.polls_left = join.polls_left.saturating_sub(1);
            if join.polls_left > 0 {
                state.pending = Some(join);
            } else {
                state.status = join.outcome;
                if join.outcome.is_success() {
                    state.associated = Some(join.network_id);
                }
            }
        }
        state.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll_until_definitive(network: &mut SimNetwork, max: u32) -> LinkStatus {
        let mut status = LinkStatus::Idle;
        for _ in 0..max {
            status = network.link_status();
            if status.is_definitive() {
                break;
            }
        }
        status
    }

    #[test]
    fn test_join_known_network() {
        let mut network = SimNetwork::new().with_network("HomeNet", "pw1234");
        network.connect("HomeNet", "pw1234").unwrap();

        assert_eq!(network.link_status(), LinkStatus::GotIp);
        assert!(network.is_connected());
        assert_eq!(network.current_network_id().as_deref(), Some("HomeNet"));
    }

    #[test]
    fn test_wrong_secret() {
        let mut network = SimNetwork::new().with_network("HomeNet", "pw1234");
        network.connect("HomeNet", "nope").unwrap();

        assert_eq!(network.link_status(), LinkStatus::WrongSecret);
        assert!(!network.is_connected());
    }

    #[test]
    fn test_unknown_network() {
        let mut network = SimNetwork::new();
        network.connect("Elsewhere", "x").unwrap();
        assert_eq!(network.link_status(), LinkStatus::NoPeerFound);
    }

    #[test]
    fn test_resolves_after_configured_polls() {
        let mut network = SimNetwork::new().with_network("HomeNet", "pw1234");
        network.set_polls_to_resolve(3);
        network.connect("HomeNet", "pw1234").unwrap();

        assert_eq!(network.link_status(), LinkStatus::Connecting);
        assert_eq!(network.link_status(), LinkStatus::Connecting);
        assert_eq!(network.link_status(), LinkStatus::GotIp);
        assert_eq!(network.link_status_polls(), 3);
    }

    #[test]
    fn test_unresponsive_never_resolves() {
        let mut network = SimNetwork::new().with_network("HomeNet", "pw1234");
        network.set_unresponsive(true);
        network.connect("HomeNet", "pw1234").unwrap();

        assert_eq!(poll_until_definitive(&mut network, 100), LinkStatus::Connecting);
        assert_eq!(network.link_status_polls(), 100);
    }

    #[test]
    fn test_disconnect_drops_association() {
        let mut network = SimNetwork::new().with_network("HomeNet", "pw1234");
        network.connect("HomeNet", "pw1234").unwrap();
        network.link_status();
        network.disconnect().unwrap();

        assert!(!network.is_connected());
        assert_eq!(network.link_status(), LinkStatus::Idle);
        assert_eq!(network.disconnect_calls(), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let handle = SimNetwork::new().with_network("HomeNet", "pw1234");
        let mut owned = handle.clone();
        owned.connect("HomeNet", "pw1234").unwrap();
        owned.link_status();

        assert_eq!(handle.connect_calls(), 1);
        assert_eq!(handle.current_network_id().as_deref(), Some("HomeNet"));
    }

    #[test]
    fn test_drop_association() {
        let mut network = SimNetwork::new().with_network("HomeNet", "pw1234");
        network.connect("HomeNet", "pw1234").unwrap();
        network.link_status();
        network.drop_association();
        assert!(!network.is_connected());
        assert_eq!(network.current_network_id(), None);
    }

    #[test]
    fn test_from_spec() {
        let network = SimNetwork::from_spec("HomeNet:pw1234, Cafe:").unwrap();
        assert_eq!(network.known_networks(), vec!["Cafe", "HomeNet"]);

        let mut open = network.clone();
        open.connect("Cafe", "").unwrap();
        assert_eq!(open.link_status(), LinkStatus::GotIp);
    }

    #[test]
    fn test_from_spec_secret_may_contain_colon() {
        let mut network = SimNetwork::from_spec("Lab:a:b").unwrap();
        network.connect("Lab", "a:b").unwrap();
        assert_eq!(network.link_status(), LinkStatus::GotIp);
    }

    #[test]
    fn test_from_spec_rejects_malformed() {
        assert!(matches!(
            SimNetwork::from_spec("HomeNet"),
            Err(ConfigError::InvalidFormat(_))
        ));
        assert!(matches!(
            SimNetwork::from_spec(":secret"),
            Err(ConfigError::InvalidFormat(_))
        ));
        assert!(SimNetwork::from_spec("").unwrap().known_networks().is_empty());
    }
}
