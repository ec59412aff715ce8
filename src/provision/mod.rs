//! Provisioning core.
//!
//! # Components
//!
//! - [`credentials`] - credential store fed by characteristic writes
//! - [`status`] - connection state and the status characteristic
//! - [`connection`] - bounded connect procedure and failure classification
//! - [`handler`] - radio event dispatch (callback context)
//! - [`provisioner`] - construction point and main loop
//!
//! # Flow
//!
//! ```text
//! advertise → central connects → writes → CredentialStore
//!     → complete? ConnectRequest → main loop → ConnectionManager → StatusChannel
//! central disconnects → advertise again
//! ```

pub mod connection;
pub mod credentials;
pub mod handler;
pub mod provisioner;
pub mod status;

pub use connection::{ConnectFailure, ConnectTiming, ConnectionManager};
pub use credentials::{
    strip_padding, CredentialError, CredentialField, CredentialStore, Credentials, WriteOutcome,
};
pub use handler::ServiceHandler;
pub use provisioner::{ConnectRequest, InFlightGuard, ProvisionError, Provisioner};
pub use status::{ConnectionState, StatusChannel};
