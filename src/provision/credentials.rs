//! Credential store.
//!
//! Holds the network identifier and secret written by the central. Writes
//! arrive in fixed-size buffers; only the prefix up to the first pad byte
//! (`0x00`) is stored. Pure state, no I/O.

use crate::config::{MAX_NETWORK_ID_LEN, MAX_NETWORK_SECRET_LEN};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Pad byte filling unused space in a characteristic buffer.
pub const PAD_BYTE: u8 = 0x00;

/// The two writable credential fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    NetworkId,
    NetworkSecret,
}

impl CredentialField {
    /// Size of the characteristic buffer backing this field.
    pub fn capacity(self) -> usize {
        match self {
            Self::NetworkId => MAX_NETWORK_ID_LEN,
            Self::NetworkSecret => MAX_NETWORK_SECRET_LEN,
        }
    }
}

impl fmt::Display for CredentialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkId => write!(f, "network id"),
            Self::NetworkSecret => write!(f, "network secret"),
        }
    }
}

/// Result of a field write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The stored value differs from what was there before.
    Changed,
    /// The same value was written again.
    Unchanged,
}

/// The meaningful prefix of a padded buffer.
pub fn strip_padding(raw: &[u8]) -> &[u8] {
    match raw.iter().position(|&b| b == PAD_BYTE) {
        Some(end) => &raw[..end],
        None => raw,
    }
}

/// Partial credentials accumulated from characteristic writes.
#[derive(Default)]
pub struct CredentialStore {
    network_id: String,
    network_secret: Zeroizing<String>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and store a field write.
    ///
    /// Invalid UTF-8 is rejected and leaves the stored value untouched.
    pub fn write_field(
        &mut self,
        field: CredentialField,
        raw: &[u8],
    ) -> Result<WriteOutcome, CredentialError> {
        let value = std::str::from_utf8(strip_padding(raw)).map_err(|e| {
            CredentialError::InvalidUtf8 {
                field,
                valid_up_to: e.valid_up_to(),
            }
        })?;

        let slot: &mut String = match field {
            CredentialField::NetworkId => &mut self.network_id,
            CredentialField::NetworkSecret => &mut *self.network_secret,
        };
        if slot.as_str() == value {
            return Ok(WriteOutcome::Unchanged);
        }
        slot.zeroize();
        slot.push_str(value);
        Ok(WriteOutcome::Changed)
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    pub fn has_secret(&self) -> bool {
        !self.network_secret.is_empty()
    }

    /// Both fields are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.network_id.is_empty() && self.has_secret()
    }

    /// Copy of the stored credentials, if complete.
    pub fn snapshot(&self) -> Option<Credentials> {
        self.is_complete()
            .then(|| Credentials::new(&self.network_id, &self.network_secret))
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("network_id", &self.network_id)
            .field("secret_len", &self.network_secret.len())
            .finish()
    }
}

/// A complete set of credentials, wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    network_id: String,
    network_secret: String,
}

impl Credentials {
    pub fn new(network_id: &str, network_secret: &str) -> Self {
        Self {
            network_id: network_id.to_string(),
            network_secret: network_secret.to_string(),
        }
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    pub fn network_secret(&self) -> &str {
        &self.network_secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("network_id", &self.network_id)
            .field(
                "network_secret",
                &format_args!("<{} bytes>", self.network_secret.len()),
            )
            .finish()
    }
}

/// Rejected credential writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// The written bytes are not valid UTF-8.
    InvalidUtf8 {
        field: CredentialField,
        valid_up_to: usize,
    },
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUtf8 { field, valid_up_to } => write!(
                f,
                "{} is not valid UTF-8 (valid up to byte {})",
                field, valid_up_to
            ),
        }
    }
}

impl std::error::Error for CredentialError {}
