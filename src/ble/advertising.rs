//! Advertising payload construction and the advertiser.
//!
//! The payload is a legacy (31-byte) advertising PDU made of three AD
//! structures, each `[len][type][data...]`:
//!
//! ```text
//! 02 01 06                      flags: LE general discoverable, BR/EDR unsupported
//! NN 09 <name bytes>            complete local name (0x08 shortened if it won't fit)
//! 11 07 <16 uuid bytes, LE>     complete list of 128-bit service UUIDs
//! ```

use super::gatt::{GattRadio, RadioError};
use crate::config::ProvisionConfig;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// AD type: flags.
pub const AD_TYPE_FLAGS: u8 = 0x01;
/// AD type: complete list of 128-bit service UUIDs.
pub const AD_TYPE_UUID128_COMPLETE: u8 = 0x07;
/// AD type: shortened local name.
pub const AD_TYPE_NAME_SHORT: u8 = 0x08;
/// AD type: complete local name.
pub const AD_TYPE_NAME_COMPLETE: u8 = 0x09;

/// LE General Discoverable Mode | BR/EDR Not Supported.
pub const FLAGS_GENERAL_DISCOVERABLE: u8 = 0x06;

/// Maximum legacy advertising data length.
pub const MAX_ADV_DATA_LEN: usize = 31;

const FLAGS_FIELD_LEN: usize = 3;
const UUID128_FIELD_LEN: usize = 18;
const AD_HEADER_LEN: usize = 2;

/// Room left for name bytes once flags and the service UUID are placed.
pub const MAX_ADVERTISED_NAME_LEN: usize =
    MAX_ADV_DATA_LEN - FLAGS_FIELD_LEN - UUID128_FIELD_LEN - AD_HEADER_LEN;

/// Encode a UUID in the little-endian byte order used on air.
pub fn uuid_le_bytes(uuid: &Uuid) -> [u8; 16] {
    let mut bytes = *uuid.as_bytes();
    bytes.reverse();
    bytes
}

/// An immutable advertising payload.
///
/// Built fresh on every (re-)advertise; never patched in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingPayload {
    bytes: Vec<u8>,
    name_shortened: bool,
}

impl AdvertisingPayload {
    /// Build the payload for `device_name` and `service_uuid`.
    ///
    /// Names longer than [`MAX_ADVERTISED_NAME_LEN`] are cut at a character
    /// boundary and sent as a shortened local name.
    pub fn new(device_name: &str, service_uuid: &Uuid) -> Self {
        let mut bytes = Vec::with_capacity(MAX_ADV_DATA_LEN);

        bytes.extend_from_slice(&[2, AD_TYPE_FLAGS, FLAGS_GENERAL_DISCOVERABLE]);

        let (name, name_shortened) = fit_name(device_name, MAX_ADVERTISED_NAME_LEN);
        if !name.is_empty() {
            let ad_type = if name_shortened {
                AD_TYPE_NAME_SHORT
            } else {
                AD_TYPE_NAME_COMPLETE
            };
            bytes.push((name.len() + 1) as u8);
            bytes.push(ad_type);
            bytes.extend_from_slice(name.as_bytes());
        }

        bytes.push(17);
        bytes.push(AD_TYPE_UUID128_COMPLETE);
        bytes.extend_from_slice(&uuid_le_bytes(service_uuid));

        Self {
            bytes,
            name_shortened,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True if the name was sent as a shortened local name.
    pub fn is_name_shortened(&self) -> bool {
        self.name_shortened
    }

    /// Iterate the AD structures as `(type, data)` pairs.
    pub fn fields(&self) -> AdFields<'_> {
        AdFields { rest: &self.bytes }
    }
}

/// Iterator over the AD structures of a payload.
pub struct AdFields<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for AdFields<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (&len, tail) = self.rest.split_first()?;
        let len = len as usize;
        if len == 0 || tail.len() < len {
            self.rest = &[];
            return None;
        }
        let (field, rest) = tail.split_at(len);
        self.rest = rest;
        Some((field[0], &field[1..]))
    }
}

/// Cut `name` to at most `max` bytes without splitting a character.
fn fit_name(name: &str, max: usize) -> (&str, bool) {
    if name.len() <= max {
        return (name, false);
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    (&name[..end], true)
}

/// Makes the device discoverable.
///
/// Owns the advertised identity; every call to [`start_advertising`]
/// regenerates the payload and restarts the broadcast.
///
/// [`start_advertising`]: Advertiser::start_advertising
pub struct Advertiser<R: GattRadio> {
    radio: Arc<R>,
    device_name: String,
    service_uuid: Uuid,
    interval: Duration,
}

impl<R: GattRadio> Advertiser<R> {
    pub fn new(radio: Arc<R>, config: &ProvisionConfig) -> Self {
        Self {
            radio,
            device_name: config.device_name.clone(),
            service_uuid: config.service_uuid,
            interval: config.advertising_interval(),
        }
    }

    /// Build a fresh payload and (re)start broadcasting it.
    ///
    /// Calling this while already advertising restarts the broadcast.
    pub fn start_advertising(&self) -> Result<(), RadioError> {
        let payload = AdvertisingPayload::new(&self.device_name, &self.service_uuid);
        self.radio.advertise(&payload, self.interval)?;
        info!(
            "BLE advertising started as '{}' ({} bytes every {} ms)",
            self.device_name,
            payload.len(),
            self.interval.as_millis()
        );
        Ok(())
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}
