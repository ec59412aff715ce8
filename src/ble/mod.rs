//! BLE transport: GATT service definition, advertising, and radio drivers.
//!
//! # Components
//!
//! - [`gatt`] - service definition, event type and the [`GattRadio`] driver seam
//! - [`advertising`] - advertising payload builder and [`Advertiser`]
//! - [`host`] - in-memory radio for host builds and tests
//! - `nimble` - NimBLE driver (ESP32 only)

pub mod advertising;
pub mod gatt;
#[cfg(not(feature = "esp32"))]
pub mod host;
#[cfg(feature = "esp32")]
mod nimble;

pub use advertising::{uuid_le_bytes, AdvertisingPayload, Advertiser, MAX_ADVERTISED_NAME_LEN};
pub use gatt::{
    CharAccess, CharHandle, CharacteristicDef, GattRadio, RadioError, RadioEvent,
    ServiceDefinition, ServiceHandles,
};
#[cfg(not(feature = "esp32"))]
pub use host::SimRadio;
#[cfg(feature = "esp32")]
pub use nimble::NimbleRadio;
