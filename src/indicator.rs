//! Status indicator (LED) driven by the service handler.
//!
//! On while a central is connected, off otherwise.

use log::info;

/// A binary indicator.
pub trait Indicator: Send {
    fn set(&mut self, on: bool);
}

/// Indicator for boards without one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndicator;

impl Indicator for NoIndicator {
    fn set(&mut self, _on: bool) {}
}

/// Logs indicator changes (host builds).
#[derive(Debug, Default)]
pub struct LogIndicator {
    on: bool,
}

impl LogIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}

impl Indicator for LogIndicator {
    fn set(&mut self, on: bool) {
        if self.on != on {
            info!("Indicator {}", if on { "on" } else { "off" });
        }
        self.on = on;
    }
}

#[cfg(feature = "esp32")]
pub use led::LedIndicator;

#[cfg(feature = "esp32")]
mod led {
    use super::Indicator;
    use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};
    use esp_idf_sys::EspError;
    use log::warn;

    /// GPIO-driven LED (active high).
    pub struct LedIndicator {
        pin: PinDriver<'static, AnyOutputPin, Output>,
    }

    impl LedIndicator {
        pub fn new(pin: AnyOutputPin) -> Result<Self, EspError> {
            let mut pin = PinDriver::output(pin)?;
            pin.set_low()?;
            Ok(Self { pin })
        }
    }

    impl Indicator for LedIndicator {
        fn set(&mut self, on: bool) {
            let result = if on {
                self.pin.set_high()
            } else {
                self.pin.set_low()
            };
            if let Err(e) = result {
                warn!("Failed to drive LED: {:?}", e);
            }
        }
    }
}
