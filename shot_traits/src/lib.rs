//! Hardware seams for the shot controller.
//!
//! Everything the control core touches on the outside world goes through
//! these traits so the core can run against simulated devices in tests.
//! Errors cross the boundary as boxed trait objects; `shot_core::hw_error`
//! maps them to typed errors.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// Proxy for the wireless scale.
///
/// Every call may fail. Callers treat failures as non-fatal and retry on the
/// next tick.
pub trait ScaleLink {
    fn is_connected(&self) -> bool;

    /// Latest weight in grams; `None` when the scale has not reported yet.
    fn weight(&mut self) -> Result<Option<f32>, Box<dyn std::error::Error + Send + Sync>>;

    /// Battery level in percent; `None` when the scale has not reported yet.
    fn battery_pct(&mut self) -> Result<Option<u8>, Box<dyn std::error::Error + Send + Sync>>;

    /// Scan for scales for at most `timeout`, returning device addresses.
    fn discover(
        &mut self,
        timeout: Duration,
    ) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>>;

    /// Bind the address used by the next `connect`.
    fn set_address(&mut self, address: &str);

    fn connect(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn disconnect(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn tare(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Dispense actuator.
pub trait Relay {
    fn on(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn off(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn is_on(&self) -> bool;
}

impl<T: ScaleLink + ?Sized> ScaleLink for Box<T> {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
    fn weight(&mut self) -> Result<Option<f32>, Box<dyn std::error::Error + Send + Sync>> {
        (**self).weight()
    }
    fn battery_pct(&mut self) -> Result<Option<u8>, Box<dyn std::error::Error + Send + Sync>> {
        (**self).battery_pct()
    }
    fn discover(
        &mut self,
        timeout: Duration,
    ) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
        (**self).discover(timeout)
    }
    fn set_address(&mut self, address: &str) {
        (**self).set_address(address);
    }
    fn connect(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).connect()
    }
    fn disconnect(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).disconnect()
    }
    fn tare(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).tare()
    }
}

impl<T: Relay + ?Sized> Relay for Box<T> {
    fn on(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).on()
    }
    fn off(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).off()
    }
    fn is_on(&self) -> bool {
        (**self).is_on()
    }
}

/// One poll of the operator panel. `true` means pressed / switched on.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PanelLevels {
    pub paddle: bool,
    pub tare: bool,
    pub preset: bool,
    pub target_up: bool,
    pub target_down: bool,
    pub link_switch: bool,
}

/// Debounced physical controls.
pub trait OperatorPanel {
    fn levels(&mut self) -> Result<PanelLevels, Box<dyn std::error::Error + Send + Sync>>;
}
