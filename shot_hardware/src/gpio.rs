//! GPIO relay and operator panel (Raspberry Pi, via rppal).
//!
//! Inputs are wired active-low with the internal pull-ups enabled. The
//! debounce window is applied here so the core only ever sees stable levels.
use std::time::{Duration, Instant};

use rppal::gpio::{Gpio, InputPin, OutputPin};
use shot_traits::{OperatorPanel, PanelLevels, Relay};

use crate::error::{HwError, Result};

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

pub struct GpioRelay {
    pin: OutputPin,
}

impl GpioRelay {
    pub fn new(gpio: &Gpio, pin: u8) -> Result<Self> {
        let mut pin = gpio.get(pin).map_err(gpio_err)?.into_output();
        pin.set_low();
        Ok(Self { pin })
    }
}

impl Relay for GpioRelay {
    fn on(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pin.set_high();
        Ok(())
    }
    fn off(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pin.set_low();
        Ok(())
    }
    fn is_on(&self) -> bool {
        self.pin.is_set_high()
    }
}

/// Pin assignment for `GpioPanel`.
#[derive(Debug, Clone, Copy)]
pub struct PanelPins {
    pub paddle: u8,
    pub tare: u8,
    pub preset: u8,
    pub target_up: u8,
    pub target_down: u8,
    pub link_switch: u8,
}

struct Debounced {
    pin: InputPin,
    stable: bool,
    candidate: bool,
    since: Instant,
}

impl Debounced {
    fn new(gpio: &Gpio, pin: u8, now: Instant) -> Result<Self> {
        let pin = gpio.get(pin).map_err(gpio_err)?.into_input_pullup();
        let level = pin.is_low();
        Ok(Self {
            pin,
            stable: level,
            candidate: level,
            since: now,
        })
    }

    fn sample(&mut self, now: Instant, window: Duration) -> bool {
        let level = self.pin.is_low();
        if level != self.candidate {
            self.candidate = level;
            self.since = now;
        } else if level != self.stable && now.duration_since(self.since) >= window {
            self.stable = level;
        }
        self.stable
    }
}

pub struct GpioPanel {
    paddle: Debounced,
    tare: Debounced,
    preset: Debounced,
    target_up: Debounced,
    target_down: Debounced,
    link_switch: Debounced,
    window: Duration,
}

impl GpioPanel {
    pub fn new(gpio: &Gpio, pins: PanelPins, debounce: Duration) -> Result<Self> {
        let now = Instant::now();
        Ok(Self {
            paddle: Debounced::new(gpio, pins.paddle, now)?,
            tare: Debounced::new(gpio, pins.tare, now)?,
            preset: Debounced::new(gpio, pins.preset, now)?,
            target_up: Debounced::new(gpio, pins.target_up, now)?,
            target_down: Debounced::new(gpio, pins.target_down, now)?,
            link_switch: Debounced::new(gpio, pins.link_switch, now)?,
            window: debounce,
        })
    }
}

impl OperatorPanel for GpioPanel {
    fn levels(
        &mut self,
    ) -> std::result::Result<PanelLevels, Box<dyn std::error::Error + Send + Sync>> {
        let now = Instant::now();
        let w = self.window;
        Ok(PanelLevels {
            paddle: self.paddle.sample(now, w),
            tare: self.tare.sample(now, w),
            preset: self.preset.sample(now, w),
            target_up: self.target_up.sample(now, w),
            target_down: self.target_down.sample(now, w),
            link_switch: self.link_switch.sample(now, w),
        })
    }
}

/// Open the GPIO controller.
pub fn open() -> Result<Gpio> {
    Gpio::new().map_err(gpio_err)
}
