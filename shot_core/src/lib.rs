#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Control core of the shot dosing controller (hardware-agnostic).
//!
//! All hardware goes through `shot_traits::ScaleLink` and `shot_traits::Relay`.
//!
//! ## Architecture
//!
//! - **Presets**: three named targets with learned overshoot (`preset`)
//! - **Flow**: bounded g/s history for the shot graph (`flow`)
//! - **Link**: connect/disconnect the scale to follow the operator switch (`link`)
//! - **Control**: the tick loop and auto-stop law (`control`, built via `builder`)
//! - **Calibration**: background overshoot learning (`calibration`)
//! - **Display**: latest-wins hand-off to the renderer (`display`)
//! - **Input**: panel levels to commands (`input`)
//!
//! Only the control loop touches the relay and the scale. Workers talk back
//! through the preset mutex and the cells in `signal`.

pub mod builder;
pub mod calibration;
pub mod config;
pub mod control;
pub mod conversions;
pub mod dispense;
pub mod display;
pub mod error;
pub mod flow;
pub mod hw_error;
pub mod input;
pub mod link;
pub mod mocks;
pub mod preset;
pub mod signal;
pub mod util;

pub use builder::ControlLoopBuilder;
pub use calibration::{CalibrationJob, CalibrationOutcome, CalibrationWorker, calibrate};
pub use config::{CalibrationCfg, InputCfg, LinkCfg, LoopCfg};
pub use control::{Command, CommandSender, ControlLoop, StopReason, TickReport};
pub use dispense::DispenseState;
pub use display::{
    DisplayBridge, DisplayConsumer, DisplayMsg, DisplayPublisher, DisplaySnapshot, Renderer,
};
pub use error::{BuildError, Report, Result, ShotError};
pub use flow::{FlowBuffer, moving_average};
pub use input::{PanelPoller, PanelTracker};
pub use link::{LinkState, reconcile};
pub use preset::{
    OvershootUpdate, PRESET_COUNT, Preset, PresetId, PresetStore, SharedPresets, lock_presets,
};
pub use signal::{Flag, Shutdown, WeightCell};
