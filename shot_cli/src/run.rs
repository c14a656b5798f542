//! Wiring: config to devices, control loop, display and operator input.

use std::path::PathBuf;
#[cfg(all(feature = "hardware", target_os = "linux"))]
use std::sync::Arc;
#[cfg(all(feature = "hardware", target_os = "linux"))]
use std::time::Duration;

use eyre::WrapErr;
use shot_config::Config;
use shot_core::preset::shared;
use shot_core::{
    ControlLoop, DisplayBridge, InputCfg, LinkCfg, LoopCfg, PresetStore, Shutdown, lock_presets,
    reconcile,
};
use shot_hardware::{SimOptions, SimulatedRig};
use shot_traits::{Clock, MonotonicClock, ScaleLink};
use shot_ui::TerminalRenderer;

use crate::console;

#[cfg(all(feature = "hardware", target_os = "linux"))]
const PANEL_POLL: Duration = Duration::from_millis(10);
#[cfg(all(feature = "hardware", target_os = "linux"))]
const PANEL_DEBOUNCE: Duration = Duration::from_millis(30);

/// Env override for the simulated pour rate, used by the CLI tests.
const SIM_FLOW_ENV: &str = "SHOT_SIM_FLOW_GPS";

#[derive(Debug, Clone, Default)]
pub struct RunOpts {
    pub ticks: Option<u64>,
    pub save_dir: Option<PathBuf>,
    pub stdin: bool,
    pub ansi: bool,
    pub simulate: bool,
    /// Keep stdout for the JSON summary; frames go to stderr.
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresetLine {
    pub name: String,
    pub target_g: f32,
    pub overshoot_g: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Ticks executed; `None` when the loop ran until shutdown.
    pub ticks: Option<u64>,
    pub current: String,
    pub presets: Vec<PresetLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub address: Option<String>,
    pub weight_g: Option<f32>,
    pub battery_pct: Option<u8>,
}

fn sim_options() -> SimOptions {
    let mut opts = SimOptions::default();
    if let Ok(raw) = std::env::var(SIM_FLOW_ENV) {
        match raw.parse::<f32>() {
            Ok(v) if v.is_finite() && v >= 0.0 => opts.flow_gps = v,
            _ => tracing::warn!(value = %raw, "ignoring invalid {SIM_FLOW_ENV}"),
        }
    }
    opts
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn open_panel_and_relay(
    cfg: &Config,
) -> eyre::Result<(shot_hardware::gpio::GpioRelay, shot_hardware::gpio::GpioPanel)> {
    use shot_hardware::gpio::{GpioPanel, GpioRelay, PanelPins, open};

    let gpio = open().wrap_err("open gpio")?;
    let relay = GpioRelay::new(&gpio, cfg.pins.relay).wrap_err("open relay pin")?;
    let pins = PanelPins {
        paddle: cfg.pins.paddle,
        tare: cfg.pins.tare,
        preset: cfg.pins.preset,
        target_up: cfg.pins.target_up,
        target_down: cfg.pins.target_down,
        link_switch: cfg.pins.link_switch,
    };
    let panel = GpioPanel::new(&gpio, pins, PANEL_DEBOUNCE).wrap_err("open panel pins")?;
    Ok((relay, panel))
}

/// Tick `n` times at the configured period (or until shutdown), then finish.
fn run_for(ctl: &mut ControlLoop, n: u64, shutdown: &Shutdown, clock: &dyn Clock) -> u64 {
    let tick = ctl.cfg().tick;
    let mut done = 0;
    while done < n && !shutdown.is_triggered() {
        let started = clock.now();
        ctl.tick();
        done += 1;
        if done < n {
            clock.sleep(tick.saturating_sub(clock.since(started)));
        }
    }
    ctl.finish();
    done
}

pub fn run(cfg: &Config, opts: &RunOpts, shutdown: &Shutdown) -> eyre::Result<RunSummary> {
    let loop_cfg = LoopCfg::from(cfg);
    let input_cfg = InputCfg::from(&cfg.control);
    let presets = shared(PresetStore::try_from(cfg).wrap_err("invalid configuration")?);

    let save_dir = opts
        .save_dir
        .clone()
        .or_else(|| cfg.display.save_dir.as_ref().map(PathBuf::from));
    let frames: Box<dyn std::io::Write + Send> = if opts.json {
        Box::new(std::io::stderr())
    } else {
        Box::new(std::io::stdout())
    };
    let renderer = TerminalRenderer::new(frames)
        .with_ansi(opts.ansi)
        .with_save_dir(save_dir);
    let bridge = DisplayBridge::spawn(renderer, loop_cfg.tick);

    let clock = MonotonicClock::new();
    let rig = SimulatedRig::new(clock, sim_options());
    let builder = ControlLoop::builder()
        .with_presets(presets.clone())
        .with_loop_cfg(loop_cfg)
        .with_link_cfg(LinkCfg::from(&cfg.link))
        .with_calibration((&cfg.calibration).into())
        .with_display_bridge(bridge)
        .with_link(rig.scale());

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    let (mut ctl, _poller) = if opts.simulate {
        (builder.with_relay(rig.relay()).build()?, None)
    } else {
        tracing::warn!("no wireless scale transport in this build, the scale is simulated");
        let (relay, panel) = open_panel_and_relay(cfg)?;
        let ctl = builder.with_relay(relay).build()?;
        let poller = shot_core::PanelPoller::spawn(
            panel,
            ctl.commands(),
            input_cfg.clone(),
            PANEL_POLL,
            Arc::new(MonotonicClock::new()),
            Shutdown::new(),
        );
        (ctl, Some(poller))
    };
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    let mut ctl = {
        if opts.simulate {
            tracing::debug!("built without hardware support, simulating regardless");
        }
        builder.with_relay(rig.relay()).build()?
    };

    if opts.stdin {
        console::spawn_stdin_reader(ctl.commands(), input_cfg, shutdown.clone());
    }

    let ticks = match opts.ticks {
        Some(n) => Some(run_for(&mut ctl, n, shutdown, &clock)),
        None => {
            ctl.run(shutdown);
            None
        }
    };

    let store = lock_presets(&presets);
    let summary = RunSummary {
        ticks,
        current: store.current().name.clone(),
        presets: store
            .iter()
            .map(|p| PresetLine {
                name: p.name.clone(),
                target_g: p.target_g,
                overshoot_g: p.overshoot_g,
            })
            .collect(),
    };
    Ok(summary)
}

/// Find the scale, connect, take one reading, disconnect.
pub fn self_check(cfg: &Config) -> eyre::Result<CheckReport> {
    let rig = SimulatedRig::new(MonotonicClock::new(), sim_options());
    let mut scale = rig.scale();
    let link_cfg = LinkCfg::from(&cfg.link);

    if !reconcile(&mut scale, true, &link_cfg).is_connected() {
        eyre::bail!("scale not connected: no device found or connect failed");
    }
    let weight_g = scale
        .weight()
        .map_err(|e| eyre::eyre!("scale weight read failed: {e}"))?;
    let battery_pct = scale
        .battery_pct()
        .map_err(|e| eyre::eyre!("scale battery read failed: {e}"))?;
    let address = rig.bound_address();
    reconcile(&mut scale, false, &link_cfg);
    Ok(CheckReport {
        address,
        weight_g,
        battery_pct,
    })
}
