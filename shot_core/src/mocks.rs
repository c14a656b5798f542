//! Test and helper mocks for shot_core.
//!
//! Each mock hands out a cloneable handle so a test can steer or inspect the
//! device after it has been moved into the control loop.
use shot_traits::{Clock, OperatorPanel, PanelLevels, Relay, ScaleLink};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::display::{DisplaySnapshot, Renderer};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn fault(msg: &str) -> BoxError {
    Box::new(std::io::Error::other(msg.to_string()))
}

#[derive(Debug, Clone)]
struct ScaleState {
    connected: bool,
    weight: Option<f32>,
    battery: Option<u8>,
    devices: Vec<String>,
    address: Option<String>,
    fail_discover: bool,
    fail_connect: bool,
    fail_disconnect: bool,
    fail_weight: bool,
    discover_calls: usize,
    connect_calls: usize,
    tare_calls: usize,
}

/// Scale whose readings and failures are set by the test.
#[derive(Debug, Clone)]
pub struct ManualScale {
    state: Arc<Mutex<ScaleState>>,
}

/// Steering handle for a `ManualScale`.
#[derive(Debug, Clone)]
pub struct ScaleHandle {
    state: Arc<Mutex<ScaleState>>,
}

impl ManualScale {
    /// One discoverable device, weight 0 g, battery 100 %.
    pub fn new() -> (Self, ScaleHandle) {
        let state = Arc::new(Mutex::new(ScaleState {
            connected: false,
            weight: Some(0.0),
            battery: Some(100),
            devices: vec!["mock-scale".to_string()],
            address: None,
            fail_discover: false,
            fail_connect: false,
            fail_disconnect: false,
            fail_weight: false,
            discover_calls: 0,
            connect_calls: 0,
            tare_calls: 0,
        }));
        (
            Self {
                state: state.clone(),
            },
            ScaleHandle { state },
        )
    }
}

impl ScaleHandle {
    pub fn set_weight(&self, grams: Option<f32>) {
        lock(&self.state).weight = grams;
    }
    pub fn set_battery(&self, pct: Option<u8>) {
        lock(&self.state).battery = pct;
    }
    pub fn set_devices(&self, devices: &[&str]) {
        lock(&self.state).devices = devices.iter().map(|d| (*d).to_string()).collect();
    }
    pub fn fail_discover(&self, on: bool) {
        lock(&self.state).fail_discover = on;
    }
    pub fn fail_connect(&self, on: bool) {
        lock(&self.state).fail_connect = on;
    }
    pub fn fail_disconnect(&self, on: bool) {
        lock(&self.state).fail_disconnect = on;
    }
    pub fn fail_weight(&self, on: bool) {
        lock(&self.state).fail_weight = on;
    }
    /// Simulate the scale dropping off the air.
    pub fn drop_connection(&self) {
        lock(&self.state).connected = false;
    }
    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }
    pub fn address(&self) -> Option<String> {
        lock(&self.state).address.clone()
    }
    pub fn discover_calls(&self) -> usize {
        lock(&self.state).discover_calls
    }
    pub fn connect_calls(&self) -> usize {
        lock(&self.state).connect_calls
    }
    pub fn tare_calls(&self) -> usize {
        lock(&self.state).tare_calls
    }
}

impl ScaleLink for ManualScale {
    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    fn weight(&mut self) -> Result<Option<f32>, BoxError> {
        let st = lock(&self.state);
        if !st.connected {
            return Err(fault("not connected"));
        }
        if st.fail_weight {
            return Err(fault("notification timed out"));
        }
        Ok(st.weight)
    }

    fn battery_pct(&mut self) -> Result<Option<u8>, BoxError> {
        let st = lock(&self.state);
        if !st.connected {
            return Err(fault("not connected"));
        }
        Ok(st.battery)
    }

    fn discover(&mut self, _timeout: Duration) -> Result<Vec<String>, BoxError> {
        let mut st = lock(&self.state);
        st.discover_calls += 1;
        if st.fail_discover {
            return Err(fault("adapter busy"));
        }
        Ok(st.devices.clone())
    }

    fn set_address(&mut self, address: &str) {
        lock(&self.state).address = Some(address.to_string());
    }

    fn connect(&mut self) -> Result<(), BoxError> {
        let mut st = lock(&self.state);
        st.connect_calls += 1;
        if st.fail_connect {
            return Err(fault("connection refused"));
        }
        st.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), BoxError> {
        let mut st = lock(&self.state);
        if st.fail_disconnect {
            return Err(fault("disconnect failed"));
        }
        st.connected = false;
        Ok(())
    }

    fn tare(&mut self) -> Result<(), BoxError> {
        let mut st = lock(&self.state);
        if !st.connected {
            return Err(fault("not connected"));
        }
        st.tare_calls += 1;
        st.weight = Some(0.0);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayCall {
    On,
    Off,
}

#[derive(Debug, Default)]
struct RelayState {
    on: bool,
    calls: Vec<RelayCall>,
    fail_on: bool,
    fail_off: bool,
}

/// Relay that records every call.
#[derive(Debug, Clone, Default)]
pub struct SpyRelay {
    state: Arc<Mutex<RelayState>>,
}

impl SpyRelay {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn calls(&self) -> Vec<RelayCall> {
        lock(&self.state).calls.clone()
    }
    pub fn is_energized(&self) -> bool {
        lock(&self.state).on
    }
    pub fn fail_on(&self, on: bool) {
        lock(&self.state).fail_on = on;
    }
    pub fn fail_off(&self, on: bool) {
        lock(&self.state).fail_off = on;
    }
}

impl Relay for SpyRelay {
    fn on(&mut self) -> Result<(), BoxError> {
        let mut st = lock(&self.state);
        st.calls.push(RelayCall::On);
        if st.fail_on {
            return Err(fault("gpio write failed"));
        }
        st.on = true;
        Ok(())
    }

    fn off(&mut self) -> Result<(), BoxError> {
        let mut st = lock(&self.state);
        st.calls.push(RelayCall::Off);
        if st.fail_off {
            return Err(fault("gpio write failed"));
        }
        st.on = false;
        Ok(())
    }

    fn is_on(&self) -> bool {
        lock(&self.state).on
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Power(bool),
    Draw(u64),
}

/// Renderer that records power switches and drawn snapshot sequence numbers.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    events: Arc<Mutex<Vec<RenderEvent>>>,
    frames: Arc<Mutex<Vec<DisplaySnapshot>>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn events(&self) -> Vec<RenderEvent> {
        lock(&self.events).clone()
    }
    pub fn drawn(&self) -> Vec<u64> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                RenderEvent::Draw(seq) => Some(*seq),
                RenderEvent::Power(_) => None,
            })
            .collect()
    }
    pub fn last_frame(&self) -> Option<DisplaySnapshot> {
        lock(&self.frames).last().cloned()
    }
}

impl Renderer for RecordingRenderer {
    fn power(&mut self, on: bool) -> Result<(), BoxError> {
        lock(&self.events).push(RenderEvent::Power(on));
        Ok(())
    }

    fn draw(&mut self, snapshot: &DisplaySnapshot) -> Result<(), BoxError> {
        lock(&self.events).push(RenderEvent::Draw(snapshot.seq));
        lock(&self.frames).push(snapshot.clone());
        Ok(())
    }
}

/// Panel that replays a script of levels, then repeats the last one.
#[derive(Debug, Clone)]
pub struct ScriptedPanel {
    script: VecDeque<PanelLevels>,
    last: PanelLevels,
}

impl ScriptedPanel {
    pub fn new(script: impl IntoIterator<Item = PanelLevels>) -> Self {
        Self {
            script: script.into_iter().collect(),
            last: PanelLevels::default(),
        }
    }
}

impl OperatorPanel for ScriptedPanel {
    fn levels(&mut self) -> Result<PanelLevels, BoxError> {
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        Ok(self.last)
    }
}

/// Clock whose `sleep` blocks until the test opens the gate once per sleep.
/// `now` and the time advanced by a released sleep come from `inner`.
#[derive(Clone)]
pub struct GatedClock<C: Clock + Clone> {
    inner: C,
    gate: crossbeam_channel::Receiver<()>,
}

/// Opens a `GatedClock` gate.
#[derive(Clone)]
pub struct Gate(crossbeam_channel::Sender<()>);

impl Gate {
    /// Let one pending or future `sleep` through.
    pub fn release(&self) {
        let _ = self.0.send(());
    }
}

impl<C: Clock + Clone> GatedClock<C> {
    pub fn new(inner: C) -> (Self, Gate) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { inner, gate: rx }, Gate(tx))
    }
}

impl<C: Clock + Clone> Clock for GatedClock<C> {
    fn now(&self) -> Instant {
        self.inner.now()
    }

    fn sleep(&self, d: Duration) {
        // A dropped gate means the test is over; don't hang.
        let _ = self.gate.recv();
        self.inner.sleep(d);
    }
}
