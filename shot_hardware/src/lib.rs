//! Device implementations behind the `shot_traits` seams.
//!
//! Without the `hardware` feature only the simulated rig is built: a scale and
//! a relay that share one physical model, so energizing the relay makes the
//! simulated cup fill and the fill keeps dripping for a while after the relay
//! turns off. With `hardware` on Linux, `gpio` adds the real relay and the
//! operator panel.
pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

use crate::error::HwError;
use shot_traits::{Clock, Relay, ScaleLink};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Tunables for the simulated rig.
#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Flow into the cup while the relay is energized (g/s).
    pub flow_gps: f32,
    /// After the relay turns off, flow decays linearly to zero over this long.
    pub drip: Duration,
    pub battery_pct: u8,
    /// Addresses reported by `discover`.
    pub devices: Vec<String>,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            flow_gps: 2.0,
            drip: Duration::from_millis(800),
            battery_pct: 87,
            devices: vec!["sim-scale-0".to_string()],
        }
    }
}

#[derive(Debug)]
struct RigState {
    opts: SimOptions,
    gross_g: f32,
    tare_g: f32,
    last_update: Instant,
    relay_on: bool,
    relay_off_at: Option<Instant>,
    connected: bool,
    address: Option<String>,
}

impl RigState {
    /// Integrate the cup weight up to `now`.
    fn advance(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last_update).as_secs_f32();
        self.last_update = now;
        if dt <= 0.0 {
            return;
        }
        let rate = if self.relay_on {
            self.opts.flow_gps
        } else if let Some(off) = self.relay_off_at {
            let drip = self.opts.drip.as_secs_f32();
            if drip <= 0.0 {
                0.0
            } else {
                let since_off = now.saturating_duration_since(off).as_secs_f32();
                self.opts.flow_gps * (1.0 - since_off / drip).max(0.0)
            }
        } else {
            0.0
        };
        self.gross_g += rate * dt;
    }
}

/// Shared physical model behind a simulated scale and relay.
#[derive(Clone)]
pub struct SimulatedRig<C: Clock + Clone> {
    state: Arc<Mutex<RigState>>,
    clock: C,
}

impl<C: Clock + Clone> SimulatedRig<C> {
    pub fn new(clock: C, opts: SimOptions) -> Self {
        let now = clock.now();
        Self {
            state: Arc::new(Mutex::new(RigState {
                opts,
                gross_g: 0.0,
                tare_g: 0.0,
                last_update: now,
                relay_on: false,
                relay_off_at: None,
                connected: false,
                address: None,
            })),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RigState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn scale(&self) -> SimulatedScale<C> {
        SimulatedScale { rig: self.clone() }
    }

    pub fn relay(&self) -> SimulatedRelay<C> {
        SimulatedRelay { rig: self.clone() }
    }

    /// Net weight the scale would report right now.
    pub fn net_weight(&self) -> f32 {
        let now = self.clock.now();
        let mut st = self.lock();
        st.advance(now);
        st.gross_g - st.tare_g
    }

    /// Put a known gross weight on the scale (e.g. an empty cup).
    pub fn set_gross_weight(&self, grams: f32) {
        let now = self.clock.now();
        let mut st = self.lock();
        st.advance(now);
        st.gross_g = grams;
    }

    /// Simulate the scale powering off or walking out of radio range.
    pub fn drop_connection(&self) {
        self.lock().connected = false;
    }

    pub fn set_devices(&self, devices: Vec<String>) {
        self.lock().opts.devices = devices;
    }

    pub fn bound_address(&self) -> Option<String> {
        self.lock().address.clone()
    }
}

/// Simulated wireless scale.
pub struct SimulatedScale<C: Clock + Clone> {
    rig: SimulatedRig<C>,
}

impl<C: Clock + Clone> ScaleLink for SimulatedScale<C> {
    fn is_connected(&self) -> bool {
        self.rig.lock().connected
    }

    fn weight(&mut self) -> Result<Option<f32>, Box<dyn std::error::Error + Send + Sync>> {
        let now = self.rig.clock.now();
        let mut st = self.rig.lock();
        if !st.connected {
            return Err(Box::new(HwError::NotConnected));
        }
        st.advance(now);
        let net = st.gross_g - st.tare_g;
        tracing::trace!(net_g = net, "simulated scale sample");
        Ok(Some(net))
    }

    fn battery_pct(&mut self) -> Result<Option<u8>, Box<dyn std::error::Error + Send + Sync>> {
        let st = self.rig.lock();
        if !st.connected {
            return Err(Box::new(HwError::NotConnected));
        }
        Ok(Some(st.opts.battery_pct))
    }

    fn discover(
        &mut self,
        timeout: Duration,
    ) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
        let devices = self.rig.lock().opts.devices.clone();
        if devices.is_empty() {
            // A real scan with nothing in range runs to its deadline.
            self.rig.clock.sleep(timeout);
        }
        Ok(devices)
    }

    fn set_address(&mut self, address: &str) {
        self.rig.lock().address = Some(address.to_string());
    }

    fn connect(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut st = self.rig.lock();
        let Some(addr) = st.address.clone() else {
            return Err(Box::new(HwError::NotFound("no address bound".into())));
        };
        if !st.opts.devices.contains(&addr) {
            return Err(Box::new(HwError::NotFound(addr)));
        }
        st.connected = true;
        tracing::debug!(address = %addr, "simulated scale connected");
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.rig.lock().connected = false;
        Ok(())
    }

    fn tare(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let now = self.rig.clock.now();
        let mut st = self.rig.lock();
        if !st.connected {
            return Err(Box::new(HwError::NotConnected));
        }
        st.advance(now);
        st.tare_g = st.gross_g;
        Ok(())
    }
}

/// Simulated dispense relay.
pub struct SimulatedRelay<C: Clock + Clone> {
    rig: SimulatedRig<C>,
}

impl<C: Clock + Clone> Relay for SimulatedRelay<C> {
    fn on(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let now = self.rig.clock.now();
        let mut st = self.rig.lock();
        st.advance(now);
        st.relay_on = true;
        st.relay_off_at = None;
        Ok(())
    }

    fn off(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let now = self.rig.clock.now();
        let mut st = self.rig.lock();
        st.advance(now);
        if st.relay_on {
            st.relay_on = false;
            st.relay_off_at = Some(now);
        }
        Ok(())
    }

    fn is_on(&self) -> bool {
        self.rig.lock().relay_on
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shot_traits::clock::test_clock::TestClock;

    fn rig() -> (TestClock, SimulatedRig<TestClock>) {
        let clock = TestClock::new();
        let rig = SimulatedRig::new(clock.clone(), SimOptions::default());
        (clock, rig)
    }

    #[test]
    fn weight_requires_connection() {
        let (_clock, rig) = rig();
        let mut scale = rig.scale();
        assert!(scale.weight().is_err());
        let devices = scale.discover(Duration::from_secs(1)).unwrap();
        scale.set_address(&devices[0]);
        scale.connect().unwrap();
        assert_eq!(scale.weight().unwrap(), Some(0.0));
        assert_eq!(scale.battery_pct().unwrap(), Some(87));
    }

    #[test]
    fn relay_fills_cup_and_drip_decays() {
        let (clock, rig) = rig();
        let mut relay = rig.relay();
        relay.on().unwrap();
        clock.advance_ms(1_000);
        assert!((rig.net_weight() - 2.0).abs() < 1e-4);
        relay.off().unwrap();
        clock.advance_ms(400);
        let mid = rig.net_weight();
        assert!(mid > 2.0);
        clock.advance_ms(2_000);
        let settled = rig.net_weight();
        clock.advance_ms(2_000);
        assert!((rig.net_weight() - settled).abs() < 1e-6, "drip must stop");
    }

    #[test]
    fn empty_scan_waits_out_timeout() {
        let (clock, rig) = rig();
        rig.set_devices(Vec::new());
        let mut scale = rig.scale();
        let found = scale.discover(Duration::from_millis(1_500)).unwrap();
        assert!(found.is_empty());
        assert_eq!(clock.elapsed(), Duration::from_millis(1_500));
    }

    #[test]
    fn connect_rejects_unknown_address() {
        let (_clock, rig) = rig();
        let mut scale = rig.scale();
        scale.set_address("aa:bb");
        let err = scale.connect().expect_err("unknown address");
        assert!(err.to_string().contains("not found"));
        assert!(!scale.is_connected());
    }
}
