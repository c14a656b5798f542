//! Scale link reconciliation against the operator switch.

use std::time::Duration;

use rstest::rstest;
use shot_core::mocks::{ManualScale, ScaleHandle};
use shot_core::{LinkCfg, LinkState, reconcile};
use shot_hardware::{SimOptions, SimulatedRig};
use shot_traits::ScaleLink;
use shot_traits::clock::test_clock::TestClock;

fn cfg() -> LinkCfg {
    LinkCfg::default()
}

fn connected() -> (ManualScale, ScaleHandle) {
    let (mut scale, h) = ManualScale::new();
    assert_eq!(reconcile(&mut scale, true, &cfg()), LinkState::Connected);
    (scale, h)
}

#[rstest]
#[case(false, false, LinkState::Disconnected)]
#[case(true, true, LinkState::Connected)]
fn steady_states_do_nothing(
    #[case] want: bool,
    #[case] start_connected: bool,
    #[case] expected: LinkState,
) {
    let (mut scale, h) = if start_connected {
        connected()
    } else {
        ManualScale::new()
    };
    let discovers = h.discover_calls();
    assert_eq!(reconcile(&mut scale, want, &cfg()), expected);
    assert_eq!(h.discover_calls(), discovers);
}

#[test]
fn want_and_disconnected_binds_first_device() {
    let (mut scale, h) = ManualScale::new();
    h.set_devices(&["aa:01", "bb:02"]);
    assert_eq!(reconcile(&mut scale, true, &cfg()), LinkState::Connected);
    assert_eq!(h.address().as_deref(), Some("aa:01"));
}

#[test]
fn preferred_address_used_when_found() {
    let (mut scale, h) = ManualScale::new();
    h.set_devices(&["aa:01", "bb:02"]);
    let cfg = LinkCfg {
        preferred_address: Some("BB:02".into()),
        ..cfg()
    };
    assert_eq!(reconcile(&mut scale, true, &cfg), LinkState::Connected);
    assert_eq!(h.address().as_deref(), Some("bb:02"));
}

#[rstest]
#[case::no_devices(|h: &ScaleHandle| h.set_devices(&[]))]
#[case::discover_fails(|h: &ScaleHandle| h.fail_discover(true))]
#[case::connect_fails(|h: &ScaleHandle| h.fail_connect(true))]
fn failures_stay_disconnected(#[case] break_it: fn(&ScaleHandle)) {
    let (mut scale, h) = ManualScale::new();
    break_it(&h);
    assert_eq!(reconcile(&mut scale, true, &cfg()), LinkState::Disconnected);
    assert!(!h.is_connected());
}

#[test]
fn retried_on_next_call_after_failure() {
    let (mut scale, h) = ManualScale::new();
    h.fail_discover(true);
    assert_eq!(reconcile(&mut scale, true, &cfg()), LinkState::Disconnected);
    h.fail_discover(false);
    assert_eq!(reconcile(&mut scale, true, &cfg()), LinkState::Connected);
    assert_eq!(h.discover_calls(), 2);
}

#[test]
fn switch_off_disconnects_even_if_disconnect_fails() {
    let (mut scale, h) = connected();
    h.fail_disconnect(true);
    assert_eq!(reconcile(&mut scale, false, &cfg()), LinkState::Disconnected);
    h.fail_disconnect(false);
    assert_eq!(reconcile(&mut scale, false, &cfg()), LinkState::Disconnected);
    assert!(!h.is_connected());
}

#[test]
fn empty_scan_is_bounded_by_timeout() {
    let clock = TestClock::new();
    let rig = SimulatedRig::new(clock.clone(), SimOptions::default());
    rig.set_devices(Vec::new());
    let mut scale = rig.scale();
    let cfg = LinkCfg {
        discover_timeout: Duration::from_millis(1_200),
        ..cfg()
    };
    assert_eq!(reconcile(&mut scale, true, &cfg), LinkState::Disconnected);
    assert_eq!(clock.elapsed(), Duration::from_millis(1_200));
    assert!(!scale.is_connected());
}
