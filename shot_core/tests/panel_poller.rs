//! Panel poller thread: levels in, commands out, clean exit.

use std::sync::Arc;
use std::time::Duration;

use shot_core::mocks::ScriptedPanel;
use shot_core::{Command, InputCfg, PanelPoller, Shutdown};
use shot_traits::PanelLevels;
use shot_traits::clock::MonotonicClock;

#[test]
fn forwards_commands_in_order_and_stops() {
    let idle = PanelLevels {
        link_switch: true,
        ..PanelLevels::default()
    };
    let paddle = PanelLevels {
        paddle: true,
        ..idle
    };
    let up = PanelLevels {
        target_up: true,
        ..idle
    };
    let panel = ScriptedPanel::new([idle, paddle, idle, up, idle]);
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut poller = PanelPoller::spawn(
        panel,
        tx,
        InputCfg::default(),
        Duration::from_millis(1),
        Arc::new(MonotonicClock::new()),
        Shutdown::new(),
    );

    let mut got = Vec::new();
    while got.len() < 4 {
        match rx.recv_timeout(Duration::from_secs(5)) {
            Ok(cmd) => got.push(cmd),
            Err(e) => panic!("poller stalled after {got:?}: {e}"),
        }
    }
    poller.stop();

    assert_eq!(
        got,
        vec![
            Command::LinkEnabled(true),
            Command::StartShot,
            Command::StopShot,
            Command::Adjust(0.1),
        ]
    );
}

#[test]
fn exits_when_receiver_is_gone() {
    let panel = ScriptedPanel::new([PanelLevels::default()]);
    let (tx, rx) = crossbeam_channel::unbounded();
    drop(rx);
    let mut poller = PanelPoller::spawn(
        panel,
        tx,
        InputCfg::default(),
        Duration::from_millis(1),
        Arc::new(MonotonicClock::new()),
        Shutdown::new(),
    );
    std::thread::sleep(Duration::from_millis(20));
    poller.stop();
}
