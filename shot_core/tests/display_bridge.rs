//! Display hand-off: latest-wins coalescing, power signalling and the
//! consumer thread lifecycle.

use std::time::{Duration, Instant};

use shot_core::display::{self, Coalesced, DisplayBridge, DisplayConsumer};
use shot_core::mocks::{RecordingRenderer, RenderEvent};
use shot_core::{DisplaySnapshot, Preset};

fn snap(seq: u64) -> DisplaySnapshot {
    DisplaySnapshot {
        seq,
        weight_g: Some(seq as f32),
        sample_interval: Duration::from_millis(100),
        preset: Preset::new("A", "#376efa"),
        flow: Vec::new(),
        battery_pct: Some(90),
        relay_on: true,
        shot_elapsed: Duration::from_secs(seq),
        save_requested: false,
        smoothing_window: 10,
    }
}

#[test]
fn three_publishes_render_only_the_last() {
    let (publisher, rx) = display::channel();
    let renderer = RecordingRenderer::new();
    let mut consumer = DisplayConsumer::new(rx, renderer.clone());

    for seq in 1..=3 {
        assert!(publisher.publish(snap(seq)));
    }
    assert_eq!(publisher.backlog(), 3);
    consumer.drain();

    assert_eq!(renderer.drawn(), vec![3]);
    assert_eq!(consumer.last_drawn(), Some(3));
    assert_eq!(publisher.backlog(), 0);
}

#[test]
fn blank_powers_down_and_next_snapshot_powers_up() {
    let (publisher, rx) = display::channel();
    let renderer = RecordingRenderer::new();
    let mut consumer = DisplayConsumer::new(rx, renderer.clone());

    publisher.publish(snap(1));
    consumer.drain();
    publisher.blank();
    consumer.drain();
    publisher.blank();
    consumer.drain();
    publisher.blank();
    publisher.publish(snap(2));
    consumer.drain();

    assert_eq!(
        renderer.events(),
        vec![
            RenderEvent::Power(true),
            RenderEvent::Draw(1),
            RenderEvent::Power(false),
            RenderEvent::Power(true),
            RenderEvent::Draw(2),
        ]
    );
    assert!(consumer.is_powered());
}

#[test]
fn incomplete_snapshot_is_skipped() {
    let (publisher, rx) = display::channel();
    let renderer = RecordingRenderer::new();
    let mut consumer = DisplayConsumer::new(rx, renderer.clone());

    let mut no_battery = snap(1);
    no_battery.battery_pct = None;
    publisher.publish(no_battery);
    assert!(matches!(consumer.drain(), Coalesced::Draw(_)));
    assert!(renderer.events().is_empty());
    assert!(!consumer.is_powered());

    let mut no_weight = snap(2);
    no_weight.weight_g = None;
    publisher.publish(no_weight);
    consumer.drain();
    assert_eq!(consumer.last_drawn(), None);
}

#[test]
fn empty_drain_does_nothing() {
    let (_publisher, rx) = display::channel();
    let renderer = RecordingRenderer::new();
    let mut consumer = DisplayConsumer::new(rx, renderer.clone());
    assert_eq!(consumer.drain(), Coalesced::Nothing);
    assert!(renderer.events().is_empty());
}

#[test]
fn finish_powers_off() {
    let (publisher, rx) = display::channel();
    let renderer = RecordingRenderer::new();
    let mut consumer = DisplayConsumer::new(rx, renderer.clone());
    publisher.publish(snap(7));
    consumer.drain();
    consumer.finish();
    assert_eq!(renderer.events().last(), Some(&RenderEvent::Power(false)));
}

#[test]
fn bridge_thread_renders_in_production_order() {
    let renderer = RecordingRenderer::new();
    let mut bridge = DisplayBridge::spawn(renderer.clone(), Duration::from_millis(10));
    let publisher = bridge.publisher();

    for seq in 1..=200 {
        publisher.publish(snap(seq));
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while renderer.drawn().last() != Some(&200) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    bridge.stop();

    let drawn = renderer.drawn();
    assert_eq!(drawn.last(), Some(&200));
    assert!(drawn.windows(2).all(|w| w[0] < w[1]), "reordered: {drawn:?}");
    assert_eq!(renderer.events().last(), Some(&RenderEvent::Power(false)));
}

#[test]
fn bridge_stop_is_prompt_and_idempotent() {
    let renderer = RecordingRenderer::new();
    let mut bridge = DisplayBridge::spawn(renderer, Duration::from_millis(20));
    let t0 = Instant::now();
    bridge.stop();
    bridge.stop();
    assert!(t0.elapsed() < Duration::from_secs(1));
    // The consumer is gone; publishing reports it instead of blocking.
    assert!(!bridge.publisher().publish(snap(1)));
}
