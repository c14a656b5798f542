use rstest::rstest;
use shot_config::{PRESET_COUNT, load_file, load_toml};

fn assert_rejects(toml: &str, needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("config should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "expected {needle:?} in error, got: {err}"
    );
}

#[test]
fn rejects_zero_tick() {
    assert_rejects(
        r#"
[control]
tick_ms = 0
"#,
        "control.tick_ms must be >= 1",
    );
}

#[test]
fn accepts_full_config() {
    let toml = r##"
[pins]
relay = 26
paddle = 20
tare = 4
preset = 21
target_up = 12
target_down = 16
link_switch = 5

[control]
tick_ms = 100
flow_decay_ms = 3000
tare_on_start = true
tare_settle_ms = 500

[calibration]
min_shot_ms = 10000
settle_ms = 3000
overshoot_limit_g = 10.0

[link]
discover_timeout_ms = 1000
address = "00:1c:97:17:fd:28"

[display]
save_dir = "/opt/shot/web"

[logging]
file = "/var/log/shot.log"
level = "debug"
rotation = "daily"

[[presets]]
name = "A"
color = "#376efa"
target_g = 36.0
overshoot_g = 1.5

[[presets]]
name = "B"
color = "#25a602"

[[presets]]
name = "C"
color = "#ff1303"
target_g = 18.5
"##;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert!(cfg.control.tare_on_start);
    assert_eq!(cfg.presets[0].target_g, 36.0);
    assert_eq!(cfg.presets[1].target_g, 40.0);
    assert_eq!(cfg.presets[1].overshoot_g, 2.0);
    assert_eq!(cfg.link.address.as_deref(), Some("00:1c:97:17:fd:28"));
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(4)]
fn rejects_wrong_preset_count(#[case] n: usize) {
    let mut toml = String::new();
    for i in 0..n {
        toml.push_str(&format!("[[presets]]\nname = \"P{i}\"\n\n"));
    }
    assert_rejects(&toml, &format!("exactly {PRESET_COUNT} entries"));
}

#[rstest]
#[case("target_g = -1.0", "presets[0].target_g must be >= 0")]
#[case("overshoot_g = 12.0", "presets[0].overshoot_g")]
#[case("color = \"blue\"", "presets[0].color")]
fn rejects_bad_preset_fields(#[case] field: &str, #[case] needle: &str) {
    let toml = format!(
        "[[presets]]\nname = \"A\"\n{field}\n\n[[presets]]\nname = \"B\"\n\n[[presets]]\nname = \"C\"\n"
    );
    assert_rejects(&toml, needle);
}

#[test]
fn rejects_duplicate_preset_names() {
    assert_rejects(
        "[[presets]]\nname = \"A\"\n\n[[presets]]\nname = \"A\"\n\n[[presets]]\nname = \"C\"\n",
        "is duplicated",
    );
}

#[rstest]
#[case("[calibration]\novershoot_limit_g = 0.0", "calibration.overshoot_limit_g")]
#[case("[link]\ndiscover_timeout_ms = 0", "link.discover_timeout_ms must be >= 1")]
#[case("[link]\naddress = \"  \"", "link.address must not be empty")]
#[case("[display]\nsmoothing_window = 0", "display.smoothing_window must be >= 1")]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation must be one of")]
#[case("[control]\nshort_step_g = 0.0", "control.short_step_g must be > 0")]
fn rejects_out_of_range_sections(#[case] toml: &str, #[case] needle: &str) {
    assert_rejects(toml, needle);
}

#[test]
fn load_file_reads_and_validates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let good = dir.path().join("good.toml");
    std::fs::write(&good, "[control]\ntick_ms = 50\n").expect("write");
    let cfg = load_file(&good).expect("load good");
    assert_eq!(cfg.control.tick_ms, 50);

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[control]\ntick_ms = 0\n").expect("write");
    let err = load_file(&bad).expect_err("bad config");
    assert!(format!("{err}").contains("control.tick_ms"));

    let missing = dir.path().join("missing.toml");
    let err = load_file(&missing).expect_err("missing file");
    assert!(format!("{err}").contains("read config"));
}
