#![no_main]
use libfuzzer_sys::fuzz_target;
use shot_core::{CalibrationCfg, InputCfg, LinkCfg, LoopCfg, PresetStore};

// Parse, validate, and map into core types; none of it may panic.
fuzz_target!(|data: &str| {
    let Ok(cfg) = shot_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    let lp = LoopCfg::from(&cfg);
    assert!(lp.smoothing_window >= 1);
    let _ = CalibrationCfg::from(&cfg.calibration);
    let _ = LinkCfg::from(&cfg.link);
    let _ = InputCfg::from(&cfg.control);
    let store = PresetStore::try_from(&cfg).expect("validated config has three presets");
    assert_eq!(store.iter().count(), shot_config::PRESET_COUNT);
});
