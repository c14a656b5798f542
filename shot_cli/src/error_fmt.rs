//! Human-readable error descriptions and structured JSON error formatting.

use shot_core::error::BuildError;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingLink => {
                "What happened: No scale link was provided to the control loop.\nLikely causes: The scale transport failed to initialize or was not wired into the builder.\nHow to fix: Ensure the scale link is created successfully and passed via with_link(...).".to_string()
            }
            BuildError::MissingRelay => {
                "What happened: No relay was provided to the control loop.\nLikely causes: The relay pin failed to initialize or was not wired into the builder.\nHow to fix: Ensure the relay is created successfully and passed via with_relay(...).".to_string()
            }
            BuildError::PresetCount { expected, got } => format!(
                "What happened: The config defines {got} presets.\nLikely causes: A [[presets]] table was added or removed.\nHow to fix: Define exactly {expected} [[presets]] entries, or remove them all to use the defaults."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/shot_config.toml for a sample."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read.\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass --config with an existing TOML file. Original: {msg}"
        );
    }

    if lower.contains("parse config") {
        return format!(
            "What happened: The config file is not valid TOML for this program.\nLikely causes: A typo, a value of the wrong type, or a misplaced section.\nHow to fix: Compare with etc/shot_config.toml. Original: {msg}"
        );
    }

    if lower.contains("must be") || lower.contains("unreasonably") || lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid.\nLikely causes: An out-of-range value ({msg}).\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("gpio") || lower.contains("pin") {
        return format!(
            "What happened: Failed to initialize the relay or panel pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO, or rerun with --simulate. Original: {msg}"
        );
    }

    if lower.contains("scale not connected") {
        return "What happened: The scale could not be reached.\nLikely causes: Scale switched off, out of range, or a wrong link.address.\nHow to fix: Wake the scale, move it closer, or clear link.address in the config.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn reason(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Config";
    }
    let lower = format!("{err:#}").to_ascii_lowercase();
    if lower.contains("config")
        || lower.contains("must be")
        || lower.contains("unreasonably")
    {
        "Config"
    } else if lower.contains("gpio") || lower.contains("pin") {
        "Hardware"
    } else if lower.contains("scale not connected") {
        "Scale"
    } else {
        "Error"
    }
}

/// Stable exit codes: 3 config, 4 hardware, 5 scale, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match reason(err) {
        "Config" => 3,
        "Hardware" => 4,
        "Scale" => 5,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({ "reason": reason(err), "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(eyre::Report::new(BuildError::MissingRelay), 3, "No relay")]
    #[case(
        eyre::Report::new(BuildError::PresetCount { expected: 3, got: 2 }),
        3,
        "exactly 3"
    )]
    #[case(eyre::eyre!("read config \"x.toml\": not found"), 3, "could not be read")]
    #[case(eyre::eyre!("control.tick_ms must be >= 1"), 3, "invalid")]
    #[case(eyre::eyre!("open gpio: permission denied"), 4, "--simulate")]
    #[case(eyre::eyre!("scale not connected: no device found"), 5, "Wake the scale")]
    #[case(eyre::eyre!("boom"), 1, "Something went wrong")]
    fn maps_errors(#[case] err: eyre::Report, #[case] code: i32, #[case] needle: &str) {
        assert_eq!(exit_code_for_error(&err), code);
        assert!(humanize(&err).contains(needle), "{}", humanize(&err));
    }

    #[test]
    fn wrapped_build_error_is_still_typed() {
        use eyre::WrapErr;
        let err: eyre::Result<()> =
            Err(BuildError::InvalidConfig("tick must be > 0")).wrap_err("invalid configuration");
        let err = err.expect_err("error");
        assert!(humanize(&err).contains("tick must be > 0"));
    }

    #[test]
    fn json_has_reason_and_message() {
        let err = eyre::eyre!("open gpio: no such device");
        let v: serde_json::Value =
            serde_json::from_str(&format_error_json(&err)).expect("valid json");
        assert_eq!(v["reason"], "Hardware");
        assert!(v["message"].as_str().expect("message").contains("pins"));
    }
}
