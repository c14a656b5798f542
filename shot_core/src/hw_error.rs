//! Maps `Box<dyn Error>` from trait boundaries to typed `ShotError`.
//!
//! The traits in `shot_traits` use `Box<dyn Error + Send + Sync>` so any
//! transport can sit behind them; this module converts those to our typed
//! error enum, with an optional feature-gated path for
//! `shot_hardware::HwError` downcasting.

use crate::error::ShotError;

/// Map a scale-link error to a typed `ShotError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_link_error(e: &(dyn std::error::Error + 'static)) -> ShotError {
    #[cfg(feature = "hardware-errors")]
    {
        use shot_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => ShotError::Timeout,
                HwError::NotConnected => ShotError::NotConnected,
                other => ShotError::Transport(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        ShotError::Timeout
    } else if lower.contains("not connected") {
        ShotError::NotConnected
    } else {
        ShotError::Transport(s)
    }
}

/// Map a relay error to a typed `ShotError`.
pub fn map_relay_error(e: &(dyn std::error::Error + 'static)) -> ShotError {
    ShotError::Relay(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_heuristics() {
        let e = std::io::Error::other("scan timed out after 1s");
        assert_eq!(map_link_error(&e), ShotError::Timeout);
        let e = std::io::Error::other("peripheral not connected");
        assert_eq!(map_link_error(&e), ShotError::NotConnected);
        let e = std::io::Error::other("gatt write failed");
        assert_eq!(
            map_link_error(&e),
            ShotError::Transport("gatt write failed".into())
        );
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn downcasts_hardware_errors() {
        use shot_hardware::error::HwError;
        assert_eq!(map_link_error(&HwError::Timeout), ShotError::Timeout);
        assert_eq!(map_link_error(&HwError::NotConnected), ShotError::NotConnected);
        assert!(matches!(
            map_link_error(&HwError::NotFound("aa".into())),
            ShotError::Transport(_)
        ));
    }
}
