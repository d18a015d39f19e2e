//! Maps `Box<dyn Error>` from trait boundaries to typed `PlantError`.
//!
//! `RelayLink` and `WeightFeed` report `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `batcher_hardware::HwError` downcasting.

use crate::error::PlantError;

/// Map a trait-boundary error to a typed `PlantError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_link_error(e: &(dyn std::error::Error + 'static)) -> PlantError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<batcher_hardware::HwError>() {
            return match hw {
                batcher_hardware::HwError::Disconnected => PlantError::HardwareDisconnected,
                other => PlantError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("disconnect") || lower.contains("not connected") {
        PlantError::HardwareDisconnected
    } else {
        PlantError::Hardware(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_fallback_detects_disconnects() {
        let e = std::io::Error::other("peer disconnected");
        assert_eq!(map_link_error(&e), PlantError::HardwareDisconnected);
        let e = std::io::Error::other("relay board on fire");
        assert!(matches!(map_link_error(&e), PlantError::Hardware(m) if m.contains("fire")));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn downcasts_hw_error() {
        let e = batcher_hardware::HwError::Disconnected;
        assert_eq!(map_link_error(&e), PlantError::HardwareDisconnected);
        let e = batcher_hardware::HwError::Controller("coil 9 stuck".into());
        assert!(matches!(map_link_error(&e), PlantError::Hardware(m) if m.contains("coil 9")));
    }
}
