//! Maps `Box<dyn Error>` from trait boundaries to typed `SpiderError`.
//!
//! The traits in `spider_traits` use `Box<dyn Error + Send + Sync>` for
//! flexibility; this module converts those to our typed error enum, with an
//! optional feature-gated path for `spider_hardware::HwError` downcasting.

use crate::error::SpiderError;

/// Map a trait-boundary error to a typed `SpiderError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to a transport/sensor split based on the message.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> SpiderError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<spider_hardware::error::HwError>() {
            return match hw {
                spider_hardware::error::HwError::Serial(s) => SpiderError::Transport(s.clone()),
                spider_hardware::error::HwError::Io(io) => SpiderError::Transport(io.to_string()),
                other => SpiderError::Sensor(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("serial") {
        SpiderError::Transport(s)
    } else {
        SpiderError::Sensor(s)
    }
}
