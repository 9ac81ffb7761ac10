//! Duration and travel distance to controller speed/accel values.
//!
//! Models a symmetric trapezoidal profile: constant acceleration to the
//! midpoint, constant deceleration to the target. When all 24 joints get
//! values derived from the same duration they arrive together.

use crate::error::{Result, SpiderError};

/// Largest value expressible in the two 7-bit payload bytes.
const PROFILE_MAX: f64 = 0x3FFF as f64;

/// Calibration from (units/ms, units/ms^2) into the controller's native
/// speed and acceleration units.
const SPEED_SCALE: f64 = 10.0 / 0.25;
const ACCEL_SCALE: f64 = 10.0 * 80.0 / 0.25;

/// Convert a transition duration (ms) and joint travel distance (device
/// units) into protocol (speed, accel) values.
///
/// Both outputs are floored at 1 because the protocol treats 0 as
/// uncapped rather than stopped.
pub fn time_to_speed_accel(
    duration_ms: u64,
    distance: i32,
    initial_velocity: f64,
) -> Result<(u16, u16)> {
    if duration_ms == 0 {
        return Err(SpiderError::ZeroDuration.into());
    }

    let half_time = duration_ms as f64 / 2.0;
    let half_distance = f64::from(distance) / 2.0;

    let accel = 2.0 * (half_distance - initial_velocity * half_time) / (half_time * half_time);
    let max_speed = initial_velocity + accel * half_time;

    let speed_units = max_speed * SPEED_SCALE + 0.5;
    let accel_units = accel * ACCEL_SCALE + 0.5;

    Ok((to_profile(speed_units), to_profile(accel_units)))
}

fn to_profile(value: f64) -> u16 {
    value.clamp(1.0, PROFILE_MAX) as u16
}
