#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and pose-file parsing for the spider controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The pose-file loader parses the plain-text pose format (a name line
//!   followed by six comma-separated 4-integer leg lines) into named
//!   24-joint poses.
use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SerialCfg {
    /// Serial device carrying both daisy-chained servo controllers.
    pub port: String,
    pub baud: u32,
}

impl Default for SerialCfg {
    fn default() -> Self {
        Self {
            port: "/dev/ttyMFD1".to_string(),
            baud: 9600,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PosesCfg {
    /// Path to the plain-text pose file.
    pub file: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ChannelsCfg {
    /// ADC channels of the two analog rangefinders.
    pub distance: [u8; 2],
    /// ADC channel of the respiration belt.
    pub respiration: u8,
    /// ADC channel of the pushbutton divider.
    pub button: u8,
}

impl Default for ChannelsCfg {
    fn default() -> Self {
        Self {
            distance: [2, 3],
            respiration: 1,
            button: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProximityCfg {
    /// Samples per channel per fused reading.
    pub filter_length: usize,
    /// A channel median this far (cm) from the cross-channel mean is rejected.
    pub rejection_threshold_cm: f32,
    /// Medians outside (min, max) cm are treated as invalid.
    pub valid_min_cm: f32,
    pub valid_max_cm: f32,
    /// Minimum gap between repeated sensor-disagreement warnings.
    pub warn_interval_s: u64,
}

impl Default for ProximityCfg {
    fn default() -> Self {
        Self {
            filter_length: 10,
            rejection_threshold_cm: 30.0,
            valid_min_cm: 20.0,
            valid_max_cm: 770.0,
            warn_interval_s: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BehaviorCfg {
    pub button_poll_ms: u64,
    /// ADC millivolts below which the button reads as pressed.
    pub button_threshold_mv: f32,
    /// A zone change must persist this long before the workers see it.
    pub zone_debounce_ms: u64,
    /// Respiration belt band treated as a deliberate big breath (volts).
    pub breath_min_v: f32,
    pub breath_max_v: f32,
    /// Minimum gap between accepted big breaths.
    pub breath_interval_ms: u64,
    pub respiration_poll_ms: u64,
    /// Main loop poll interval while waiting for events.
    pub idle_poll_ms: u64,
}

impl Default for BehaviorCfg {
    fn default() -> Self {
        Self {
            button_poll_ms: 100,
            button_threshold_mv: 1000.0,
            zone_debounce_ms: 1330,
            breath_min_v: 1.36,
            breath_max_v: 4.5,
            breath_interval_ms: 2000,
            respiration_poll_ms: 1000,
            idle_poll_ms: 50,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AnimationCfg {
    /// Motion-completion poll interval.
    pub poll_ms: u64,
    /// Upper bound on one leg's completion wait; expiry logs and moves on.
    pub motion_timeout_ms: u64,
    /// Per-leg duration used when a caller provides none.
    pub default_duration_ms: u64,
    /// Settle pause after a full script completes.
    pub settle_ms: u64,
}

impl Default for AnimationCfg {
    fn default() -> Self {
        Self {
            poll_ms: 10,
            motion_timeout_ms: 5000,
            default_duration_ms: 1500,
            settle_ms: 3000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub serial: SerialCfg,
    pub poses: Option<PosesCfg>,
    pub channels: ChannelsCfg,
    pub proximity: ProximityCfg,
    pub behavior: BehaviorCfg,
    pub animation: AnimationCfg,
    pub logging: Logging,
    /// Safe-route sets per pose name. A pose absent here gets an empty set
    /// and always transitions via the fallback waypoint.
    pub routes: BTreeMap<String, Vec<String>>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    /// Cross-field checks that serde alone cannot express.
    pub fn validate(&self) -> eyre::Result<()> {
        if self.proximity.filter_length == 0 {
            eyre::bail!("proximity.filter_length must be at least 1");
        }
        if self.proximity.valid_min_cm >= self.proximity.valid_max_cm {
            eyre::bail!(
                "proximity valid band is empty: min {} >= max {}",
                self.proximity.valid_min_cm,
                self.proximity.valid_max_cm
            );
        }
        if self.proximity.rejection_threshold_cm <= 0.0 {
            eyre::bail!("proximity.rejection_threshold_cm must be positive");
        }
        if self.behavior.breath_min_v >= self.behavior.breath_max_v {
            eyre::bail!(
                "behavior breath band is empty: min {} >= max {}",
                self.behavior.breath_min_v,
                self.behavior.breath_max_v
            );
        }
        if self.animation.poll_ms == 0 {
            eyre::bail!("animation.poll_ms must be at least 1");
        }
        if self.animation.default_duration_ms == 0 {
            eyre::bail!("animation.default_duration_ms must be at least 1");
        }
        if self.channels.distance[0] == self.channels.distance[1] {
            eyre::bail!("channels.distance entries must differ");
        }
        Ok(())
    }
}

/// One named pose parsed from the pose file: six legs of four joint pulse
/// widths each, in hardware units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoseEntry {
    pub name: String,
    pub legs: [[i32; 4]; 6],
}

/// Parse the plain-text pose format.
///
/// The format alternates a name line with six comma-separated lines of four
/// integers. Blank trailing lines are tolerated; anything else is an error,
/// never a panic, since pose files are edited by hand.
pub fn parse_pose_file(text: &str) -> eyre::Result<Vec<PoseEntry>> {
    let mut lines = text.lines().enumerate().peekable();
    let mut entries = Vec::new();

    while let Some((line_no, raw)) = lines.next() {
        let name = raw.trim();
        if name.is_empty() {
            continue;
        }
        let mut legs = [[0i32; 4]; 6];
        for leg in &mut legs {
            let (leg_no, leg_line) = lines.next().ok_or_else(|| {
                eyre::eyre!("pose {name:?} (line {}): file ends mid-pose", line_no + 1)
            })?;
            let fields: Vec<&str> = leg_line.split(',').map(str::trim).collect();
            if fields.len() != 4 {
                eyre::bail!(
                    "pose {name:?} (line {}): expected 4 joint values, got {}",
                    leg_no + 1,
                    fields.len()
                );
            }
            for (joint, field) in leg.iter_mut().zip(fields) {
                *joint = field.parse::<i32>().map_err(|e| {
                    eyre::eyre!("pose {name:?} (line {}): bad joint value {field:?}: {e}", leg_no + 1)
                })?;
            }
        }
        entries.push(PoseEntry {
            name: name.to_string(),
            legs,
        });
    }

    if entries.is_empty() {
        eyre::bail!("pose file contains no poses");
    }
    Ok(entries)
}

/// Read and parse a pose file from disk.
pub fn load_pose_file(path: &str) -> eyre::Result<Vec<PoseEntry>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("reading pose file {path}: {e}"))?;
    parse_pose_file(&text)
}
