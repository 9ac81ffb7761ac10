//! Canned animation scripts and the per-zone playlists.
//!
//! Scripts are static configuration: an ordered list of pose steps with
//! per-leg durations, or timed pauses. The behavior controller picks
//! scripts from playlists keyed by proxemic zone.

use std::collections::BTreeMap;

use crate::pose::LEGS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Animate to a named pose; one duration (ms) per leg.
    Pose {
        name: String,
        durations_ms: [u64; LEGS],
    },
    /// Sleep without commanding hardware.
    Pause { duration_ms: u64 },
}

impl Step {
    /// Pose step with the same duration for every leg.
    #[must_use]
    pub fn pose(name: &str, duration_ms: u64) -> Self {
        Self::Pose {
            name: name.to_string(),
            durations_ms: [duration_ms; LEGS],
        }
    }

    #[must_use]
    pub const fn pause(duration_ms: u64) -> Self {
        Self::Pause { duration_ms }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationScript {
    pub name: String,
    pub steps: Vec<Step>,
}

impl AnimationScript {
    fn new(name: &str, steps: Vec<Step>) -> Self {
        Self {
            name: name.to_string(),
            steps,
        }
    }
}

/// The built-in script table.
#[must_use]
pub fn builtin_scripts() -> BTreeMap<String, AnimationScript> {
    let mut scripts = BTreeMap::new();
    let mut add = |name: &str, steps: Vec<Step>| {
        scripts.insert(name.to_string(), AnimationScript::new(name, steps));
    };

    add("park", vec![Step::pose("park", 1500)]);
    add("extend", vec![Step::pose("extend", 1500)]);
    add(
        "breathe",
        vec![
            Step::pose("extend", 1300),
            Step::pose("park", 1300),
            Step::pose("extend_half", 1300),
            Step::pose("park", 1300),
        ],
    );
    add(
        "slow_breathe",
        vec![
            Step::pose("extend", 2000),
            Step::pose("park", 2000),
            Step::pose("extend_half", 1750),
            Step::pause(450),
            Step::pose("park", 1750),
            Step::pause(450),
            Step::pose("extend", 2000),
            Step::pose("park", 2000),
            Step::pose("extend_half", 1750),
            Step::pause(450),
            Step::pose("park", 1750),
        ],
    );
    add(
        "knife",
        vec![
            Step::pose("knife", 600),
            Step::pause(500),
            Step::pose("park", 1000),
        ],
    );
    add(
        "attack",
        vec![Step::pose("extend", 750), Step::pose("park", 900)],
    );
    // Sparingly used; it reads as singling someone out.
    add(
        "point",
        vec![Step::pose("point", 1500), Step::pose("park", 1500)],
    );
    add(
        "jugendstil",
        vec![
            Step::pose("jugendstil_half", 1500),
            Step::pause(750),
            Step::pose("jugendstil", 1500),
            Step::pause(850),
            Step::pose("park", 1500),
        ],
    );
    add(
        "challenge",
        vec![
            Step::pose("challenge", 1500),
            Step::pause(1000),
            Step::pose("park", 1500),
        ],
    );
    add(
        "wiggle",
        vec![
            Step::pose("wiggle_up", 750),
            Step::pose("wiggle_down", 100),
            Step::pose("wiggle_up", 100),
            Step::pose("wiggle_down", 100),
            Step::pose("wiggle_up", 100),
            Step::pose("park", 750),
        ],
    );
    add(
        "ninja",
        vec![
            Step::pose("extend", 600),
            Step::pose("park", 1000),
            Step::pose("knife", 500),
            Step::pose("park", 1500),
        ],
    );

    scripts
}

/// Ordered script sequences played while someone stands in the personal
/// zone. Progress through one playlist is kept until the zone resets it.
pub const PERSONAL_PLAYLISTS: [[&str; 3]; 3] = [
    ["attack", "challenge", "breathe"],
    ["ninja", "wiggle", "breathe"],
    ["knife", "jugendstil", "breathe"],
];

/// Script for the social and public zones.
pub const SOCIAL_PUBLIC_SCRIPT: &str = "park";

/// Script when someone is uncomfortably close.
pub const INTIMATE_SCRIPT: &str = "park";

/// Script triggered by a detected big breath.
pub const BIG_BREATH_SCRIPT: &str = "slow_breathe";

/// Script looped by the breathing mode. Same animation as the big-breath
/// response, named separately so each call site states its own trigger.
pub const BREATHING_SCRIPT: &str = "slow_breathe";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlists_only_name_known_scripts() {
        let scripts = builtin_scripts();
        for playlist in PERSONAL_PLAYLISTS {
            for name in playlist {
                assert!(scripts.contains_key(name), "unknown script {name}");
            }
        }
        assert!(scripts.contains_key(SOCIAL_PUBLIC_SCRIPT));
        assert!(scripts.contains_key(INTIMATE_SCRIPT));
        assert!(scripts.contains_key(BIG_BREATH_SCRIPT));
        assert!(scripts.contains_key(BREATHING_SCRIPT));
    }

    #[test]
    fn every_script_has_steps() {
        for script in builtin_scripts().values() {
            assert!(!script.steps.is_empty(), "empty script {}", script.name);
        }
    }
}
