//! Named 24-joint poses and the safe-route graph between them.
//!
//! Direct jumps between arbitrary poses can self-collide, so every pose
//! carries a set of pose names it may transition to directly. Transitions
//! between poses with no common safe route go via the fallback pose.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, SpiderError};

/// Waypoint used whenever two poses share no safe route.
pub const FALLBACK_POSE: &str = "park";

pub const LEGS: usize = 6;
pub const JOINTS_PER_LEG: usize = 4;

/// Six legs of four joint pulse widths, in raw device units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pose {
    pub legs: [[i32; JOINTS_PER_LEG]; LEGS],
}

impl Pose {
    /// Elementwise absolute difference; the per-joint travel distance.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        let mut legs = [[0i32; JOINTS_PER_LEG]; LEGS];
        for (i, leg) in legs.iter_mut().enumerate() {
            for (j, joint) in leg.iter_mut().enumerate() {
                *joint = (self.legs[i][j] - other.legs[i][j]).abs();
            }
        }
        Self { legs }
    }

    /// Joints in channel order (leg-major).
    #[must_use]
    pub fn flat(&self) -> [i32; LEGS * JOINTS_PER_LEG] {
        let mut out = [0i32; LEGS * JOINTS_PER_LEG];
        for (i, leg) in self.legs.iter().enumerate() {
            for (j, &joint) in leg.iter().enumerate() {
                out[i * JOINTS_PER_LEG + j] = joint;
            }
        }
        out
    }
}

/// Return a safe route common to both sets, or the fallback.
///
/// Which common entry wins is unspecified; callers must not rely on it.
#[must_use]
pub fn find_common_route<'a>(
    routes_a: &'a BTreeSet<String>,
    routes_b: &'a BTreeSet<String>,
) -> &'a str {
    routes_a
        .intersection(routes_b)
        .next()
        .map_or(FALLBACK_POSE, String::as_str)
}

/// Immutable pose table plus per-pose safe-route sets, built once at load.
#[derive(Debug)]
pub struct PoseTable {
    poses: BTreeMap<String, Pose>,
    routes: BTreeMap<String, BTreeSet<String>>,
    empty: BTreeSet<String>,
}

impl PoseTable {
    /// Build the table from loaded pose entries and the configured route
    /// sets. Route entries naming unknown poses and a missing fallback
    /// pose are configuration faults.
    pub fn new(
        entries: Vec<spider_config::PoseEntry>,
        route_cfg: &BTreeMap<String, Vec<String>>,
    ) -> Result<Self> {
        let mut poses = BTreeMap::new();
        for entry in entries {
            poses.insert(entry.name, Pose { legs: entry.legs });
        }
        if !poses.contains_key(FALLBACK_POSE) {
            return Err(SpiderError::Config(format!(
                "pose table is missing the fallback pose {FALLBACK_POSE:?}"
            ))
            .into());
        }

        let mut routes: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (name, targets) in route_cfg {
            if !poses.contains_key(name) {
                return Err(SpiderError::Config(format!(
                    "routes reference unknown pose {name:?}"
                ))
                .into());
            }
            let set: BTreeSet<String> = targets.iter().cloned().collect();
            for target in &set {
                if !poses.contains_key(target) {
                    return Err(SpiderError::Config(format!(
                        "route {name:?} -> {target:?} references unknown pose"
                    ))
                    .into());
                }
            }
            routes.insert(name.clone(), set);
        }

        Ok(Self {
            poses,
            routes,
            empty: BTreeSet::new(),
        })
    }

    pub fn get(&self, name: &str) -> Result<&Pose> {
        self.poses
            .get(name)
            .ok_or_else(|| SpiderError::Config(format!("unknown pose {name:?}")).into())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.poses.contains_key(name)
    }

    /// Safe-route set for a pose; poses without configured routes get an
    /// empty set and always transition via the fallback.
    #[must_use]
    pub fn routes(&self, name: &str) -> &BTreeSet<String> {
        self.routes.get(name).unwrap_or(&self.empty)
    }

    /// Pick the waypoint for a transition between two poses.
    #[must_use]
    pub fn common_route(&self, from: &str, to: &str) -> &str {
        find_common_route(self.routes(from), self.routes(to))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.poses.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(value: i32) -> Pose {
        Pose {
            legs: [[value; JOINTS_PER_LEG]; LEGS],
        }
    }

    #[test]
    fn difference_is_symmetric_and_zero_on_self() {
        let a = uniform(1500);
        let b = uniform(900);
        assert_eq!(a.difference(&a), uniform(0));
        assert_eq!(a.difference(&b), b.difference(&a));
        assert_eq!(a.difference(&b), uniform(600));
    }

    #[test]
    fn common_route_falls_back_when_disjoint() {
        let a: BTreeSet<String> = ["knife".to_string()].into();
        let b: BTreeSet<String> = ["extend_half".to_string()].into();
        assert_eq!(find_common_route(&a, &b), FALLBACK_POSE);
    }

    #[test]
    fn common_route_prefers_shared_entry() {
        let a: BTreeSet<String> = ["extend".to_string(), "knife".to_string()].into();
        let b: BTreeSet<String> = ["knife".to_string()].into();
        assert_eq!(find_common_route(&a, &b), "knife");
    }
}
