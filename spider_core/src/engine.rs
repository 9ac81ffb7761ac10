//! Pose transitions and scripted animation playback.
//!
//! Every transition goes through a safe-route waypoint: speed and accel
//! for all 24 joints are written first, then one batched position command,
//! so the joints start moving together. The engine then polls the
//! controllers' busy flags before commanding the final leg.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use spider_traits::{Clock, Transport};

use crate::error::Result;
use crate::kinematics::time_to_speed_accel;
use crate::pose::{PoseTable, JOINTS_PER_LEG, LEGS};
use crate::protocol::ServoLink;
use crate::script::{AnimationScript, Step};

/// Extra sleep added to script pause steps, matching the grace the pose
/// steps get from motion polling.
const PAUSE_GRACE_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Completed,
    /// Another play/animate was already in progress; nothing was done.
    Busy,
    /// A stop request arrived between steps; the current leg finished.
    Cancelled,
    /// The script names the pose the robot already holds.
    Skipped,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineCfg {
    pub poll_ms: u64,
    pub motion_timeout_ms: u64,
    pub default_duration_ms: u64,
    pub settle_ms: u64,
}

impl From<&spider_config::AnimationCfg> for EngineCfg {
    fn from(cfg: &spider_config::AnimationCfg) -> Self {
        Self {
            poll_ms: cfg.poll_ms,
            motion_timeout_ms: cfg.motion_timeout_ms,
            default_duration_ms: cfg.default_duration_ms,
            settle_ms: cfg.settle_ms,
        }
    }
}

pub struct AnimationEngine<T: Transport, C: Clock> {
    link: ServoLink<T>,
    poses: Arc<PoseTable>,
    clock: C,
    cfg: EngineCfg,
    current_pose: String,
    animating: bool,
}

impl<T: Transport, C: Clock> AnimationEngine<T, C> {
    /// The engine assumes the robot physically starts in `initial_pose`.
    pub fn new(
        link: ServoLink<T>,
        poses: Arc<PoseTable>,
        clock: C,
        cfg: EngineCfg,
        initial_pose: &str,
    ) -> Result<Self> {
        poses.get(initial_pose)?;
        Ok(Self {
            link,
            poses,
            clock,
            cfg,
            current_pose: initial_pose.to_string(),
            animating: false,
        })
    }

    #[must_use]
    pub fn current_pose(&self) -> &str {
        &self.current_pose
    }

    pub fn link_mut(&mut self) -> &mut ServoLink<T> {
        &mut self.link
    }

    /// Move to `target` through its safe-route waypoint.
    ///
    /// No-op (`Busy`) while another animation is in progress. The stop flag
    /// is honored between legs; an in-flight leg always finishes.
    pub fn animate(
        &mut self,
        target: &str,
        durations_ms: [u64; LEGS],
        stop: &AtomicBool,
    ) -> Result<PlayOutcome> {
        if self.animating {
            return Ok(PlayOutcome::Busy);
        }
        self.animating = true;
        let result = self.animate_inner(target, durations_ms, stop);
        self.animating = false;
        result
    }

    fn animate_inner(
        &mut self,
        target: &str,
        durations_ms: [u64; LEGS],
        stop: &AtomicBool,
    ) -> Result<PlayOutcome> {
        self.poses.get(target)?;
        let route = self.poses.common_route(&self.current_pose, target).to_string();

        self.move_leg(&route, durations_ms)?;
        self.current_pose.clone_from(&route);
        self.wait_motion_complete()?;

        if route != target {
            if stop.load(Ordering::Relaxed) {
                return Ok(PlayOutcome::Cancelled);
            }
            self.move_leg(target, durations_ms)?;
            self.current_pose = target.to_string();
            self.wait_motion_complete()?;
        }
        Ok(PlayOutcome::Completed)
    }

    /// Write speed/accel for all 24 joints, then one batched position
    /// command, for the transition from the current pose to `to`.
    fn move_leg(&mut self, to: &str, durations_ms: [u64; LEGS]) -> Result<()> {
        let from_pose = *self.poses.get(&self.current_pose)?;
        let to_pose = *self.poses.get(to)?;
        let targets = to_pose.flat();
        // Validate the batch up front so a rejection never leaves joints
        // with fresh speed/accel but no position command.
        crate::protocol::validate_targets(0, &targets).map_err(crate::error::SpiderError::Protocol)?;
        let diff = from_pose.difference(&to_pose);

        let mut profiles = [(1u16, 1u16); LEGS * JOINTS_PER_LEG];
        for leg in 0..LEGS {
            let duration = if durations_ms[leg] == 0 {
                self.cfg.default_duration_ms
            } else {
                durations_ms[leg]
            };
            for joint in 0..JOINTS_PER_LEG {
                profiles[leg * JOINTS_PER_LEG + joint] =
                    time_to_speed_accel(duration, diff.legs[leg][joint], 0.0)?;
            }
        }

        // Profile first, position last, so all joints launch together.
        for (channel, &(speed, accel)) in profiles.iter().enumerate() {
            let channel = channel as u8;
            self.link.set_speed(channel, speed)?;
            self.link.set_accel(channel, accel)?;
        }
        self.link.set_multiple(0, &targets)?;
        Ok(())
    }

    /// Poll the busy flags until motion stops or the timeout expires.
    /// Timeout is logged and tolerated; a wedged busy flag must not hang
    /// the behavior loop.
    fn wait_motion_complete(&mut self) -> Result<()> {
        let started = self.clock.now();
        loop {
            self.clock.sleep(Duration::from_millis(self.cfg.poll_ms));
            if !self.link.get_moving()? {
                return Ok(());
            }
            if self.clock.ms_since(started) >= self.cfg.motion_timeout_ms {
                tracing::warn!(
                    timeout_ms = self.cfg.motion_timeout_ms,
                    "motion did not complete before timeout"
                );
                return Ok(());
            }
        }
    }

    /// Play a script step by step.
    ///
    /// Skipped when the script names the held pose; busy when another
    /// animation is running; cancelled (after the in-flight step) when the
    /// stop flag goes up between steps. A completed run is followed by a
    /// settle pause.
    pub fn play(&mut self, script: &AnimationScript, stop: &AtomicBool) -> Result<PlayOutcome> {
        if self.animating {
            return Ok(PlayOutcome::Busy);
        }
        if script.name == self.current_pose {
            return Ok(PlayOutcome::Skipped);
        }
        self.animating = true;
        let result = self.play_inner(script, stop);
        self.animating = false;
        result
    }

    fn play_inner(&mut self, script: &AnimationScript, stop: &AtomicBool) -> Result<PlayOutcome> {
        for step in &script.steps {
            if stop.load(Ordering::Relaxed) {
                tracing::debug!(script = %script.name, "script cancelled between steps");
                return Ok(PlayOutcome::Cancelled);
            }
            match step {
                Step::Pause { duration_ms } => {
                    self.clock
                        .sleep(Duration::from_millis(duration_ms + PAUSE_GRACE_MS));
                }
                Step::Pose { name, durations_ms } => {
                    self.animate_inner(name, *durations_ms, stop)?;
                }
            }
        }
        self.clock.sleep(Duration::from_millis(self.cfg.settle_ms));
        Ok(PlayOutcome::Completed)
    }
}
