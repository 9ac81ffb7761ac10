//! Proximity sensor fusion: median filtering, cross-checking of the two
//! rangefinder channels, and proxemic zone classification.

use std::time::Instant;

use spider_traits::{Clock, DistanceSensor};

use crate::error::Result;
use crate::hw_error::map_hw_error;

/// Zone upper bounds in centimeters, ascending. Distances past the last
/// bound still classify as public.
pub const ZONE_THRESHOLDS: [f32; 4] = [45.0, 120.0, 280.0, 720.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Zone {
    Intimate = 0,
    Personal = 1,
    Social = 2,
    Public = 3,
}

impl Zone {
    /// Map a fused distance to the first threshold bucket it falls within.
    #[must_use]
    pub fn classify(distance_cm: f32) -> Self {
        for (i, limit) in ZONE_THRESHOLDS.iter().enumerate() {
            if distance_cm <= *limit {
                return Self::from_index(i as u8);
            }
        }
        Self::Public
    }

    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        match index {
            0 => Self::Intimate,
            1 => Self::Personal,
            2 => Self::Social,
            _ => Self::Public,
        }
    }
}

/// One fused sampling window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProxemicReading {
    pub distance_cm: f32,
    pub zone: Zone,
}

/// Median by sorting, lower-middle element for even-length input.
///
/// The lower-middle convention is deliberate and load-bearing: tests and
/// the deviation rule assume it is applied consistently.
#[must_use]
pub fn median_lower(samples: &mut [f32]) -> f32 {
    debug_assert!(!samples.is_empty());
    samples.sort_by(f32::total_cmp);
    samples[(samples.len() - 1) / 2]
}

#[derive(Debug, Clone, Copy)]
pub struct FusionCfg {
    pub channels: [u8; 2],
    pub filter_length: usize,
    pub rejection_threshold_cm: f32,
    pub valid_min_cm: f32,
    pub valid_max_cm: f32,
    pub warn_interval_s: u64,
}

impl From<&spider_config::ProximityCfg> for FusionCfg {
    fn from(cfg: &spider_config::ProximityCfg) -> Self {
        Self {
            channels: [2, 3],
            filter_length: cfg.filter_length,
            rejection_threshold_cm: cfg.rejection_threshold_cm,
            valid_min_cm: cfg.valid_min_cm,
            valid_max_cm: cfg.valid_max_cm,
            warn_interval_s: cfg.warn_interval_s,
        }
    }
}

impl FusionCfg {
    #[must_use]
    pub fn with_channels(mut self, channels: [u8; 2]) -> Self {
        self.channels = channels;
        self
    }
}

/// Fuses the two rangefinder channels into one trusted distance.
///
/// Stateless per call except the rate-limited warning timestamp, which
/// starts at "never warned".
pub struct ProximityFusion<D: DistanceSensor, C: Clock> {
    sensor: D,
    clock: C,
    cfg: FusionCfg,
    last_warn: Option<Instant>,
}

impl<D: DistanceSensor, C: Clock> ProximityFusion<D, C> {
    pub fn new(sensor: D, clock: C, cfg: FusionCfg) -> Self {
        Self {
            sensor,
            clock,
            cfg,
            last_warn: None,
        }
    }

    fn is_valid(&self, distance: f32) -> bool {
        (self.cfg.valid_min_cm..=self.cfg.valid_max_cm).contains(&distance)
    }

    /// Emit at most one warning per configured interval; glitching sensors
    /// must not flood the log from a tight polling loop.
    fn maybe_warn(&mut self, channel: u8, median: f32) {
        let now = self.clock.now();
        let quiet = self.last_warn.is_none_or(|last| {
            now.saturating_duration_since(last).as_secs() >= self.cfg.warn_interval_s
        });
        if quiet {
            self.last_warn = Some(now);
            tracing::warn!(channel, median, "rangefinder channel returned implausible data");
        }
    }

    /// Draw one filtered reading and classify it.
    pub fn sample(&mut self) -> Result<ProxemicReading> {
        let distance_cm = self.fused_distance()?;
        Ok(ProxemicReading {
            distance_cm,
            zone: Zone::classify(distance_cm),
        })
    }

    fn fused_distance(&mut self) -> Result<f32> {
        let mut samples: [Vec<f32>; 2] = [
            Vec::with_capacity(self.cfg.filter_length),
            Vec::with_capacity(self.cfg.filter_length),
        ];
        for _ in 0..self.cfg.filter_length {
            for (i, &channel) in self.cfg.channels.iter().enumerate() {
                let d = self
                    .sensor
                    .read_distance(channel)
                    .map_err(|e| map_hw_error(e.as_ref()))?;
                samples[i].push(d);
            }
        }

        let medians = [median_lower(&mut samples[0]), median_lower(&mut samples[1])];

        // Validity precedes deviation rejection: a channel whose median is
        // outside the plausible band is ignored in favor of its peer.
        for i in 0..2 {
            if !self.is_valid(medians[i]) {
                self.maybe_warn(self.cfg.channels[i], medians[i]);
                return Ok(medians[(i + 1) % 2]);
            }
        }

        let mean = (medians[0] + medians[1]) / 2.0;
        // When a channel strays from consensus, trust the one that stayed
        // closer, not the average.
        for i in 0..2 {
            if (mean - medians[i]).abs() >= self.cfg.rejection_threshold_cm {
                return Ok(medians[(i + 1) % 2]);
            }
        }
        Ok(mean)
    }
}
