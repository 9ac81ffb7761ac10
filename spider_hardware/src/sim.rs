//! Simulated servo controllers and light strip.
//!
//! `SimulatedServos` speaks the same framed protocol as the real controller
//! chain: it parses every write incrementally, tracks per-channel targets,
//! and queues reply bytes for the query commands so callers can poll position
//! and motion state exactly as they would against hardware.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use spider_traits::{LightStrip, Transport};

const SYNC: u8 = 0xAA;

const CMD_SET_TARGET: u8 = 0x04;
const CMD_SET_SPEED: u8 = 0x07;
const CMD_SET_ACCEL: u8 = 0x09;
const CMD_GET_POSITION: u8 = 0x10;
const CMD_GET_MOVING: u8 = 0x13;
const CMD_SET_MULTIPLE: u8 = 0x1F;
const CMD_GET_ERRORS: u8 = 0x21;
const CMD_GO_HOME: u8 = 0x22;

/// How many GET_MOVING polls report "still moving" after a target write.
const BUSY_POLLS_AFTER_MOVE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Sync,
    Device,
    Command,
    Args,
}

#[derive(Debug, Default)]
struct ChainState {
    /// Target per (device, channel), in quarter-microsecond units.
    targets: HashMap<(u8, u8), u16>,
    speeds: HashMap<(u8, u8), u16>,
    accels: HashMap<(u8, u8), u16>,
    replies: VecDeque<u8>,
    busy_polls: u8,
    frames: Vec<Vec<u8>>,
}

/// In-memory stand-in for the daisy-chained servo controllers.
///
/// Clones share state, so a test can keep one handle for inspection while
/// the code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct SimulatedServos {
    state: Arc<Mutex<ChainState>>,
    parse: Arc<Mutex<Parser>>,
}

#[derive(Debug)]
struct Parser {
    state: ParseState,
    device: u8,
    command: u8,
    args: Vec<u8>,
    args_needed: usize,
}

impl Default for Parser {
    fn default() -> Self {
        Self {
            state: ParseState::Sync,
            device: 0,
            command: 0,
            args: Vec::new(),
            args_needed: 0,
        }
    }
}

impl SimulatedServos {
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete frames written so far, in order.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.state.lock().map(|s| s.frames.clone()).unwrap_or_default()
    }

    /// Last commanded target for a channel, in quarter-microsecond units.
    pub fn target(&self, device: u8, channel: u8) -> Option<u16> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.targets.get(&(device, channel)).copied())
    }

    pub fn speed(&self, device: u8, channel: u8) -> Option<u16> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.speeds.get(&(device, channel)).copied())
    }

    pub fn accel(&self, device: u8, channel: u8) -> Option<u16> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.accels.get(&(device, channel)).copied())
    }

    fn args_needed(command: u8, args: &[u8]) -> Option<usize> {
        match command {
            CMD_SET_TARGET | CMD_SET_SPEED | CMD_SET_ACCEL => Some(3),
            CMD_GET_POSITION => Some(1),
            CMD_GET_MOVING | CMD_GET_ERRORS | CMD_GO_HOME => Some(0),
            CMD_SET_MULTIPLE => {
                // count, first channel, then two bytes per target.
                if args.len() < 2 {
                    None
                } else {
                    Some(2 + usize::from(args[0]) * 2)
                }
            }
            _ => Some(0),
        }
    }

    fn apply_frame(state: &mut ChainState, device: u8, command: u8, args: &[u8]) {
        let mut frame = vec![SYNC, device, command];
        frame.extend_from_slice(args);
        state.frames.push(frame);

        match command {
            CMD_SET_TARGET => {
                let channel = args[0];
                let value = u16::from(args[1]) | (u16::from(args[2]) << 7);
                state.targets.insert((device, channel), value);
                state.busy_polls = BUSY_POLLS_AFTER_MOVE;
            }
            CMD_SET_SPEED => {
                let channel = args[0];
                let value = u16::from(args[1]) | (u16::from(args[2]) << 7);
                state.speeds.insert((device, channel), value);
            }
            CMD_SET_ACCEL => {
                let channel = args[0];
                let value = u16::from(args[1]) | (u16::from(args[2]) << 7);
                state.accels.insert((device, channel), value);
            }
            CMD_SET_MULTIPLE => {
                let count = usize::from(args[0]);
                let first = args[1];
                for i in 0..count {
                    let lo = args[2 + i * 2];
                    let hi = args[3 + i * 2];
                    let value = u16::from(lo) | (u16::from(hi) << 7);
                    state
                        .targets
                        .insert((device, first + u8::try_from(i).unwrap_or(0)), value);
                }
                state.busy_polls = BUSY_POLLS_AFTER_MOVE;
            }
            CMD_GET_POSITION => {
                let channel = args[0];
                let value = state
                    .targets
                    .get(&(device, channel))
                    .copied()
                    .unwrap_or(1500 * 4);
                // Reply is plain 8-bit little-endian, unlike command payloads.
                state.replies.push_back((value & 0xFF) as u8);
                state.replies.push_back((value >> 8) as u8);
            }
            CMD_GET_MOVING => {
                let moving = if state.busy_polls > 0 {
                    state.busy_polls -= 1;
                    1
                } else {
                    0
                };
                state.replies.push_back(moving);
            }
            CMD_GET_ERRORS => {
                state.replies.push_back(0);
                state.replies.push_back(0);
            }
            CMD_GO_HOME => {
                state.targets.retain(|(dev, _), _| *dev != device);
            }
            _ => {}
        }
    }
}

impl Transport for SimulatedServos {
    fn write(&mut self, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut parser = self
            .parse
            .lock()
            .map_err(|_| "simulated servo parser lock poisoned".to_string())?;
        let mut state = self
            .state
            .lock()
            .map_err(|_| "simulated servo state lock poisoned".to_string())?;

        for &b in bytes {
            match parser.state {
                ParseState::Sync => {
                    if b == SYNC {
                        parser.state = ParseState::Device;
                    }
                }
                ParseState::Device => {
                    parser.device = b;
                    parser.state = ParseState::Command;
                }
                ParseState::Command => {
                    parser.command = b;
                    parser.args.clear();
                    match Self::args_needed(b, &[]) {
                        Some(0) => {
                            Self::apply_frame(&mut state, parser.device, b, &[]);
                            parser.state = ParseState::Sync;
                        }
                        Some(n) => {
                            parser.args_needed = n;
                            parser.state = ParseState::Args;
                        }
                        None => {
                            parser.args_needed = usize::MAX;
                            parser.state = ParseState::Args;
                        }
                    }
                }
                ParseState::Args => {
                    parser.args.push(b);
                    if parser.args_needed == usize::MAX {
                        if let Some(n) = Self::args_needed(parser.command, &parser.args) {
                            parser.args_needed = n;
                        }
                    }
                    if parser.args_needed != usize::MAX && parser.args.len() >= parser.args_needed {
                        let args = std::mem::take(&mut parser.args);
                        Self::apply_frame(&mut state, parser.device, parser.command, &args);
                        parser.state = ParseState::Sync;
                    }
                }
            }
        }
        Ok(())
    }

    fn read_byte(
        &mut self,
        _timeout: Duration,
    ) -> Result<Option<u8>, Box<dyn std::error::Error + Send + Sync>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| "simulated servo state lock poisoned".to_string())?;
        Ok(state.replies.pop_front())
    }

    fn discard_input(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| "simulated servo state lock poisoned".to_string())?;
        state.replies.clear();
        Ok(())
    }
}

/// Light strip that only logs what it is asked to show.
#[derive(Debug, Clone, Default)]
pub struct SimulatedLightStrip {
    history: Arc<Mutex<Vec<LightCommand>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightCommand {
    ZoneColor { zone: u8, rgb: [u8; 3] },
    Off,
}

impl SimulatedLightStrip {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<LightCommand> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }
}

impl LightStrip for SimulatedLightStrip {
    fn set_zone_color(
        &mut self,
        zone: u8,
        rgb: [u8; 3],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::debug!(zone, ?rgb, "light strip zone color");
        if let Ok(mut h) = self.history.lock() {
            h.push(LightCommand::ZoneColor { zone, rgb });
        }
        Ok(())
    }

    fn set_off(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::debug!("light strip off");
        if let Ok(mut h) = self.history.lock() {
            h.push(LightCommand::Off);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_set_target_and_replies_to_position_query() {
        let mut sim = SimulatedServos::new();
        // 1500 us -> 6000 quarter-us -> lo 0x70, hi 0x2E in 7-bit split.
        sim.write(&[SYNC, 12, CMD_SET_TARGET, 3, 0x70, 0x2E]).unwrap();
        assert_eq!(sim.target(12, 3), Some(6000));

        sim.write(&[SYNC, 12, CMD_GET_POSITION, 3]).unwrap();
        let lo = sim.read_byte(Duration::from_millis(1)).unwrap().unwrap();
        let hi = sim.read_byte(Duration::from_millis(1)).unwrap().unwrap();
        assert_eq!(u16::from(lo) | (u16::from(hi) << 8), 6000);
    }

    #[test]
    fn set_multiple_updates_consecutive_channels() {
        let mut sim = SimulatedServos::new();
        let mut frame = vec![SYNC, 13, CMD_SET_MULTIPLE, 2, 4];
        frame.extend_from_slice(&[0x10, 0x2E, 0x20, 0x2E]);
        sim.write(&frame).unwrap();
        assert_eq!(sim.target(13, 4), Some(0x10 | (0x2E << 7)));
        assert_eq!(sim.target(13, 5), Some(0x20 | (0x2E << 7)));
    }

    #[test]
    fn moving_query_goes_idle_after_two_polls() {
        let mut sim = SimulatedServos::new();
        sim.write(&[SYNC, 12, CMD_SET_TARGET, 0, 0x70, 0x2E]).unwrap();
        for expected in [1u8, 1, 0] {
            sim.write(&[SYNC, 12, CMD_GET_MOVING]).unwrap();
            let b = sim.read_byte(Duration::from_millis(1)).unwrap().unwrap();
            assert_eq!(b, expected);
        }
    }

    #[test]
    fn writes_split_across_calls_are_reassembled() {
        let mut sim = SimulatedServos::new();
        sim.write(&[SYNC, 12]).unwrap();
        sim.write(&[CMD_SET_TARGET, 7]).unwrap();
        sim.write(&[0x00, 0x17]).unwrap();
        assert_eq!(sim.target(12, 7), Some(0x17 << 7));
    }
}
