//! Binary frame codec for the two daisy-chained servo controllers.
//!
//! Each frame is `[0xAA][device][command][args...]`. Logical channels 0-23
//! map to device A (channels 0-11) and device B (channels 12-23, re-indexed
//! locally to 0-11). Multi-byte command values are split into two 7-bit
//! bytes, low byte first. Positions travel in quarter-microsecond units
//! (raw pulse width times 4).

use std::time::Duration;

use spider_traits::Transport;

use crate::error::{ProtocolError, Result, SpiderError};
use crate::hw_error::map_hw_error;

pub const SYNC: u8 = 0xAA;
/// Device address of controller A; controller B is this plus one.
pub const DEVICE_A: u8 = 0x0C;
pub const DEVICE_B: u8 = DEVICE_A + 1;

pub const CHANNELS: u8 = 24;
pub const CHANNELS_PER_DEVICE: u8 = 12;

/// Documented safe pulse-width bounds in raw device units. Zero is also
/// accepted and means "servo off".
pub const PULSE_MIN: i32 = 736;
pub const PULSE_MAX: i32 = 2272;

const CMD_SET_TARGET: u8 = 0x04;
const CMD_SET_SPEED: u8 = 0x07;
const CMD_SET_ACCEL: u8 = 0x09;
const CMD_GET_POSITION: u8 = 0x10;
const CMD_GET_MOVING: u8 = 0x13;
const CMD_SET_MULTIPLE: u8 = 0x1F;
const CMD_GET_ERRORS: u8 = 0x21;
const CMD_GO_HOME: u8 = 0x22;

/// A fresh get-position reply never has a high byte above this (2272 us
/// times 4 is 0x2380); anything larger is a desynchronized read.
const POSITION_HIGH_MAX: u8 = 0x23;

#[inline]
#[must_use]
pub const fn device_for(channel: u8) -> u8 {
    if channel < CHANNELS_PER_DEVICE {
        DEVICE_A
    } else {
        DEVICE_B
    }
}

#[inline]
#[must_use]
pub const fn local_channel_for(channel: u8) -> u8 {
    channel % CHANNELS_PER_DEVICE
}

/// Split a value into two 7-bit bytes, low first.
#[inline]
#[must_use]
pub const fn split_7bit(value: u16) -> [u8; 2] {
    [(value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8]
}

fn check_channel(channel: u8) -> std::result::Result<(), ProtocolError> {
    if channel < CHANNELS {
        Ok(())
    } else {
        Err(ProtocolError::BadChannel(channel))
    }
}

fn check_pulse(channel: u8, pulse_width: i32) -> std::result::Result<(), ProtocolError> {
    // Zero parks the servo unpowered and is always legal.
    if pulse_width == 0 || (PULSE_MIN..=PULSE_MAX).contains(&pulse_width) {
        Ok(())
    } else {
        Err(ProtocolError::OutOfRange {
            channel,
            value: pulse_width,
            min: PULSE_MIN,
            max: PULSE_MAX,
        })
    }
}

/// Bounds-check a batched position command without sending anything.
///
/// Callers that write motion profiles before the position batch use this
/// first, so a rejected batch never leaves joints with speed/accel but no
/// position.
pub fn validate_targets(
    first_channel: u8,
    pulse_widths: &[i32],
) -> std::result::Result<(), ProtocolError> {
    let count = pulse_widths.len();
    if usize::from(first_channel) + count > usize::from(CHANNELS) {
        return Err(ProtocolError::TooManyTargets {
            first: first_channel,
            count,
        });
    }
    for (i, &pw) in pulse_widths.iter().enumerate() {
        let channel = first_channel + u8::try_from(i).unwrap_or(u8::MAX);
        check_pulse(channel, pw)?;
    }
    Ok(())
}

/// Codec over a byte transport, addressing both chained devices.
pub struct ServoLink<T: Transport> {
    transport: T,
    read_timeout: Duration,
}

impl<T: Transport> ServoLink<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            read_timeout: Duration::from_millis(100),
        }
    }

    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.transport
            .write(frame)
            .map_err(|e| map_hw_error(e.as_ref()))?;
        Ok(())
    }

    fn recv_byte(&mut self) -> Result<Option<u8>> {
        let b = self
            .transport
            .read_byte(self.read_timeout)
            .map_err(|e| map_hw_error(e.as_ref()))?;
        Ok(b)
    }

    fn discard_input(&mut self) -> Result<()> {
        self.transport
            .discard_input()
            .map_err(|e| map_hw_error(e.as_ref()))?;
        Ok(())
    }

    /// Command one servo to a raw pulse width (device units).
    pub fn set_position(&mut self, channel: u8, pulse_width: i32) -> Result<()> {
        check_channel(channel).map_err(SpiderError::Protocol)?;
        check_pulse(channel, pulse_width).map_err(SpiderError::Protocol)?;
        let quarter_us = (pulse_width * 4) as u16;
        let [lo, hi] = split_7bit(quarter_us);
        let frame = [
            SYNC,
            device_for(channel),
            CMD_SET_TARGET,
            local_channel_for(channel),
            lo,
            hi,
        ];
        self.send(&frame)
    }

    pub fn set_speed(&mut self, channel: u8, speed: u16) -> Result<()> {
        self.set_profile(channel, CMD_SET_SPEED, speed)
    }

    pub fn set_accel(&mut self, channel: u8, accel: u16) -> Result<()> {
        self.set_profile(channel, CMD_SET_ACCEL, accel)
    }

    fn set_profile(&mut self, channel: u8, command: u8, value: u16) -> Result<()> {
        check_channel(channel).map_err(SpiderError::Protocol)?;
        let [lo, hi] = split_7bit(value);
        let frame = [
            SYNC,
            device_for(channel),
            command,
            local_channel_for(channel),
            lo,
            hi,
        ];
        self.send(&frame)
    }

    /// Command a consecutive run of servos in one or two batched frames.
    ///
    /// The run is split at the device boundary when it straddles both
    /// controllers. Every pulse width in both sub-batches is validated
    /// before anything is written, so a rejected batch never partially
    /// applies.
    pub fn set_multiple(&mut self, first_channel: u8, pulse_widths: &[i32]) -> Result<()> {
        validate_targets(first_channel, pulse_widths).map_err(SpiderError::Protocol)?;

        let count = pulse_widths.len();
        let split = usize::from(CHANNELS_PER_DEVICE.saturating_sub(first_channel)).min(count);
        let (head, tail) = pulse_widths.split_at(split);

        if !head.is_empty() {
            let frame = Self::batch_frame(
                device_for(first_channel),
                local_channel_for(first_channel),
                head,
            );
            self.send(&frame)?;
        }
        if !tail.is_empty() {
            let frame = Self::batch_frame(DEVICE_B, 0, tail);
            self.send(&frame)?;
        }
        Ok(())
    }

    fn batch_frame(device: u8, first_local: u8, pulse_widths: &[i32]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(5 + pulse_widths.len() * 2);
        frame.extend_from_slice(&[
            SYNC,
            device,
            CMD_SET_MULTIPLE,
            pulse_widths.len() as u8,
            first_local,
        ]);
        for &pw in pulse_widths {
            let [lo, hi] = split_7bit((pw * 4) as u16);
            frame.push(lo);
            frame.push(hi);
        }
        frame
    }

    /// Query one servo's position in raw device units.
    ///
    /// Returns `Ok(None)` on a short or desynchronized reply; stale bytes
    /// are discarded so the next query starts clean.
    pub fn get_position(&mut self, channel: u8) -> Result<Option<i32>> {
        check_channel(channel).map_err(SpiderError::Protocol)?;
        let frame = [
            SYNC,
            device_for(channel),
            CMD_GET_POSITION,
            local_channel_for(channel),
        ];
        self.send(&frame)?;

        let Some(lo) = self.recv_byte()? else {
            self.discard_input()?;
            return Ok(None);
        };
        let Some(hi) = self.recv_byte()? else {
            self.discard_input()?;
            return Ok(None);
        };
        // Replies are plain 8-bit little-endian, unlike command payloads.
        if hi > POSITION_HIGH_MAX {
            self.discard_input()?;
            return Ok(None);
        }
        let quarter_us = i32::from(lo) | (i32::from(hi) << 8);
        Ok(Some(quarter_us / 4))
    }

    /// True when either controller reports servos still in motion.
    ///
    /// A short reply from one device counts as "not moving" for that
    /// device rather than an error; motion polling must stay best-effort.
    pub fn get_moving(&mut self) -> Result<bool> {
        for device in [DEVICE_A, DEVICE_B] {
            self.send(&[SYNC, device, CMD_GET_MOVING])?;
            if let Some(b) = self.recv_byte()? {
                if b != 0 {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Send both controllers to their configured home positions.
    pub fn go_home(&mut self) -> Result<()> {
        for device in [DEVICE_A, DEVICE_B] {
            self.send(&[SYNC, device, CMD_GO_HOME])?;
        }
        Ok(())
    }

    /// Read and clear one controller's error register.
    ///
    /// `device_index` selects controller A (0) or B (1). A short reply
    /// yields `Ok(None)`.
    pub fn get_errors(&mut self, device_index: u8) -> Result<Option<u16>> {
        let device = if device_index == 0 { DEVICE_A } else { DEVICE_B };
        self.send(&[SYNC, device, CMD_GET_ERRORS])?;
        let (Some(lo), Some(hi)) = (self.recv_byte()?, self.recv_byte()?) else {
            tracing::warn!(device, "short reply to error-register query");
            self.discard_input()?;
            return Ok(None);
        };
        Ok(Some(u16::from(lo) | (u16::from(hi) << 8)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_partition_recombines() {
        for c in 0..CHANNELS {
            let device = device_for(c);
            let local = local_channel_for(c);
            assert!(local < CHANNELS_PER_DEVICE);
            let recombined = if device == DEVICE_A {
                local
            } else {
                local + CHANNELS_PER_DEVICE
            };
            assert_eq!(recombined, c);
        }
        assert_eq!(device_for(11), DEVICE_A);
        assert_eq!(device_for(12), DEVICE_B);
    }

    #[test]
    fn split_7bit_reconstructs() {
        for v in [0u16, 1, 127, 128, 2944, 9088, 0x3FFF] {
            let [lo, hi] = split_7bit(v);
            assert!(lo < 0x80 && hi < 0x80);
            assert_eq!(u16::from(lo) | (u16::from(hi) << 7), v & 0x3FFF);
        }
    }
}
