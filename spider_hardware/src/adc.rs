//! ADC access shared by the proximity, respiration, and button inputs.
//!
//! The three inputs live on one physical converter, so every full
//! configure-then-read exchange is serialized behind a single mutex
//! (`AdcBus`). The lock is held for the whole exchange and released on every
//! exit path, including errors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use spider_traits::{Button, DistanceSensor, RespirationSensor};

use crate::error::{HwError, Result};

/// One single-ended conversion in millivolts.
pub trait RawAdc {
    fn read_single_ended(&mut self, channel: u8) -> Result<f32>;
}

/// Clonable handle to the shared converter.
pub struct AdcBus<A: RawAdc> {
    inner: Arc<Mutex<A>>,
}

impl<A: RawAdc> Clone for AdcBus<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: RawAdc> AdcBus<A> {
    pub fn new(adc: A) -> Self {
        Self {
            inner: Arc::new(Mutex::new(adc)),
        }
    }

    /// Run one command-response exchange under the bus lock.
    pub fn read_millivolts(&self, channel: u8) -> Result<f32> {
        let mut adc = self
            .inner
            .lock()
            .map_err(|_| HwError::Adc("adc bus lock poisoned".into()))?;
        adc.read_single_ended(channel)
    }
}

/// Analog rangefinder pair read through the shared bus.
///
/// Converts millivolts to centimeters the way the sensors are wired:
/// `cm = mv * 1024 / (1000 * supply_volts)`.
pub struct AdcRangefinders<A: RawAdc> {
    bus: AdcBus<A>,
    supply_volts: f32,
}

impl<A: RawAdc> AdcRangefinders<A> {
    pub fn new(bus: AdcBus<A>, supply_volts: f32) -> Self {
        Self { bus, supply_volts }
    }
}

impl<A: RawAdc> DistanceSensor for AdcRangefinders<A> {
    fn read_distance(
        &mut self,
        channel: u8,
    ) -> std::result::Result<f32, Box<dyn std::error::Error + Send + Sync>> {
        let mv = self.bus.read_millivolts(channel)?;
        Ok((mv * 1024.0 / (1000.0 * self.supply_volts)).round())
    }
}

/// Respiration belt voltage on one ADC channel.
pub struct RespirationBelt<A: RawAdc> {
    bus: AdcBus<A>,
    channel: u8,
}

impl<A: RawAdc> RespirationBelt<A> {
    pub fn new(bus: AdcBus<A>, channel: u8) -> Self {
        Self { bus, channel }
    }
}

impl<A: RawAdc> RespirationSensor for RespirationBelt<A> {
    fn read_voltage(
        &mut self,
    ) -> std::result::Result<f32, Box<dyn std::error::Error + Send + Sync>> {
        let mv = self.bus.read_millivolts(self.channel)?;
        Ok(mv / 1000.0)
    }
}

/// Pushbutton wired to an ADC channel; pressed pulls the reading low.
pub struct AdcButton<A: RawAdc> {
    bus: AdcBus<A>,
    channel: u8,
    threshold_mv: f32,
}

impl<A: RawAdc> AdcButton<A> {
    pub fn new(bus: AdcBus<A>, channel: u8, threshold_mv: f32) -> Self {
        Self {
            bus,
            channel,
            threshold_mv,
        }
    }
}

impl<A: RawAdc> Button for AdcButton<A> {
    fn is_pressed(
        &mut self,
    ) -> std::result::Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mv = self.bus.read_millivolts(self.channel)?;
        Ok(mv < self.threshold_mv)
    }
}

/// In-memory ADC whose per-channel values can be set from another thread.
#[derive(Clone, Default)]
pub struct SimulatedAdc {
    values: Arc<Mutex<HashMap<u8, f32>>>,
}

impl SimulatedAdc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for driving channel values from a test or simulator loop.
    pub fn values(&self) -> Arc<Mutex<HashMap<u8, f32>>> {
        Arc::clone(&self.values)
    }

    pub fn set_millivolts(&self, channel: u8, mv: f32) {
        if let Ok(mut v) = self.values.lock() {
            v.insert(channel, mv);
        }
    }
}

impl RawAdc for SimulatedAdc {
    fn read_single_ended(&mut self, channel: u8) -> Result<f32> {
        let v = self
            .values
            .lock()
            .map_err(|_| HwError::Adc("simulated adc lock poisoned".into()))?;
        Ok(v.get(&channel).copied().unwrap_or(0.0))
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod ads1115 {
    //! Minimal single-shot driver for the ADS1115 used on the robot.

    use super::RawAdc;
    use crate::error::{HwError, Result};
    use std::time::Duration;

    const CONVERSION_REG: u8 = 0x00;
    const CONFIG_REG: u8 = 0x01;
    // Single-shot start, ±6.144 V range, 860 SPS, comparator disabled.
    const CONFIG_BASE: u16 = 0x8000 | 0x0000 | 0x00E0 | 0x0003;
    const MV_PER_COUNT: f32 = 6144.0 / 32768.0;

    pub struct Ads1115 {
        i2c: rppal::i2c::I2c,
    }

    impl Ads1115 {
        pub fn open(address: u16) -> Result<Self> {
            let mut i2c = rppal::i2c::I2c::new().map_err(|e| HwError::I2c(e.to_string()))?;
            i2c.set_slave_address(address)
                .map_err(|e| HwError::I2c(e.to_string()))?;
            Ok(Self { i2c })
        }
    }

    impl RawAdc for Ads1115 {
        fn read_single_ended(&mut self, channel: u8) -> Result<f32> {
            if channel > 3 {
                return Err(HwError::Adc(format!("ads1115 has no channel {channel}")));
            }
            let mux = 0x4000 | (u16::from(channel) << 12);
            let config = CONFIG_BASE | mux;
            self.i2c
                .block_write(CONFIG_REG, &config.to_be_bytes())
                .map_err(|e| HwError::I2c(e.to_string()))?;
            // 860 SPS conversion plus margin.
            std::thread::sleep(Duration::from_micros(1500));
            let mut buf = [0u8; 2];
            self.i2c
                .block_read(CONVERSION_REG, &mut buf)
                .map_err(|e| HwError::I2c(e.to_string()))?;
            let counts = i16::from_be_bytes(buf);
            Ok(f32::from(counts.max(0)) * MV_PER_COUNT)
        }
    }
}
