//! I2C light strip controller.
//!
//! The strip is driven by a small coprocessor that accepts two commands:
//! all off, and light one zone in a solid color.

use spider_traits::LightStrip;

use crate::error::{HwError, Result};

const CMD_OFF: u8 = 0;
const CMD_ZONE_COLOR: u8 = 1;

pub struct I2cLightStrip {
    i2c: rppal::i2c::I2c,
}

impl I2cLightStrip {
    pub fn open(address: u16) -> Result<Self> {
        let mut i2c = rppal::i2c::I2c::new().map_err(|e| HwError::I2c(e.to_string()))?;
        i2c.set_slave_address(address)
            .map_err(|e| HwError::I2c(e.to_string()))?;
        Ok(Self { i2c })
    }

    fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.i2c
            .write(payload)
            .map_err(|e| HwError::I2c(e.to_string()))?;
        Ok(())
    }
}

impl LightStrip for I2cLightStrip {
    fn set_zone_color(
        &mut self,
        zone: u8,
        rgb: [u8; 3],
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.send(&[CMD_ZONE_COLOR, zone, rgb[0], rgb[1], rgb[2]])?;
        Ok(())
    }

    fn set_off(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.send(&[CMD_OFF])?;
        Ok(())
    }
}
