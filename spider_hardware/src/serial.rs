//! Serial link to the servo controller chain.

use std::io::Read;
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};
use spider_traits::Transport;

use crate::error::{HwError, Result};

/// Serial port carrying the framed servo protocol.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    /// Open `path` at `baud`, 8N1.
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        let port = serialport::new(path, baud)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| HwError::Serial(format!("open {path}: {e}")))?;
        tracing::info!(path, baud, "serial link open");
        Ok(Self { port })
    }
}

impl Transport for SerialLink {
    fn write(&mut self, bytes: &[u8]) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        std::io::Write::write_all(&mut self.port, bytes).map_err(HwError::Io)?;
        self.port.flush().map_err(HwError::Io)?;
        Ok(())
    }

    fn read_byte(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Option<u8>, Box<dyn std::error::Error + Send + Sync>> {
        self.port
            .set_timeout(timeout)
            .map_err(|e| HwError::Serial(e.to_string()))?;
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(HwError::Io(e).into()),
        }
    }

    fn discard_input(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| HwError::Serial(e.to_string()))?;
        Ok(())
    }
}
