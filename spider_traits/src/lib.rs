pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Byte-stream transport to the daisy-chained servo controllers.
///
/// Implementations must preserve byte order and must not reorder writes.
pub trait Transport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Read one byte, waiting up to `timeout`. `Ok(None)` means the byte
    /// never arrived; that is not an error at this layer.
    fn read_byte(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Option<u8>, Box<dyn std::error::Error + Send + Sync>>;

    /// Drop any unread bytes on the line (stale query responses).
    fn discard_input(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

pub trait DistanceSensor {
    /// Blocking read of a calibrated distance (cm) from one ADC channel.
    fn read_distance(
        &mut self,
        channel: u8,
    ) -> Result<f32, Box<dyn std::error::Error + Send + Sync>>;
}

pub trait RespirationSensor {
    /// Blocking read of the respiration belt voltage (volts).
    fn read_voltage(&mut self) -> Result<f32, Box<dyn std::error::Error + Send + Sync>>;
}

pub trait Button {
    /// Current (unlatched) pressed state; debouncing is the caller's job.
    fn is_pressed(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
}

pub trait LightStrip {
    fn set_zone_color(
        &mut self,
        zone: u8,
        rgb: [u8; 3],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn set_off(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

// Boxed trait objects forward to the inner implementation, so callers can
// pick a backend at runtime and still use the generic APIs.

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).write(bytes)
    }

    fn read_byte(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Option<u8>, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_byte(timeout)
    }

    fn discard_input(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).discard_input()
    }
}

impl<T: DistanceSensor + ?Sized> DistanceSensor for Box<T> {
    fn read_distance(
        &mut self,
        channel: u8,
    ) -> Result<f32, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_distance(channel)
    }
}

impl<T: RespirationSensor + ?Sized> RespirationSensor for Box<T> {
    fn read_voltage(&mut self) -> Result<f32, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_voltage()
    }
}

impl<T: Button + ?Sized> Button for Box<T> {
    fn is_pressed(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        (**self).is_pressed()
    }
}

impl<T: LightStrip + ?Sized> LightStrip for Box<T> {
    fn set_zone_color(
        &mut self,
        zone: u8,
        rgb: [u8; 3],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_zone_color(zone, rgb)
    }

    fn set_off(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_off()
    }
}
