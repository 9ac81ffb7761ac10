//! Scriptable capability implementations for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use spider_traits::{Button, DistanceSensor, LightStrip, RespirationSensor, Transport};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Transport that records every write and replays queued response bytes.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    reads: Arc<Mutex<VecDeque<u8>>>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes to be returned by subsequent `read_byte` calls.
    pub fn push_read(&self, bytes: &[u8]) {
        if let Ok(mut reads) = self.reads.lock() {
            reads.extend(bytes.iter().copied());
        }
    }

    /// Every `write` call so far, one entry per call.
    #[must_use]
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// Written frames whose command byte matches, across all writes.
    #[must_use]
    pub fn frames_with_command(&self, command: u8) -> Vec<Vec<u8>> {
        self.writes()
            .into_iter()
            .filter(|f| f.len() > 2 && f[2] == command)
            .collect()
    }
}

impl Transport for MockTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        self.writes
            .lock()
            .map_err(|_| "mock transport poisoned".to_string())?
            .push(bytes.to_vec());
        Ok(())
    }

    fn read_byte(&mut self, _timeout: Duration) -> Result<Option<u8>, BoxError> {
        Ok(self
            .reads
            .lock()
            .map_err(|_| "mock transport poisoned".to_string())?
            .pop_front())
    }

    fn discard_input(&mut self) -> Result<(), BoxError> {
        self.reads
            .lock()
            .map_err(|_| "mock transport poisoned".to_string())?
            .clear();
        Ok(())
    }
}

/// Distance sensor replaying a per-call sequence; repeats the last value
/// once the sequence is exhausted.
#[derive(Debug, Clone, Default)]
pub struct MockDistance {
    values: Arc<Mutex<VecDeque<f32>>>,
    last: Arc<Mutex<f32>>,
}

impl MockDistance {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_values(&self, values: &[f32]) {
        if let Ok(mut v) = self.values.lock() {
            v.extend(values.iter().copied());
        }
    }
}

impl DistanceSensor for MockDistance {
    fn read_distance(&mut self, _channel: u8) -> Result<f32, BoxError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| "mock distance poisoned".to_string())?;
        let mut last = self
            .last
            .lock()
            .map_err(|_| "mock distance poisoned".to_string())?;
        if let Some(v) = values.pop_front() {
            *last = v;
        }
        Ok(*last)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockRespiration {
    volts: Arc<Mutex<f32>>,
}

impl MockRespiration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_volts(&self, v: f32) {
        if let Ok(mut volts) = self.volts.lock() {
            *volts = v;
        }
    }
}

impl RespirationSensor for MockRespiration {
    fn read_voltage(&mut self) -> Result<f32, BoxError> {
        Ok(self
            .volts
            .lock()
            .map(|v| *v)
            .map_err(|_| "mock respiration poisoned".to_string())?)
    }
}

/// Button whose pressed state is driven externally.
#[derive(Debug, Clone, Default)]
pub struct MockButton {
    pressed: Arc<std::sync::atomic::AtomicBool>,
}

impl MockButton {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn handle(&self) -> Arc<std::sync::atomic::AtomicBool> {
        Arc::clone(&self.pressed)
    }
}

impl Button for MockButton {
    fn is_pressed(&mut self) -> Result<bool, BoxError> {
        Ok(self.pressed.load(std::sync::atomic::Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightEvent {
    ZoneColor { zone: u8, rgb: [u8; 3] },
    Off,
}

#[derive(Debug, Clone, Default)]
pub struct MockLights {
    events: Arc<Mutex<Vec<LightEvent>>>,
}

impl MockLights {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<LightEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl LightStrip for MockLights {
    fn set_zone_color(&mut self, zone: u8, rgb: [u8; 3]) -> Result<(), BoxError> {
        if let Ok(mut events) = self.events.lock() {
            events.push(LightEvent::ZoneColor { zone, rgb });
        }
        Ok(())
    }

    fn set_off(&mut self) -> Result<(), BoxError> {
        if let Ok(mut events) = self.events.lock() {
            events.push(LightEvent::Off);
        }
        Ok(())
    }
}
