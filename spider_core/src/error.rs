use thiserror::Error;

/// Frame construction failures, rejected before anything hits the wire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("pulse width {value} outside safe bounds [{min}, {max}] on channel {channel}")]
    OutOfRange {
        channel: u8,
        value: i32,
        min: i32,
        max: i32,
    },
    #[error("batch of {count} targets starting at channel {first} exceeds 24 channels")]
    TooManyTargets { first: u8, count: usize },
    #[error("no such channel: {0}")]
    BadChannel(u8),
}

#[derive(Debug, Error)]
pub enum SpiderError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("zero-duration motion request")]
    ZeroDuration,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("sensor error: {0}")]
    Sensor(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
