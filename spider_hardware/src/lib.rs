#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![deny(clippy::all)]
#![warn(clippy::pedantic, clippy::nursery)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

//! Hardware backends for the spider: serial link to the servo controllers,
//! the shared ADC bus, the light strip, and simulated stand-ins for all of
//! them so the rest of the stack runs without a robot attached.

pub mod adc;
pub mod error;
pub mod sim;

#[cfg(feature = "hardware")]
pub mod serial;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod light;

pub use adc::{AdcBus, AdcButton, AdcRangefinders, RawAdc, RespirationBelt, SimulatedAdc};
pub use error::{HwError, Result};
pub use sim::{SimulatedLightStrip, SimulatedServos};
