#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core spider control logic (hardware-agnostic).
//!
//! This crate drives two daisy-chained servo controllers as one logical
//! 24-channel device and arbitrates robot behavior from fused sensor input.
//! All hardware interactions go through the `spider_traits` capability
//! traits.
//!
//! ## Architecture
//!
//! - **Protocol**: binary frame codec for the chained controllers (`protocol`)
//! - **Poses**: named 24-joint poses and the safe-route graph (`pose`)
//! - **Kinematics**: duration/distance to speed/accel conversion (`kinematics`)
//! - **Engine**: pose transitions and scripted animations (`engine`)
//! - **Fusion**: median-filtered proxemic distance sensing (`fusion`)
//! - **Behavior**: the Idle/Reactive/Breathing mode state machine (`behavior`)

pub mod behavior;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod hw_error;
pub mod kinematics;
pub mod mocks;
pub mod pose;
pub mod protocol;
pub mod script;
pub mod worker;

pub use behavior::{BehaviorController, Mode};
pub use engine::{AnimationEngine, EngineCfg, PlayOutcome};
pub use error::{ProtocolError, Result, SpiderError};
pub use fusion::{ProxemicReading, ProximityFusion, Zone};
pub use kinematics::time_to_speed_accel;
pub use pose::{Pose, PoseTable, FALLBACK_POSE};
pub use protocol::ServoLink;
pub use script::{builtin_scripts, AnimationScript, Step};
