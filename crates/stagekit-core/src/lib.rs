//! # StageKit Core
//!
//! Core types shared by every StageKit crate:
//! - the logical/physical axis model and the per-rig [`AxisMap`]
//! - [`MotionRequest`], the caller-facing description of a move
//! - the error taxonomy used across the protocol boundary

pub mod axis;
pub mod error;
pub mod motion;

pub use axis::{AxisBinding, AxisMap, LogicalAxis, PhysicalAxis};
pub use error::{ConfigurationError, Error, FailureKind, ProtocolError, ProtocolResult, Result};
pub use motion::{format_number, validate_feedrate, CommandClass, MotionMode, MotionRequest};
