//! Built-in rig presets
//!
//! One preset per known rig variant. They differ only in axis wiring,
//! issuance strategy and controller profile.

use crate::config::RigConfig;
use crate::error::ConfigError;
use stagekit_communication::{
    ConnectionParams, EngineConfig, IssueStrategy, PickupConfig, PickupOrder, ProfileSettings,
};
use stagekit_core::{AxisBinding, AxisMap, LogicalAxis, MotionRequest, PhysicalAxis};
use std::collections::BTreeMap;

/// Names accepted by [`preset`]
pub const PRESET_NAMES: [&str; 3] = ["imager", "pen_plotter", "pick_and_place"];

/// Look up a preset by name
pub fn preset(name: &str) -> Result<RigConfig, ConfigError> {
    match name {
        "imager" => Ok(imager()),
        "pen_plotter" => pen_plotter(),
        "pick_and_place" => pick_and_place(),
        other => Err(ConfigError::UnknownPreset(other.to_string())),
    }
}

/// Camera rig: straight wiring, combined X/Y jogs, very high feed ceilings
pub fn imager() -> RigConfig {
    RigConfig {
        name: "imager".to_string(),
        connection: ConnectionParams::default(),
        axis_map: AxisMap::identity(),
        engine: EngineConfig {
            strategy: IssueStrategy::Combined,
            ..EngineConfig::default()
        },
        profile: ProfileSettings {
            max_feedrate: BTreeMap::from([
                (PhysicalAxis::X, 600_000.0),
                (PhysicalAxis::Y, 50_000.0),
                (PhysicalAxis::Z, 600_000.0),
            ]),
            ..ProfileSettings::default()
        },
    }
}

/// Pen plotter: the pen lift is wired to the controller's X channel and the
/// carriage to Y and Z
pub fn pen_plotter() -> Result<RigConfig, ConfigError> {
    let axis_map = AxisMap::new([
        (LogicalAxis::X, AxisBinding::to(PhysicalAxis::Y)),
        (LogicalAxis::Y, AxisBinding::to(PhysicalAxis::Z)),
        (LogicalAxis::Z, AxisBinding::inverted(PhysicalAxis::X)),
    ])?;

    Ok(RigConfig {
        name: "pen_plotter".to_string(),
        connection: ConnectionParams::default(),
        axis_map,
        engine: EngineConfig {
            strategy: IssueStrategy::PerAxis,
            default_feedrate: 2400.0,
            home_order: vec![PhysicalAxis::X, PhysicalAxis::Y, PhysicalAxis::Z],
            pickup: PickupConfig {
                retract_height: 5.0,
                order: PickupOrder::DescendFirst,
            },
            park: vec![
                MotionRequest::new().z(5.0).feedrate(1200.0),
                MotionRequest::new().x(0.0).y(0.0).feedrate(2400.0),
            ],
            ..EngineConfig::default()
        },
        profile: ProfileSettings {
            steps_per_unit: BTreeMap::from([
                (PhysicalAxis::X, 400.0),
                (PhysicalAxis::Y, 80.0),
                (PhysicalAxis::Z, 80.0),
            ]),
            max_acceleration: BTreeMap::from([
                (PhysicalAxis::X, 500.0),
                (PhysicalAxis::Y, 1500.0),
                (PhysicalAxis::Z, 1500.0),
            ]),
            fan_speed: Some(0),
            ..ProfileSettings::default()
        },
    })
}

/// Tile pick-and-place: swapped X/Y wiring, per-axis moves, retract first
pub fn pick_and_place() -> Result<RigConfig, ConfigError> {
    let axis_map = AxisMap::new([
        (LogicalAxis::X, AxisBinding::to(PhysicalAxis::Y)),
        (LogicalAxis::Y, AxisBinding::to(PhysicalAxis::X)),
        (LogicalAxis::Z, AxisBinding::to(PhysicalAxis::Z)),
    ])?;

    Ok(RigConfig {
        name: "pick_and_place".to_string(),
        connection: ConnectionParams::default(),
        axis_map,
        engine: EngineConfig {
            strategy: IssueStrategy::PerAxis,
            pickup: PickupConfig {
                retract_height: 100.0,
                order: PickupOrder::RetractFirst,
            },
            ..EngineConfig::default()
        },
        profile: ProfileSettings {
            max_acceleration: BTreeMap::from([
                (PhysicalAxis::X, 1000.0),
                (PhysicalAxis::Y, 1000.0),
                (PhysicalAxis::Z, 200.0),
            ]),
            motor_current_ma: BTreeMap::from([
                (PhysicalAxis::X, 800),
                (PhysicalAxis::Y, 800),
                (PhysicalAxis::Z, 600),
            ]),
            fan_speed: Some(255),
            ..ProfileSettings::default()
        },
    })
}
