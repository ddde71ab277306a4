//! Logical and physical axis model
//!
//! The operator thinks in terms of logical axes (the head moving left/right,
//! the carriage moving front/back, the tool moving up/down). The motion
//! controller only understands its own wire letters, and on several rigs the
//! stepper wiring does not line up with the logical layout. [`AxisMap`] is the
//! translation table between the two, with an optional sign inversion per axis.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Axis as understood by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogicalAxis {
    /// Left/right
    X,
    /// Front/back
    Y,
    /// Up/down
    Z,
}

impl LogicalAxis {
    /// All logical axes in canonical order
    pub const ALL: [LogicalAxis; 3] = [LogicalAxis::X, LogicalAxis::Y, LogicalAxis::Z];

    /// Single-letter name
    pub fn letter(self) -> char {
        match self {
            Self::X => 'X',
            Self::Y => 'Y',
            Self::Z => 'Z',
        }
    }
}

impl fmt::Display for LogicalAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for LogicalAxis {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "X" => Ok(Self::X),
            "Y" => Ok(Self::Y),
            "Z" => Ok(Self::Z),
            _ => Err(ConfigurationError::UnknownAxis {
                name: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for LogicalAxis {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LogicalAxis> for String {
    fn from(axis: LogicalAxis) -> Self {
        axis.letter().to_string()
    }
}

/// Axis letter accepted by the controller firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PhysicalAxis {
    /// Wire letter `X`
    X,
    /// Wire letter `Y`
    Y,
    /// Wire letter `Z`
    Z,
}

impl PhysicalAxis {
    /// Wire letter
    pub fn letter(self) -> char {
        match self {
            Self::X => 'X',
            Self::Y => 'Y',
            Self::Z => 'Z',
        }
    }
}

impl fmt::Display for PhysicalAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for PhysicalAxis {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "X" => Ok(Self::X),
            "Y" => Ok(Self::Y),
            "Z" => Ok(Self::Z),
            _ => Err(ConfigurationError::UnknownAxis {
                name: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for PhysicalAxis {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PhysicalAxis> for String {
    fn from(axis: PhysicalAxis) -> Self {
        axis.letter().to_string()
    }
}

/// Where one logical axis lands on the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisBinding {
    /// Wire letter driving this axis
    pub physical: PhysicalAxis,
    /// Negate target values before they reach the wire
    #[serde(default)]
    pub inverted: bool,
}

impl AxisBinding {
    /// Straight binding without inversion
    pub fn to(physical: PhysicalAxis) -> Self {
        Self {
            physical,
            inverted: false,
        }
    }

    /// Binding with the direction reversed
    pub fn inverted(physical: PhysicalAxis) -> Self {
        Self {
            physical,
            inverted: true,
        }
    }
}

/// Translation table from logical axes to controller wire letters
///
/// Construction guarantees that no two logical axes share a physical letter,
/// so independent motions can never merge on the wire. A logical axis may be
/// left unbound on rigs that do not have it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<LogicalAxis, AxisBinding>",
    into = "BTreeMap<LogicalAxis, AxisBinding>"
)]
pub struct AxisMap {
    bindings: BTreeMap<LogicalAxis, AxisBinding>,
}

impl AxisMap {
    /// Build a map, rejecting duplicate physical letters
    pub fn new(
        bindings: impl IntoIterator<Item = (LogicalAxis, AxisBinding)>,
    ) -> Result<Self, ConfigurationError> {
        let mut map: BTreeMap<LogicalAxis, AxisBinding> = BTreeMap::new();
        for (logical, binding) in bindings {
            if let Some((other, _)) = map
                .iter()
                .find(|(l, b)| **l != logical && b.physical == binding.physical)
            {
                tracing::warn!(
                    "Axis map binds {} and {} to physical {}",
                    other,
                    logical,
                    binding.physical
                );
                return Err(ConfigurationError::DuplicatePhysicalAxis {
                    physical: binding.physical,
                    first: *other,
                    second: logical,
                });
            }
            map.insert(logical, binding);
        }
        Ok(Self { bindings: map })
    }

    /// X→X, Y→Y, Z→Z with no inversion
    pub fn identity() -> Self {
        Self {
            bindings: BTreeMap::from([
                (LogicalAxis::X, AxisBinding::to(PhysicalAxis::X)),
                (LogicalAxis::Y, AxisBinding::to(PhysicalAxis::Y)),
                (LogicalAxis::Z, AxisBinding::to(PhysicalAxis::Z)),
            ]),
        }
    }

    /// Binding for a logical axis, if any
    pub fn binding(&self, logical: LogicalAxis) -> Option<AxisBinding> {
        self.bindings.get(&logical).copied()
    }

    /// Physical letter for a logical axis
    pub fn physical(&self, logical: LogicalAxis) -> Result<PhysicalAxis, ConfigurationError> {
        self.binding(logical)
            .map(|b| b.physical)
            .ok_or(ConfigurationError::UnmappedAxis { axis: logical })
    }

    /// Translate a logical target into its wire letter and wire value
    pub fn translate(
        &self,
        logical: LogicalAxis,
        value: f64,
    ) -> Result<(PhysicalAxis, f64), ConfigurationError> {
        let binding = self
            .binding(logical)
            .ok_or(ConfigurationError::UnmappedAxis { axis: logical })?;
        let value = if binding.inverted { -value } else { value };
        Ok((binding.physical, value))
    }

    /// Logical axes that have a binding
    pub fn logical_axes(&self) -> impl Iterator<Item = LogicalAxis> + '_ {
        self.bindings.keys().copied()
    }
}

impl Default for AxisMap {
    fn default() -> Self {
        Self::identity()
    }
}

impl TryFrom<BTreeMap<LogicalAxis, AxisBinding>> for AxisMap {
    type Error = ConfigurationError;

    fn try_from(value: BTreeMap<LogicalAxis, AxisBinding>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AxisMap> for BTreeMap<LogicalAxis, AxisBinding> {
    fn from(map: AxisMap) -> Self {
        map.bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_translation() {
        let map = AxisMap::identity();
        assert_eq!(
            map.translate(LogicalAxis::Y, 12.5).unwrap(),
            (PhysicalAxis::Y, 12.5)
        );
    }

    #[test]
    fn test_swapped_and_inverted() {
        let map = AxisMap::new([
            (LogicalAxis::X, AxisBinding::to(PhysicalAxis::Y)),
            (LogicalAxis::Y, AxisBinding::inverted(PhysicalAxis::X)),
        ])
        .unwrap();

        assert_eq!(
            map.translate(LogicalAxis::X, 5.0).unwrap(),
            (PhysicalAxis::Y, 5.0)
        );
        assert_eq!(
            map.translate(LogicalAxis::Y, 5.0).unwrap(),
            (PhysicalAxis::X, -5.0)
        );
    }

    #[test]
    fn test_duplicate_physical_rejected() {
        let err = AxisMap::new([
            (LogicalAxis::X, AxisBinding::to(PhysicalAxis::Z)),
            (LogicalAxis::Z, AxisBinding::to(PhysicalAxis::Z)),
        ])
        .unwrap_err();

        assert!(matches!(
            err,
            ConfigurationError::DuplicatePhysicalAxis {
                physical: PhysicalAxis::Z,
                ..
            }
        ));
    }

    #[test]
    fn test_rebinding_same_logical_axis_replaces() {
        let map = AxisMap::new([
            (LogicalAxis::X, AxisBinding::to(PhysicalAxis::X)),
            (LogicalAxis::X, AxisBinding::inverted(PhysicalAxis::X)),
        ])
        .unwrap();
        assert_eq!(
            map.translate(LogicalAxis::X, 1.0).unwrap(),
            (PhysicalAxis::X, -1.0)
        );
    }

    #[test]
    fn test_unmapped_axis() {
        let map = AxisMap::new([(LogicalAxis::X, AxisBinding::to(PhysicalAxis::X))]).unwrap();
        assert!(matches!(
            map.translate(LogicalAxis::Z, 1.0),
            Err(ConfigurationError::UnmappedAxis {
                axis: LogicalAxis::Z
            })
        ));
    }

    #[test]
    fn test_parse_axis_letters() {
        assert_eq!("y".parse::<LogicalAxis>().unwrap(), LogicalAxis::Y);
        assert_eq!(" Z ".parse::<PhysicalAxis>().unwrap(), PhysicalAxis::Z);
        assert!(matches!(
            "E".parse::<LogicalAxis>(),
            Err(ConfigurationError::UnknownAxis { .. })
        ));
    }
}
