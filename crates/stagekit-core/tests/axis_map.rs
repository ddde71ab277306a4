use proptest::prelude::*;
use stagekit_core::{AxisBinding, AxisMap, ConfigurationError, LogicalAxis, PhysicalAxis};

fn physical_axis() -> impl Strategy<Value = PhysicalAxis> {
    prop_oneof![
        Just(PhysicalAxis::X),
        Just(PhysicalAxis::Y),
        Just(PhysicalAxis::Z)
    ]
}

fn binding() -> impl Strategy<Value = AxisBinding> {
    (physical_axis(), any::<bool>()).prop_map(|(physical, inverted)| AxisBinding {
        physical,
        inverted,
    })
}

proptest! {
    #[test]
    fn accepted_maps_are_bijective(bx in binding(), by in binding(), bz in binding()) {
        let result = AxisMap::new([
            (LogicalAxis::X, bx),
            (LogicalAxis::Y, by),
            (LogicalAxis::Z, bz),
        ]);

        match result {
            Ok(map) => {
                let letters: Vec<PhysicalAxis> = LogicalAxis::ALL
                    .iter()
                    .map(|axis| map.translate(*axis, 1.0).unwrap().0)
                    .collect();
                prop_assert_ne!(letters[0], letters[1]);
                prop_assert_ne!(letters[0], letters[2]);
                prop_assert_ne!(letters[1], letters[2]);
            }
            Err(err) => {
                let collides = bx.physical == by.physical
                    || bx.physical == bz.physical
                    || by.physical == bz.physical;
                prop_assert!(collides);
                let is_duplicate = matches!(err, ConfigurationError::DuplicatePhysicalAxis { .. });
                prop_assert!(is_duplicate);
            }
        }
    }

    #[test]
    fn inversion_only_flips_sign(value in -1000.0f64..1000.0, inverted in any::<bool>()) {
        let map = AxisMap::new([(
            LogicalAxis::Z,
            AxisBinding { physical: PhysicalAxis::X, inverted },
        )])
        .unwrap();

        let (letter, wire) = map.translate(LogicalAxis::Z, value).unwrap();
        prop_assert_eq!(letter, PhysicalAxis::X);
        prop_assert_eq!(wire, if inverted { -value } else { value });
    }
}

#[test]
fn test_axis_map_from_json() {
    let map: AxisMap = serde_json::from_str(
        r#"{"X":{"physical":"Y"},"Y":{"physical":"X","inverted":true},"Z":{"physical":"Z"}}"#,
    )
    .unwrap();

    assert_eq!(map.physical(LogicalAxis::X).unwrap(), PhysicalAxis::Y);
    assert_eq!(
        map.translate(LogicalAxis::Y, 4.0).unwrap(),
        (PhysicalAxis::X, -4.0)
    );
}

#[test]
fn test_axis_map_from_json_rejects_collision() {
    let result: Result<AxisMap, _> =
        serde_json::from_str(r#"{"X":{"physical":"Z"},"Z":{"physical":"Z"}}"#);
    assert!(result.is_err());
}
