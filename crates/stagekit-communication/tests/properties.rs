use proptest::prelude::*;
use stagekit_communication::{
    CommandFormatter, ControllerProfile, EngineConfig, IssueStrategy, ProtocolEngine,
    SimulatedTransport,
};
use stagekit_core::{AxisMap, ConfigurationError, LogicalAxis, MotionRequest};

fn axis() -> impl Strategy<Value = LogicalAxis> {
    prop_oneof![
        Just(LogicalAxis::X),
        Just(LogicalAxis::Y),
        Just(LogicalAxis::Z)
    ]
}

fn targets() -> impl Strategy<Value = Vec<(LogicalAxis, f64)>> {
    prop::collection::vec((axis(), -500.0f64..500.0), 1..4)
}

fn strategy() -> impl Strategy<Value = IssueStrategy> {
    prop_oneof![Just(IssueStrategy::PerAxis), Just(IssueStrategy::Combined)]
}

proptest! {
    #[test]
    fn override_feedrate_always_on_the_wire(
        targets in targets(),
        default_feedrate in 1.0f64..20_000.0,
        strategy in strategy(),
    ) {
        let formatter = CommandFormatter::new(AxisMap::identity(), strategy);
        let request = MotionRequest::from_targets(targets).feedrate(3000.0);

        let lines = formatter.format(&request, default_feedrate).unwrap();
        prop_assert!(!lines.is_empty());
        for line in &lines {
            prop_assert!(line.text().ends_with(" F3000"), "{}", line.text());
            prop_assert!(!line.text().contains(['\r', '\n']));
        }
    }

    #[test]
    fn per_axis_emits_one_line_per_axis(targets in targets()) {
        let request = MotionRequest::from_targets(targets);
        let formatter = CommandFormatter::new(AxisMap::identity(), IssueStrategy::PerAxis);

        let lines = formatter.format(&request, 3000.0).unwrap();
        prop_assert_eq!(lines.len(), request.targets.len());
    }

    #[test]
    fn engine_default_feedrate_used_without_override(
        targets in targets(),
        default_feedrate in 1u32..20_000,
    ) {
        let transport = SimulatedTransport::acknowledging();
        let log = transport.sent_log();
        let mut engine =
            ProtocolEngine::new(transport, AxisMap::identity(), EngineConfig::default()).unwrap();
        engine.connect(&ControllerProfile::empty()).unwrap();
        engine.set_default_feedrate(f64::from(default_feedrate)).unwrap();

        engine.jog(targets, None).unwrap();
        let expected = format!(" F{}", default_feedrate);
        for line in log.matching("G0") {
            prop_assert!(line.ends_with(&expected), "{}", line);
        }
    }

    #[test]
    fn bad_feedrate_is_rejected_before_transmission(
        targets in targets(),
        feedrate in prop_oneof![Just(0.0f64), Just(f64::NAN), Just(f64::INFINITY), -1e6f64..0.0],
    ) {
        let transport = SimulatedTransport::acknowledging();
        let log = transport.sent_log();
        let mut engine =
            ProtocolEngine::new(transport, AxisMap::identity(), EngineConfig::default()).unwrap();
        engine.connect(&ControllerProfile::empty()).unwrap();

        let err = engine.jog(targets, Some(feedrate)).unwrap_err();
        let rejected = matches!(
            err,
            stagekit_core::ProtocolError::Configuration(ConfigurationError::InvalidFeedrate { .. })
        );
        prop_assert!(rejected, "unexpected error: {}", err);
        prop_assert!(log.is_empty());
    }
}
