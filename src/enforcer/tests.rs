use super::*;
use crate::config::DiffusionConfig;
use crate::connector::GroundState;
use crate::observer::PointDump;
use crate::topology::{MapNodeId, RoadId, RoadNetwork, RoadSegment};
use rstest::rstest;

fn enforcer(strategy: EnforcerKind) -> Box<dyn EleConstraintEnforcer> {
    let config = EnforcerConfig {
        strategy,
        ..EnforcerConfig::default()
    };
    build_enforcer(&config).unwrap()
}

fn ele(enforcer: &dyn EleConstraintEnforcer, id: ConnectorId) -> f64 {
    enforcer.registry().get(id).unwrap().ele()
}

/// Two junctions 2 apart, one on a bridge, with two-point lanes on both sides.
fn straight_road(
    enforcer: &mut dyn EleConstraintEnforcer,
) -> (RoadNetwork, [ConnectorId; 2], Vec<ConnectorId>, Vec<ConnectorId>) {
    let ids = enforcer
        .add_connectors(vec![
            Connector::new(0.0, 10.0, 0.0, GroundState::Above).with_reference(MapNodeId(1)),
            Connector::new(2.0, 10.0, 0.0, GroundState::OnGround).with_reference(MapNodeId(2)),
            Connector::new(0.0, 10.0, 1.5, GroundState::OnGround),
            Connector::new(2.0, 10.0, 1.5, GroundState::OnGround),
            Connector::new(0.0, 10.0, -1.5, GroundState::OnGround),
            Connector::new(2.0, 10.0, -1.5, GroundState::OnGround),
        ])
        .unwrap();
    let left = vec![ids[2], ids[3]];
    let right = vec![ids[4], ids[5]];

    let mut network = RoadNetwork::new();
    network.add_road(
        RoadSegment::new(RoadId(1), MapNodeId(1), MapNodeId(2))
            .with_lanes(left.clone(), right.clone()),
    );
    (network, [ids[0], ids[1]], left, right)
}

#[test]
fn test_straight_road_end_to_end() {
    let mut enforcer = enforcer(EnforcerKind::Diffusion);
    let (network, [bridge, ground], left, right) = straight_road(enforcer.as_mut());

    enforcer.enforce_constraints(&network).unwrap();

    assert_eq!(ele(enforcer.as_ref(), bridge), 15.0);
    assert!((ele(enforcer.as_ref(), ground) - 15.0).abs() < 1e-6);
    for lane in [&left, &right] {
        assert_eq!(ele(enforcer.as_ref(), lane[0]), ele(enforcer.as_ref(), bridge));
        assert_eq!(ele(enforcer.as_ref(), lane[1]), ele(enforcer.as_ref(), ground));
    }
}

#[test]
fn test_stiff_group_takes_mean_elevation() {
    let mut enforcer = enforcer(EnforcerKind::Diffusion);
    let ids = enforcer
        .add_connectors(vec![
            Connector::new(0.0, 2.0, 0.0, GroundState::OnGround),
            Connector::new(10.0, 4.0, 0.0, GroundState::OnGround),
            Connector::new(20.0, 6.0, 0.0, GroundState::OnGround),
        ])
        .unwrap();
    enforcer.require_same_ele(&ids).unwrap();
    enforcer.enforce_constraints(&RoadNetwork::new()).unwrap();

    for id in ids {
        assert_eq!(ele(enforcer.as_ref(), id), 4.0);
    }
}

#[test]
fn test_coincident_connectors_are_grouped() {
    let mut enforcer = enforcer(EnforcerKind::Diffusion);
    let ids = enforcer
        .add_connectors(vec![
            Connector::new(50.0, 1.0, 50.0, GroundState::OnGround),
            Connector::new(50.0, 3.0, 50.0, GroundState::OnGround),
            // same spot, but a bridge deck is not the road beneath it
            Connector::new(50.0, 0.0, 50.0, GroundState::Above),
        ])
        .unwrap();
    // a later batch still finds the earlier connectors, across a cell edge
    let late = enforcer
        .add_connectors(vec![
            Connector::new(99.9999995, 7.0, 0.0, GroundState::OnGround),
            Connector::new(100.0, 9.0, 0.0, GroundState::OnGround),
        ])
        .unwrap();

    enforcer.enforce_constraints(&RoadNetwork::new()).unwrap();

    assert_eq!(ele(enforcer.as_ref(), ids[0]), 2.0);
    assert_eq!(ele(enforcer.as_ref(), ids[1]), 2.0);
    assert_eq!(ele(enforcer.as_ref(), ids[2]), 5.0);
    assert_eq!(ele(enforcer.as_ref(), late[0]), 8.0);
    assert_eq!(ele(enforcer.as_ref(), late[1]), 8.0);
}

#[rstest]
#[case(EnforcerKind::None)]
#[case(EnforcerKind::Interpolated)]
#[case(EnforcerKind::Diffusion)]
fn test_declarations_rejected_after_enforce(#[case] strategy: EnforcerKind) {
    let mut enforcer = enforcer(strategy);
    let ids = enforcer
        .add_connectors(vec![Connector::on_ground(0.0, 0.0), Connector::on_ground(5.0, 0.0)])
        .unwrap();
    let network = RoadNetwork::new();
    enforcer.enforce_constraints(&network).unwrap();

    let already = Err(EnforcerError::AlreadyEnforced);
    assert_eq!(
        enforcer.add_connectors(vec![Connector::on_ground(1.0, 1.0)]).map(|_| ()),
        already
    );
    assert_eq!(enforcer.require_same_ele(&ids), already);
    assert_eq!(enforcer.require_smoothness(ids[0], ids[1], ids[0]), already);
    assert_eq!(enforcer.enforce_constraints(&network), already);
    assert_eq!(enforcer.registry().len(), 2);
}

#[rstest]
#[case(EnforcerKind::None)]
#[case(EnforcerKind::Interpolated)]
#[case(EnforcerKind::Diffusion)]
fn test_unknown_connectors_rejected(#[case] strategy: EnforcerKind) {
    let mut enforcer = enforcer(strategy);
    let ids = enforcer.add_connectors(vec![Connector::on_ground(0.0, 0.0)]).unwrap();
    let ghost = ConnectorId(42);
    let unknown = Err(EnforcerError::UnknownConnector(ghost));

    assert_eq!(enforcer.require_same_ele(&[ids[0], ghost]), unknown);
    assert_eq!(
        enforcer.require_incline(ConstraintType::Max, 0.1, &[ids[0], ghost]),
        unknown
    );
    assert_eq!(
        enforcer.require_vertical_distance(ConstraintType::Min, 4.0, ghost, ids[0]),
        unknown
    );
}

#[test]
fn test_bad_topology_leaves_enforcer_open() {
    let mut enforcer = enforcer(EnforcerKind::Diffusion);
    enforcer
        .add_connectors(vec![
            Connector::on_ground(0.0, 0.0).with_reference(MapNodeId(1)),
            Connector::on_ground(9.0, 0.0).with_reference(MapNodeId(2)),
        ])
        .unwrap();

    let mut broken = RoadNetwork::new();
    broken.add_road(
        RoadSegment::new(RoadId(1), MapNodeId(1), MapNodeId(2))
            .with_centerline(vec![ConnectorId(7)]),
    );
    assert_eq!(
        enforcer.enforce_constraints(&broken),
        Err(EnforcerError::UnknownConnector(ConnectorId(7)))
    );

    let mut fixed = RoadNetwork::new();
    fixed.add_road(RoadSegment::new(RoadId(1), MapNodeId(1), MapNodeId(2)));
    assert!(enforcer.enforce_constraints(&fixed).is_ok());
}

#[test]
fn test_vertical_distance_links_otherwise_isolated_connectors() {
    let mut enforcer = enforcer(EnforcerKind::Diffusion);
    let ids = enforcer
        .add_connectors(vec![
            Connector::new(0.0, 0.0, 0.0, GroundState::Above),
            Connector::new(1.0, 0.0, 0.0, GroundState::OnGround),
            Connector::new(30.0, 0.0, 0.0, GroundState::OnGround),
        ])
        .unwrap();
    enforcer
        .require_vertical_distance(ConstraintType::Exact, 5.0, ids[0], ids[1])
        .unwrap();
    enforcer.enforce_constraints(&RoadNetwork::new()).unwrap();

    assert!((ele(enforcer.as_ref(), ids[1]) - 5.0).abs() < 1e-6);
    assert_eq!(ele(enforcer.as_ref(), ids[2]), 0.0);
}

#[test]
fn test_none_strategy_keeps_terrain() {
    let mut enforcer = enforcer(EnforcerKind::None);
    let (network, [bridge, ground], _, _) = straight_road(enforcer.as_mut());
    enforcer.require_same_ele(&[bridge, ground]).unwrap();
    enforcer.enforce_constraints(&network).unwrap();

    let connectors = enforcer.into_connectors();
    assert_eq!(connectors.len(), 6);
    assert!(connectors.iter().all(|c| c.ele() == 10.0));
}

#[test]
fn test_interpolated_strategy_blends_along_road() {
    let mut enforcer = enforcer(EnforcerKind::Interpolated);
    let ids = enforcer
        .add_connectors(vec![
            Connector::new(0.0, 0.0, 0.0, GroundState::Above).with_reference(MapNodeId(1)),
            Connector::new(10.0, 0.0, 0.0, GroundState::OnGround).with_reference(MapNodeId(2)),
            Connector::on_ground(5.0, 0.0),
            Connector::on_ground(0.0, 2.0),
            Connector::on_ground(2.0, 2.0),
            Connector::on_ground(10.0, 2.0),
        ])
        .unwrap();

    let mut network = RoadNetwork::new();
    network.add_road(
        RoadSegment::new(RoadId(1), MapNodeId(1), MapNodeId(2))
            .with_centerline(vec![ids[2]])
            .with_lanes(vec![ids[3], ids[4], ids[5]], vec![]),
    );
    enforcer.enforce_constraints(&network).unwrap();

    let heights: Vec<f64> = ids.iter().map(|&id| ele(enforcer.as_ref(), id)).collect();
    assert_eq!(heights, vec![5.0, 0.0, 2.5, 5.0, 4.0, 0.0]);
}

#[test]
fn test_unsubdivided_centerline_is_interpolated_after_solve() {
    let config = EnforcerConfig {
        diffusion: DiffusionConfig {
            subdivide_centerlines: false,
            ..DiffusionConfig::default()
        },
        ..EnforcerConfig::default()
    };
    let mut enforcer = build_enforcer(&config).unwrap();
    let ids = enforcer
        .add_connectors(vec![
            Connector::new(0.0, 0.0, 0.0, GroundState::Above).with_reference(MapNodeId(1)),
            Connector::new(20.0, 0.0, 0.0, GroundState::Below).with_reference(MapNodeId(2)),
            Connector::on_ground(5.0, 0.0),
        ])
        .unwrap();

    let mut network = RoadNetwork::new();
    network.add_road(
        RoadSegment::new(RoadId(1), MapNodeId(1), MapNodeId(2)).with_centerline(vec![ids[2]]),
    );

    let mut dump = PointDump::new();
    enforcer.enforce_constraints_observed(&network, &mut dump).unwrap();

    // both junctions pinned, the quarter point gets 5 * 0.75 + -5 * 0.25
    assert_eq!(ele(enforcer.as_ref(), ids[2]), 2.5);
    let records = dump.records();
    assert_eq!(records.len(), 3);
    assert!(records[0].graph_node && records[1].graph_node);
    assert!(!records[2].graph_node);
    // no free graph node, so the first step already meets the tolerance
    assert_eq!(dump.steps(), 1);
    assert_eq!(dump.last_delta(), Some(0.0));
}

#[test]
fn test_build_enforcer_validates_config() {
    let mut config = EnforcerConfig::default();
    config.grid.cell_size = -1.0;
    assert_eq!(
        build_enforcer(&config).err(),
        Some(EnforcerError::InvalidCellSize(-1.0))
    );
}
