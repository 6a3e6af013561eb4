use super::declarations::Declarations;
use super::{ConstraintType, EleConstraintEnforcer};
use crate::config::{DiffusionConfig, EnforcerConfig};
use crate::connector::{Connector, ConnectorId, ConnectorRegistry};
use crate::diffusion::{DiffusionSolver, HeightField};
use crate::error::EnforcerError;
use crate::graph::{GraphBuilder, map_node_connectors};
use crate::lanes::propagate_lane_heights;
use crate::observer::SolveObserver;
use crate::topology::RoadTopology;
use log::{debug, info, warn};
use std::time::Instant;

/// Groups coincident connectors, relaxes heights over the road graph and
/// copies the result out to lane edges.
///
/// Vertical distance, incline and smoothness constraints only add graph edges
/// between the connectors involved; their numeric targets are not enforced.
#[derive(Debug)]
pub struct DiffusionEnforcer {
    decl: Declarations,
    config: DiffusionConfig,
}

impl DiffusionEnforcer {
    pub fn new(config: &EnforcerConfig) -> Result<Self, EnforcerError> {
        Ok(Self {
            decl: Declarations::new(&config.grid, true)?,
            config: config.diffusion.clone(),
        })
    }
}

impl EleConstraintEnforcer for DiffusionEnforcer {
    fn add_connectors(
        &mut self,
        connectors: Vec<Connector>,
    ) -> Result<Vec<ConnectorId>, EnforcerError> {
        self.decl.add_connectors(connectors)
    }

    fn require_same_ele(&mut self, connectors: &[ConnectorId]) -> Result<(), EnforcerError> {
        self.decl.require_same_ele(connectors)
    }

    fn require_vertical_distance(
        &mut self,
        _constraint: ConstraintType,
        _distance: f64,
        upper: ConnectorId,
        lower: ConnectorId,
    ) -> Result<(), EnforcerError> {
        self.decl.link(upper, lower)
    }

    fn require_vertical_distance_between(
        &mut self,
        _constraint: ConstraintType,
        _distance: f64,
        upper: ConnectorId,
        base1: ConnectorId,
        base2: ConnectorId,
    ) -> Result<(), EnforcerError> {
        self.decl.check_all(&[upper, base1, base2])?;
        self.decl.link(upper, base1)?;
        self.decl.link(upper, base2)
    }

    fn require_incline(
        &mut self,
        _constraint: ConstraintType,
        _incline: f64,
        connectors: &[ConnectorId],
    ) -> Result<(), EnforcerError> {
        self.decl.link_chain(connectors)
    }

    fn require_smoothness(
        &mut self,
        from: ConnectorId,
        via: ConnectorId,
        to: ConnectorId,
    ) -> Result<(), EnforcerError> {
        self.decl.link_chain(&[from, via, to])
    }

    fn enforce_constraints_observed(
        &mut self,
        topology: &dyn RoadTopology,
        observer: &mut dyn SolveObserver,
    ) -> Result<(), EnforcerError> {
        self.decl.begin_enforce(topology)?;
        let total_time = Instant::now();

        let phase = Instant::now();
        let group_count = self.decl.collapse_ground_elevations();
        info!(
            "stiff groups: {} groups over {} connectors {}ms",
            group_count,
            self.decl.registry.len(),
            phase.elapsed().as_millis()
        );

        let phase = Instant::now();
        let registry = &self.decl.registry;
        let node_lookup = map_node_connectors(registry);
        let (graph, stats) = GraphBuilder::new(registry, topology, &node_lookup)
            .subdivide_centerlines(self.config.subdivide_centerlines)
            .build(&self.decl.links);
        info!(
            "creating graph: {} nodes {} edges ({} constraint links) {}ms",
            graph.node_count(),
            graph.edge_count(),
            stats.extra_links,
            phase.elapsed().as_millis()
        );
        if stats.roads_skipped > 0 {
            debug!(
                "{} of {} road visits skipped for unregistered endpoints",
                stats.roads_skipped, stats.roads_visited
            );
        }
        observer.on_graph_built(registry, &graph);

        let phase = Instant::now();
        let states = registry.ground_states();
        let mut field = HeightField::from_ground_states(&states, &self.config);
        let report =
            DiffusionSolver::new(&self.config).solve(&graph, &states, &mut field, observer);
        if report.converged {
            info!(
                "diffusion: converged after {} steps (t = {:.2}) {}ms",
                report.steps,
                report.simulated_time,
                phase.elapsed().as_millis()
            );
        } else {
            warn!(
                "diffusion: step budget of {} spent, last max delta {:e} {}ms",
                report.steps,
                report.max_delta,
                phase.elapsed().as_millis()
            );
        }

        let phase = Instant::now();
        let mut heights = field.into_values();
        let lanes =
            propagate_lane_heights(registry, topology, &node_lookup, Some(&graph), &mut heights);
        info!(
            "lanes: {} roads, {} centerline points filled, {} direct / {} resampled lanes {}ms",
            lanes.roads,
            lanes.centerline_filled,
            lanes.lanes_direct,
            lanes.lanes_resampled,
            phase.elapsed().as_millis()
        );

        self.decl.average_offsets(&mut heights);
        observer.on_solved(&self.decl.registry, &heights);
        self.decl.apply_offsets(&heights);

        info!("elevation constraints enforced in {}ms", total_time.elapsed().as_millis());
        Ok(())
    }

    fn registry(&self) -> &ConnectorRegistry {
        &self.decl.registry
    }

    fn into_connectors(self: Box<Self>) -> Vec<Connector> {
        self.decl.registry.into_inner()
    }
}
