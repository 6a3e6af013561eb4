use super::declarations::Declarations;
use super::{ConstraintType, EleConstraintEnforcer};
use crate::config::{DiffusionConfig, EnforcerConfig};
use crate::connector::{Connector, ConnectorId, ConnectorRegistry};
use crate::error::EnforcerError;
use crate::graph::map_node_connectors;
use crate::lanes::{center_sequence, interpolate_along_path, resolved_roads};
use crate::observer::SolveObserver;
use crate::topology::RoadTopology;
use log::info;
use std::time::Instant;

/// Pins junctions to their shelf heights and blends linearly along each road.
///
/// Centerlines are interpolated over the full center sequence, each lane over
/// its own length, both between the heights of the road's two junctions.
#[derive(Debug)]
pub struct InterpolatedEnforcer {
    decl: Declarations,
    shelves: DiffusionConfig,
}

impl InterpolatedEnforcer {
    pub fn new(config: &EnforcerConfig) -> Result<Self, EnforcerError> {
        Ok(Self {
            decl: Declarations::new(&config.grid, true)?,
            shelves: config.diffusion.clone(),
        })
    }
}

impl EleConstraintEnforcer for InterpolatedEnforcer {
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
        self.decl.ensure_open()?;
        self.decl.check_all(&[upper, lower])
    }

    fn require_vertical_distance_between(
        &mut self,
        _constraint: ConstraintType,
        _distance: f64,
        upper: ConnectorId,
        base1: ConnectorId,
        base2: ConnectorId,
    ) -> Result<(), EnforcerError> {
        self.decl.ensure_open()?;
        self.decl.check_all(&[upper, base1, base2])
    }

    fn require_incline(
        &mut self,
        _constraint: ConstraintType,
        _incline: f64,
        connectors: &[ConnectorId],
    ) -> Result<(), EnforcerError> {
        self.decl.ensure_open()?;
        self.decl.check_all(connectors)
    }

    fn require_smoothness(
        &mut self,
        from: ConnectorId,
        via: ConnectorId,
        to: ConnectorId,
    ) -> Result<(), EnforcerError> {
        self.decl.ensure_open()?;
        self.decl.check_all(&[from, via, to])
    }

    fn enforce_constraints_observed(
        &mut self,
        topology: &dyn RoadTopology,
        observer: &mut dyn SolveObserver,
    ) -> Result<(), EnforcerError> {
        self.decl.begin_enforce(topology)?;
        let start_time = Instant::now();

        self.decl.collapse_ground_elevations();

        let registry = &self.decl.registry;
        let mut heights: Vec<f64> = registry
            .iter()
            .map(|(_, c)| self.shelves.initial_height(c.ground_state))
            .collect();

        let node_lookup = map_node_connectors(registry);
        let mut skipped = 0;
        let roads = resolved_roads(registry, topology, &node_lookup, &mut skipped);
        for &(road, a, b) in &roads {
            let (start, end) = (heights[a.index()], heights[b.index()]);
            interpolate_along_path(
                registry,
                &mut heights,
                &center_sequence(road, a, b),
                start,
                end,
            );
            for lane in road.lanes() {
                interpolate_along_path(registry, &mut heights, lane, start, end);
            }
        }

        self.decl.average_offsets(&mut heights);
        observer.on_solved(&self.decl.registry, &heights);
        self.decl.apply_offsets(&heights);

        info!(
            "interpolated {} roads ({} skipped) {}ms",
            roads.len(),
            skipped,
            start_time.elapsed().as_millis()
        );
        Ok(())
    }

    fn registry(&self) -> &ConnectorRegistry {
        &self.decl.registry
    }

    fn into_connectors(self: Box<Self>) -> Vec<Connector> {
        self.decl.registry.into_inner()
    }
}
