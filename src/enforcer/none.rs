use super::declarations::Declarations;
use super::{ConstraintType, EleConstraintEnforcer};
use crate::config::EnforcerConfig;
use crate::connector::{Connector, ConnectorId, ConnectorRegistry};
use crate::error::EnforcerError;
use crate::observer::SolveObserver;
use crate::topology::RoadTopology;

/// Leaves every connector at its terrain elevation.
#[derive(Debug)]
pub struct NoneEnforcer {
    decl: Declarations,
}

impl NoneEnforcer {
    pub fn new(config: &EnforcerConfig) -> Result<Self, EnforcerError> {
        Ok(Self {
            decl: Declarations::new(&config.grid, false)?,
        })
    }
}

impl EleConstraintEnforcer for NoneEnforcer {
    fn add_connectors(
        &mut self,
        connectors: Vec<Connector>,
    ) -> Result<Vec<ConnectorId>, EnforcerError> {
        self.decl.add_connectors(connectors)
    }

    fn require_same_ele(&mut self, connectors: &[ConnectorId]) -> Result<(), EnforcerError> {
        self.decl.ensure_open()?;
        self.decl.check_all(connectors)
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
        let heights = vec![0.0; self.decl.registry.len()];
        observer.on_solved(&self.decl.registry, &heights);
        Ok(())
    }

    fn registry(&self) -> &ConnectorRegistry {
        &self.decl.registry
    }

    fn into_connectors(self: Box<Self>) -> Vec<Connector> {
        self.decl.registry.into_inner()
    }
}
