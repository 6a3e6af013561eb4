// ===========================================================================
// Elevation constraint enforcers
// ===========================================================================
//
// Feature modules register connectors and declare constraints, then call
// `enforce_constraints` exactly once. Strategies differ only in how heights
// are computed; declaration bookkeeping lives in `declarations`.

mod declarations;
mod diffusion;
mod interpolated;
mod none;

#[cfg(test)]
mod tests;

pub use diffusion::DiffusionEnforcer;
pub use interpolated::InterpolatedEnforcer;
pub use none::NoneEnforcer;

use crate::config::{EnforcerConfig, EnforcerKind};
use crate::connector::{Connector, ConnectorId, ConnectorRegistry};
use crate::error::EnforcerError;
use crate::observer::{NoopObserver, SolveObserver};
use crate::topology::RoadTopology;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintType {
    Min,
    Max,
    Exact,
}

pub trait EleConstraintEnforcer {
    /// Registers connectors and returns their ids in input order.
    fn add_connectors(
        &mut self,
        connectors: Vec<Connector>,
    ) -> Result<Vec<ConnectorId>, EnforcerError>;

    fn require_same_ele(&mut self, connectors: &[ConnectorId]) -> Result<(), EnforcerError>;

    fn require_same_ele_pair(
        &mut self,
        a: ConnectorId,
        b: ConnectorId,
    ) -> Result<(), EnforcerError> {
        self.require_same_ele(&[a, b])
    }

    fn require_vertical_distance(
        &mut self,
        constraint: ConstraintType,
        distance: f64,
        upper: ConnectorId,
        lower: ConnectorId,
    ) -> Result<(), EnforcerError>;

    /// `upper` relative to the line between two base connectors.
    fn require_vertical_distance_between(
        &mut self,
        constraint: ConstraintType,
        distance: f64,
        upper: ConnectorId,
        base1: ConnectorId,
        base2: ConnectorId,
    ) -> Result<(), EnforcerError>;

    fn require_incline(
        &mut self,
        constraint: ConstraintType,
        incline: f64,
        connectors: &[ConnectorId],
    ) -> Result<(), EnforcerError>;

    fn require_smoothness(
        &mut self,
        from: ConnectorId,
        via: ConnectorId,
        to: ConnectorId,
    ) -> Result<(), EnforcerError>;

    /// Computes and writes the elevation of every registered connector. Can
    /// run once; afterwards every declaration is rejected.
    fn enforce_constraints_observed(
        &mut self,
        topology: &dyn RoadTopology,
        observer: &mut dyn SolveObserver,
    ) -> Result<(), EnforcerError>;

    fn enforce_constraints(&mut self, topology: &dyn RoadTopology) -> Result<(), EnforcerError> {
        self.enforce_constraints_observed(topology, &mut NoopObserver)
    }

    fn registry(&self) -> &ConnectorRegistry;

    /// Hands the connectors back, e.g. for mesh generation.
    fn into_connectors(self: Box<Self>) -> Vec<Connector>;
}

pub fn build_enforcer(
    config: &EnforcerConfig,
) -> Result<Box<dyn EleConstraintEnforcer>, EnforcerError> {
    config.validate()?;
    Ok(match config.strategy {
        EnforcerKind::None => Box::new(NoneEnforcer::new(config)?),
        EnforcerKind::Interpolated => Box::new(InterpolatedEnforcer::new(config)?),
        EnforcerKind::Diffusion => Box::new(DiffusionEnforcer::new(config)?),
    })
}
