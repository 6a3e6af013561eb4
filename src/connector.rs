// ===========================================================================
// Elevation connectors and the per-pass registry that owns them
// ===========================================================================
use crate::error::EnforcerError;
use crate::topology::MapNodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a connector inside one [`ConnectorRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectorId(pub(crate) usize);

impl ConnectorId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connector#{}", self.0)
    }
}

/// Boundary classification of a connector.
///
/// `OnGround` connectors float with the solved field, `Above` and `Below`
/// are pinned to fixed shelf heights relative to local ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundState {
    #[default]
    OnGround,
    Above,
    Below,
}

impl GroundState {
    pub fn is_pinned(self) -> bool {
        !matches!(self, GroundState::OnGround)
    }
}

/// A point that needs a solved vertical coordinate.
///
/// `pos` is `[x, y, z]` with `y` up. The horizontal `x`/`z` pair is fixed by
/// upstream geometry; enforcers only ever write `y`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub pos: [f64; 3],
    pub ground_state: GroundState,
    /// Map node this connector was created for, if any. Only used to look up
    /// the roads meeting there.
    pub reference: Option<MapNodeId>,
}

impl Connector {
    pub fn new(x: f64, ele: f64, z: f64, ground_state: GroundState) -> Self {
        Self {
            pos: [x, ele, z],
            ground_state,
            reference: None,
        }
    }

    pub fn on_ground(x: f64, z: f64) -> Self {
        Self::new(x, 0.0, z, GroundState::OnGround)
    }

    pub fn with_reference(mut self, node: MapNodeId) -> Self {
        self.reference = Some(node);
        self
    }

    pub fn x(&self) -> f64 {
        self.pos[0]
    }

    pub fn ele(&self) -> f64 {
        self.pos[1]
    }

    pub fn z(&self) -> f64 {
        self.pos[2]
    }

    pub fn set_ele(&mut self, ele: f64) {
        self.pos[1] = ele;
    }

    /// Ground plane distance, the vertical axis is ignored.
    pub fn distance_xz(&self, other: &Connector) -> f64 {
        (self.x() - other.x()).hypot(self.z() - other.z())
    }

    /// Whether both connectors describe the same physical point, e.g. a node
    /// shared by two road segments.
    pub fn connects_to(&self, other: &Connector, tolerance: f64) -> bool {
        self.ground_state == other.ground_state && self.distance_xz(other) <= tolerance
    }
}

/// Owns the connectors of one enforcement pass.
#[derive(Debug, Clone, Default)]
pub struct ConnectorRegistry {
    connectors: Vec<Connector>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, connector: Connector) -> ConnectorId {
        let id = ConnectorId(self.connectors.len());
        self.connectors.push(connector);
        id
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    pub fn contains(&self, id: ConnectorId) -> bool {
        id.0 < self.connectors.len()
    }

    pub fn check(&self, id: ConnectorId) -> Result<ConnectorId, EnforcerError> {
        if self.contains(id) {
            Ok(id)
        } else {
            Err(EnforcerError::UnknownConnector(id))
        }
    }

    pub fn get(&self, id: ConnectorId) -> Result<&Connector, EnforcerError> {
        self.connectors
            .get(id.0)
            .ok_or(EnforcerError::UnknownConnector(id))
    }

    pub fn get_mut(&mut self, id: ConnectorId) -> Result<&mut Connector, EnforcerError> {
        self.connectors
            .get_mut(id.0)
            .ok_or(EnforcerError::UnknownConnector(id))
    }

    /// Unchecked access for ids that came out of this registry.
    pub(crate) fn at(&self, id: ConnectorId) -> &Connector {
        &self.connectors[id.0]
    }

    pub fn distance_xz(&self, a: ConnectorId, b: ConnectorId) -> f64 {
        self.at(a).distance_xz(self.at(b))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConnectorId, &Connector)> {
        self.connectors
            .iter()
            .enumerate()
            .map(|(i, c)| (ConnectorId(i), c))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ConnectorId, &mut Connector)> {
        self.connectors
            .iter_mut()
            .enumerate()
            .map(|(i, c)| (ConnectorId(i), c))
    }

    pub fn ground_states(&self) -> Vec<GroundState> {
        self.connectors.iter().map(|c| c.ground_state).collect()
    }

    pub fn into_inner(self) -> Vec<Connector> {
        self.connectors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_ignores_vertical_axis() {
        let a = Connector::new(0.0, 100.0, 0.0, GroundState::OnGround);
        let b = Connector::new(3.0, -50.0, 4.0, GroundState::OnGround);
        assert_eq!(a.distance_xz(&b), 5.0);
    }

    #[test]
    fn test_connects_to_requires_same_ground_state() {
        let a = Connector::new(10.0, 0.0, 10.0, GroundState::OnGround);
        let b = Connector::new(10.0, 3.0, 10.0, GroundState::OnGround);
        let bridge = Connector::new(10.0, 0.0, 10.0, GroundState::Above);
        assert!(a.connects_to(&b, 1e-6));
        assert!(!a.connects_to(&bridge, 1e-6));

        let far = Connector::on_ground(10.5, 10.0);
        assert!(!a.connects_to(&far, 1e-6));
    }

    #[test]
    fn test_registry_rejects_unknown_ids() {
        let mut registry = ConnectorRegistry::new();
        let id = registry.push(Connector::on_ground(0.0, 0.0));
        assert!(registry.get(id).is_ok());
        assert_eq!(
            registry.get(ConnectorId(7)).unwrap_err(),
            EnforcerError::UnknownConnector(ConnectorId(7))
        );
    }
}
