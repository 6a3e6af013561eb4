// ===========================================================================
// Declaration phase state shared by every enforcer
// ===========================================================================
use crate::config::GridConfig;
use crate::connector::{Connector, ConnectorId, ConnectorRegistry};
use crate::error::EnforcerError;
use crate::spatial_index::ConnectorGridIndex;
use crate::stiff_groups::StiffGroups;
use crate::topology::RoadTopology;
use itertools::Itertools;
use log::debug;

/// Connectors, stiff groups and constraint links collected before the solve.
///
/// Once [`Declarations::begin_enforce`] succeeds the value is sealed and every
/// further declaration fails with [`EnforcerError::AlreadyEnforced`].
#[derive(Debug)]
pub(crate) struct Declarations {
    pub registry: ConnectorRegistry,
    pub groups: StiffGroups,
    /// Extra graph edges requested by vertical distance, incline and
    /// smoothness constraints.
    pub links: Vec<(ConnectorId, ConnectorId)>,
    index: ConnectorGridIndex,
    tolerance: f64,
    auto_group: bool,
    enforced: bool,
}

impl Declarations {
    /// With `auto_group`, connectors that coincide with an already registered
    /// one are put into a stiff group with it.
    pub fn new(grid: &GridConfig, auto_group: bool) -> Result<Self, EnforcerError> {
        Ok(Self {
            registry: ConnectorRegistry::new(),
            groups: StiffGroups::new(0),
            links: Vec::new(),
            index: ConnectorGridIndex::new(grid.cell_size, grid.margin)?,
            tolerance: grid.coincidence_tolerance,
            auto_group,
            enforced: false,
        })
    }

    pub fn ensure_open(&self) -> Result<(), EnforcerError> {
        if self.enforced {
            Err(EnforcerError::AlreadyEnforced)
        } else {
            Ok(())
        }
    }

    pub fn check_all(&self, ids: &[ConnectorId]) -> Result<(), EnforcerError> {
        for &id in ids {
            self.registry.check(id)?;
        }
        Ok(())
    }

    pub fn add_connectors(
        &mut self,
        connectors: Vec<Connector>,
    ) -> Result<Vec<ConnectorId>, EnforcerError> {
        self.ensure_open()?;

        let mut ids = Vec::with_capacity(connectors.len());
        let mut coincident = 0usize;
        for connector in connectors {
            let (x, z) = (connector.x(), connector.z());
            let id = self.registry.push(connector);
            self.groups.grow(self.registry.len());

            if self.auto_group {
                let matches: Vec<ConnectorId> = self
                    .index
                    .query(x, z)?
                    .into_iter()
                    .filter(|&other| {
                        self.registry
                            .at(other)
                            .connects_to(self.registry.at(id), self.tolerance)
                    })
                    .collect();
                for other in matches {
                    self.groups.require_same_elevation(&[other, id])?;
                    coincident += 1;
                }
            }

            self.index.insert(id, x, z)?;
            ids.push(id);
        }

        if coincident > 0 {
            debug!(
                "registered {} connectors, {} coincident pairs grouped",
                ids.len(),
                coincident
            );
        }
        Ok(ids)
    }

    pub fn require_same_ele(&mut self, ids: &[ConnectorId]) -> Result<(), EnforcerError> {
        self.ensure_open()?;
        self.groups.require_same_elevation(ids)?;
        Ok(())
    }

    pub fn link(&mut self, a: ConnectorId, b: ConnectorId) -> Result<(), EnforcerError> {
        self.link_chain(&[a, b])
    }

    /// Links every consecutive pair of `ids`.
    pub fn link_chain(&mut self, ids: &[ConnectorId]) -> Result<(), EnforcerError> {
        self.ensure_open()?;
        self.check_all(ids)?;
        self.links.extend(
            ids.iter()
                .tuple_windows()
                .filter(|(a, b)| a != b)
                .map(|(&a, &b)| (a, b)),
        );
        Ok(())
    }

    /// Every connector id a road reachable from a junction refers to must
    /// belong to this registry.
    fn check_topology(&self, topology: &dyn RoadTopology) -> Result<(), EnforcerError> {
        for (_, connector) in self.registry.iter() {
            let Some(node) = connector.reference else {
                continue;
            };
            for road in topology.connected_roads(node) {
                self.check_all(&road.centerline)?;
                self.check_all(&road.left_lane)?;
                self.check_all(&road.right_lane)?;
            }
        }
        Ok(())
    }

    /// Validates the topology and seals the declarations.
    pub fn begin_enforce(&mut self, topology: &dyn RoadTopology) -> Result<(), EnforcerError> {
        self.ensure_open()?;
        self.check_topology(topology)?;
        self.enforced = true;
        Ok(())
    }

    /// Replaces the ground elevation of every stiff group member with the
    /// group mean. Returns the number of groups.
    pub fn collapse_ground_elevations(&mut self) -> usize {
        let groups = self.groups.groups();
        for (_, members) in &groups {
            let mean = members.iter().map(|&m| self.registry.at(m).ele()).sum::<f64>()
                / members.len() as f64;
            for &m in members {
                if let Ok(connector) = self.registry.get_mut(m) {
                    connector.set_ele(mean);
                }
            }
        }
        groups.len()
    }

    /// Replaces the solved offset of every stiff group member with the group
    /// mean.
    pub fn average_offsets(&mut self, heights: &mut [f64]) {
        for (_, members) in self.groups.groups() {
            let mean =
                members.iter().map(|m| heights[m.index()]).sum::<f64>() / members.len() as f64;
            for m in members {
                heights[m.index()] = mean;
            }
        }
    }

    /// Adds each offset to its connector's ground elevation.
    pub fn apply_offsets(&mut self, heights: &[f64]) {
        for ((_, connector), &h) in self.registry.iter_mut().zip(heights) {
            connector.set_ele(connector.ele() + h);
        }
    }
}
