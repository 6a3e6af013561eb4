use anyhow::{Context, Result, bail};
use elevation::{
    Connector, ConnectorId, EleConstraintEnforcer, GroundState, MapNodeId, RoadId, RoadNetwork,
    RoadSegment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct SceneConnector {
    pub x: f64,
    pub z: f64,
    /// Terrain elevation
    #[serde(default)]
    pub ele: f64,
    #[serde(default)]
    pub ground_state: GroundState,
    /// Map node the connector sits on, for junctions
    #[serde(default)]
    pub node: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SceneRoad {
    pub id: i64,
    pub start: i64,
    pub end: i64,
    #[serde(default)]
    pub centerline: Vec<usize>,
    #[serde(default)]
    pub left: Vec<usize>,
    #[serde(default)]
    pub right: Vec<usize>,
}

/// Connectors plus the roads and constraints between them. Roads and
/// constraints refer to connectors by their position in `connectors`.
#[derive(Debug, Deserialize)]
pub struct Scene {
    pub connectors: Vec<SceneConnector>,
    #[serde(default)]
    pub roads: Vec<SceneRoad>,
    #[serde(default)]
    pub same_elevation: Vec<Vec<usize>>,
    #[serde(default)]
    pub smoothness: Vec<[usize; 3]>,
}

#[derive(Debug, Serialize)]
pub struct SolvedPoint {
    pub index: usize,
    pub x: f64,
    pub ele: f64,
    pub z: f64,
    pub ground_state: GroundState,
}

fn resolve(ids: &[ConnectorId], indices: &[usize], what: &str) -> Result<Vec<ConnectorId>> {
    indices
        .iter()
        .map(|&i| match ids.get(i) {
            Some(&id) => Ok(id),
            None => bail!(
                "{} refers to connector {} but the scene only has {}",
                what,
                i,
                ids.len()
            ),
        })
        .collect()
}

impl Scene {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scene {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing scene {}", path.display()))
    }

    /// Registers every connector and constraint with `enforcer` and returns
    /// the road topology to solve against.
    pub fn register(&self, enforcer: &mut dyn EleConstraintEnforcer) -> Result<RoadNetwork> {
        let connectors = self
            .connectors
            .iter()
            .map(|c| {
                let connector = Connector::new(c.x, c.ele, c.z, c.ground_state);
                match c.node {
                    Some(node) => connector.with_reference(MapNodeId(node)),
                    None => connector,
                }
            })
            .collect();
        let ids = enforcer.add_connectors(connectors)?;

        for (i, group) in self.same_elevation.iter().enumerate() {
            let group = resolve(&ids, group, &format!("same_elevation[{}]", i))?;
            enforcer.require_same_ele(&group)?;
        }
        for (i, triple) in self.smoothness.iter().enumerate() {
            let t = resolve(&ids, triple, &format!("smoothness[{}]", i))?;
            enforcer.require_smoothness(t[0], t[1], t[2])?;
        }

        let mut network = RoadNetwork::new();
        for road in &self.roads {
            let what = format!("road {}", road.id);
            network.add_road(
                RoadSegment::new(RoadId(road.id), MapNodeId(road.start), MapNodeId(road.end))
                    .with_centerline(resolve(&ids, &road.centerline, &what)?)
                    .with_lanes(
                        resolve(&ids, &road.left, &what)?,
                        resolve(&ids, &road.right, &what)?,
                    ),
            );
        }
        Ok(network)
    }
}

pub fn solved_points(connectors: &[Connector]) -> Vec<SolvedPoint> {
    connectors
        .iter()
        .enumerate()
        .map(|(index, c)| SolvedPoint {
            index,
            x: c.x(),
            ele: c.ele(),
            z: c.z(),
            ground_state: c.ground_state,
        })
        .collect()
}
