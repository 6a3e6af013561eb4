// ===========================================================================
// Road topology: the "which roads meet at this node" query
// ===========================================================================
//
// Road interpretation lives upstream. The enforcer only needs to know, for a
// junction node, which road segments start or end there and which connectors
// sit on their centerline and lane edges.

use crate::connector::ConnectorId;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MapNodeId(pub i64);

impl fmt::Display for MapNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node/{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoadId(pub i64);

/// One road segment between two junction nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadSegment {
    pub id: RoadId,
    pub start: MapNodeId,
    pub end: MapNodeId,
    /// Interior subdivision points, ordered from `start` to `end`.
    pub centerline: Vec<ConnectorId>,
    pub left_lane: Vec<ConnectorId>,
    pub right_lane: Vec<ConnectorId>,
}

impl RoadSegment {
    pub fn new(id: RoadId, start: MapNodeId, end: MapNodeId) -> Self {
        Self {
            id,
            start,
            end,
            centerline: Vec::new(),
            left_lane: Vec::new(),
            right_lane: Vec::new(),
        }
    }

    pub fn with_centerline(mut self, centerline: Vec<ConnectorId>) -> Self {
        self.centerline = centerline;
        self
    }

    pub fn with_lanes(mut self, left: Vec<ConnectorId>, right: Vec<ConnectorId>) -> Self {
        self.left_lane = left;
        self.right_lane = right;
        self
    }

    pub fn lanes(&self) -> [&[ConnectorId]; 2] {
        [&self.left_lane, &self.right_lane]
    }
}

pub trait RoadTopology {
    /// Roads that start or end at `node`.
    fn connected_roads(&self, node: MapNodeId) -> Vec<&RoadSegment>;
}

/// In-memory topology, indexed by junction node.
#[derive(Debug, Clone, Default)]
pub struct RoadNetwork {
    roads: Vec<RoadSegment>,
    by_node: AHashMap<MapNodeId, Vec<usize>>,
}

impl RoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_road(&mut self, road: RoadSegment) {
        let index = self.roads.len();
        self.by_node.entry(road.start).or_default().push(index);
        if road.end != road.start {
            self.by_node.entry(road.end).or_default().push(index);
        }
        self.roads.push(road);
    }

    pub fn roads(&self) -> &[RoadSegment] {
        &self.roads
    }

    pub fn len(&self) -> usize {
        self.roads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roads.is_empty()
    }
}

impl RoadTopology for RoadNetwork {
    fn connected_roads(&self, node: MapNodeId) -> Vec<&RoadSegment> {
        self.by_node
            .get(&node)
            .map(|indices| indices.iter().map(|&i| &self.roads[i]).collect())
            .unwrap_or_default()
    }
}
