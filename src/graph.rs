// ===========================================================================
// Connectivity graph over connectors, following the physical road network
// ===========================================================================
use crate::connector::{ConnectorId, ConnectorRegistry};
use crate::topology::{MapNodeId, RoadTopology};
use ahash::AHashMap;
use itertools::Itertools;
use log::{debug, info};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphEdge {
    pub to: ConnectorId,
    /// Ground plane distance between the two endpoints.
    pub distance: f64,
}

/// Undirected weighted graph, stored as a symmetric adjacency list indexed by
/// connector id.
#[derive(Debug, Clone, Default)]
pub struct ConnectivityGraph {
    adjacency: Vec<Vec<GraphEdge>>,
    edge_count: usize,
}

impl ConnectivityGraph {
    pub fn new(connector_count: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); connector_count],
            edge_count: 0,
        }
    }

    pub fn contains_edge(&self, a: ConnectorId, b: ConnectorId) -> bool {
        self.neighbors(a).iter().any(|e| e.to == b)
    }

    /// Adds the undirected edge `a <-> b`. Self loops and edges that already
    /// exist in either direction are ignored. Returns whether anything was added.
    pub fn add_edge(&mut self, a: ConnectorId, b: ConnectorId, distance: f64) -> bool {
        if a == b || self.contains_edge(a, b) {
            return false;
        }
        let needed = a.index().max(b.index()) + 1;
        if self.adjacency.len() < needed {
            self.adjacency.resize(needed, Vec::new());
        }
        self.adjacency[a.index()].push(GraphEdge { to: b, distance });
        self.adjacency[b.index()].push(GraphEdge { to: a, distance });
        self.edge_count += 1;
        true
    }

    pub fn neighbors(&self, id: ConnectorId) -> &[GraphEdge] {
        self.adjacency
            .get(id.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_node(&self, id: ConnectorId) -> bool {
        !self.neighbors(id).is_empty()
    }

    /// Connectors with at least one edge, in id order.
    pub fn nodes(&self) -> impl Iterator<Item = ConnectorId> + '_ {
        self.adjacency
            .iter()
            .enumerate()
            .filter(|(_, edges)| !edges.is_empty())
            .map(|(i, _)| ConnectorId(i))
    }

    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphBuildStats {
    pub roads_visited: usize,
    /// Road visits dropped because an endpoint node has no registered connector.
    pub roads_skipped: usize,
    pub extra_links: usize,
}

/// Map node to connector lookup. The first connector registered for a node wins.
pub fn map_node_connectors(registry: &ConnectorRegistry) -> AHashMap<MapNodeId, ConnectorId> {
    let mut lookup = AHashMap::new();
    for (id, connector) in registry.iter() {
        if let Some(node) = connector.reference {
            lookup.entry(node).or_insert(id);
        }
    }
    lookup
}

pub struct GraphBuilder<'a> {
    registry: &'a ConnectorRegistry,
    topology: &'a dyn RoadTopology,
    node_lookup: &'a AHashMap<MapNodeId, ConnectorId>,
    subdivide_centerlines: bool,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        registry: &'a ConnectorRegistry,
        topology: &'a dyn RoadTopology,
        node_lookup: &'a AHashMap<MapNodeId, ConnectorId>,
    ) -> Self {
        Self {
            registry,
            topology,
            node_lookup,
            subdivide_centerlines: true,
        }
    }

    /// With `false`, junction connectors are linked directly and centerline
    /// points stay out of the graph.
    pub fn subdivide_centerlines(mut self, enabled: bool) -> Self {
        self.subdivide_centerlines = enabled;
        self
    }

    fn link(&self, graph: &mut ConnectivityGraph, a: ConnectorId, b: ConnectorId) {
        graph.add_edge(a, b, self.registry.distance_xz(a, b));
    }

    /// Builds the graph from every junction connector's roads plus the
    /// explicit links declared by constraints.
    pub fn build(
        &self,
        extra_links: &[(ConnectorId, ConnectorId)],
    ) -> (ConnectivityGraph, GraphBuildStats) {
        let mut graph = ConnectivityGraph::new(self.registry.len());
        let mut stats = GraphBuildStats::default();

        let start_time = Instant::now();
        let mut last_report = start_time;

        for (count, (c, connector)) in self.registry.iter().enumerate() {
            let Some(node) = connector.reference else {
                continue;
            };

            for road in self.topology.connected_roads(node) {
                stats.roads_visited += 1;
                let (Some(&a), Some(&b)) = (
                    self.node_lookup.get(&road.start),
                    self.node_lookup.get(&road.end),
                ) else {
                    debug!(
                        "Road {:?} at {}: endpoint without connector, skipping",
                        road.id, node
                    );
                    stats.roads_skipped += 1;
                    continue;
                };

                let (Some(&first), Some(&last)) =
                    (road.centerline.first(), road.centerline.last())
                else {
                    self.link(&mut graph, c, b);
                    self.link(&mut graph, c, a);
                    continue;
                };

                if !self.subdivide_centerlines {
                    self.link(&mut graph, c, b);
                    self.link(&mut graph, c, a);
                    continue;
                }

                // tie goes to the end node, both stand for the same junction
                if self.registry.distance_xz(c, b) > self.registry.distance_xz(c, a) {
                    self.link(&mut graph, c, a);
                } else {
                    self.link(&mut graph, c, b);
                }
                self.link(&mut graph, a, first);
                for (&p, &q) in road.centerline.iter().tuple_windows() {
                    self.link(&mut graph, p, q);
                }
                self.link(&mut graph, last, b);
            }

            if last_report.elapsed().as_secs() >= 5 {
                last_report = Instant::now();
                info!(
                    "creating graph: {}/{} {}ms",
                    count,
                    self.registry.len(),
                    start_time.elapsed().as_millis()
                );
            }
        }

        for &(a, b) in extra_links {
            if graph.add_edge(a, b, self.registry.distance_xz(a, b)) {
                stats.extra_links += 1;
            }
        }

        (graph, stats)
    }
}
