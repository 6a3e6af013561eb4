// ===========================================================================
// Lane height propagation
// ===========================================================================
//
// Lane edge connectors are kept out of the connectivity graph. Once the
// centerline has heights they are copied over index by index, or resampled
// nearest-neighbour when the lane has a different point count.

use crate::connector::{ConnectorId, ConnectorRegistry};
use crate::graph::ConnectivityGraph;
use crate::topology::{MapNodeId, RoadId, RoadSegment, RoadTopology};
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;
use log::debug;

/// Source index for destination index `i` when resampling a sequence of
/// `source_len` values onto `dest_len` slots.
///
/// Rounds `i * source_len / dest_len` to the nearest index with ties going to
/// the lower one, then clamps to the last source index. Copying three values
/// onto six slots gives `[0, 0, 1, 1, 2, 2]`.
pub fn resample_index(i: usize, source_len: usize, dest_len: usize) -> usize {
    if source_len == 0 || dest_len == 0 {
        return 0;
    }
    let exact = i as f64 * source_len as f64 / dest_len as f64;
    let nearest = (exact - 0.5).ceil().max(0.0) as usize;
    nearest.min(source_len - 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneCopy {
    /// One of the sequences was empty.
    Skipped,
    Direct,
    Resampled,
}

/// Copies heights from `source` onto `dest`, both given as connector ids
/// indexing `heights`.
pub fn copy_lane(heights: &mut [f64], source: &[ConnectorId], dest: &[ConnectorId]) -> LaneCopy {
    if source.is_empty() || dest.is_empty() {
        return LaneCopy::Skipped;
    }
    if source.len() == dest.len() {
        for (&s, &d) in source.iter().zip(dest) {
            heights[d.index()] = heights[s.index()];
        }
        return LaneCopy::Direct;
    }
    for (i, &d) in dest.iter().enumerate() {
        let s = source[resample_index(i, source.len(), dest.len())];
        heights[d.index()] = heights[s.index()];
    }
    LaneCopy::Resampled
}

/// Heights along `path` blended linearly between `start` and `end` by
/// accumulated ground plane distance. A path of zero length gets `start`
/// everywhere.
pub fn path_heights(
    registry: &ConnectorRegistry,
    path: &[ConnectorId],
    start: f64,
    end: f64,
) -> Vec<f64> {
    let offsets: Vec<f64> = std::iter::once(0.0)
        .chain(
            path.iter()
                .tuple_windows()
                .map(|(&a, &b)| registry.distance_xz(a, b))
                .scan(0.0, |acc, d| {
                    *acc += d;
                    Some(*acc)
                }),
        )
        .take(path.len())
        .collect();

    let length = offsets.last().copied().unwrap_or(0.0);
    if length <= 0.0 {
        return vec![start; path.len()];
    }
    offsets
        .iter()
        .map(|pos| {
            let t = pos / length;
            end * t + start * (1.0 - t)
        })
        .collect()
}

/// Writes [`path_heights`] into every connector of `path`.
pub fn interpolate_along_path(
    registry: &ConnectorRegistry,
    heights: &mut [f64],
    path: &[ConnectorId],
    start: f64,
    end: f64,
) {
    for (&id, h) in path.iter().zip(path_heights(registry, path, start, end)) {
        heights[id.index()] = h;
    }
}

/// `[start] + centerline + [end]`, without repeating an endpoint the
/// centerline already contains.
pub fn center_sequence(
    road: &RoadSegment,
    start: ConnectorId,
    end: ConnectorId,
) -> Vec<ConnectorId> {
    let mut sequence = Vec::with_capacity(road.centerline.len() + 2);
    if road.centerline.first() != Some(&start) {
        sequence.push(start);
    }
    sequence.extend_from_slice(&road.centerline);
    if sequence.last() != Some(&end) {
        sequence.push(end);
    }
    sequence
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneStats {
    pub roads: usize,
    /// Roads whose start or end node has no registered connector.
    pub roads_skipped: usize,
    pub centerline_filled: usize,
    pub lanes_direct: usize,
    pub lanes_resampled: usize,
}

impl LaneStats {
    fn record(&mut self, copy: LaneCopy) {
        match copy {
            LaneCopy::Skipped => {}
            LaneCopy::Direct => self.lanes_direct += 1,
            LaneCopy::Resampled => self.lanes_resampled += 1,
        }
    }
}

/// Every road reachable from a junction connector, each once, with its
/// resolved endpoint connectors. Roads with an unresolved endpoint are
/// counted in `skipped`.
pub(crate) fn resolved_roads<'t>(
    registry: &ConnectorRegistry,
    topology: &'t dyn RoadTopology,
    node_lookup: &AHashMap<MapNodeId, ConnectorId>,
    skipped: &mut usize,
) -> Vec<(&'t RoadSegment, ConnectorId, ConnectorId)> {
    let mut seen: AHashSet<RoadId> = AHashSet::new();
    let mut roads = Vec::new();

    for (_, connector) in registry.iter() {
        let Some(node) = connector.reference else {
            continue;
        };
        for road in topology.connected_roads(node) {
            if !seen.insert(road.id) {
                continue;
            }
            match (node_lookup.get(&road.start), node_lookup.get(&road.end)) {
                (Some(&a), Some(&b)) => roads.push((road, a, b)),
                _ => {
                    debug!("Road {:?}: endpoint without connector, no lane heights", road.id);
                    *skipped += 1;
                }
            }
        }
    }
    roads
}

/// Fans solved heights out from the graph to the rest of every road.
///
/// Centerline points that are not graph nodes are interpolated between the
/// road's endpoint heights, then both lanes are copied from the full center
/// sequence. With `graph = None` every interior centerline point is
/// interpolated.
pub fn propagate_lane_heights(
    registry: &ConnectorRegistry,
    topology: &dyn RoadTopology,
    node_lookup: &AHashMap<MapNodeId, ConnectorId>,
    graph: Option<&ConnectivityGraph>,
    heights: &mut [f64],
) -> LaneStats {
    let mut stats = LaneStats::default();
    let roads = resolved_roads(registry, topology, node_lookup, &mut stats.roads_skipped);

    for (road, a, b) in roads {
        stats.roads += 1;
        let center = center_sequence(road, a, b);

        let solved = |id: ConnectorId| graph.is_some_and(|g| g.is_node(id));
        if center.iter().any(|&id| !solved(id)) {
            let blended = path_heights(registry, &center, heights[a.index()], heights[b.index()]);
            let last = center.len() - 1;
            for (i, (&id, h)) in center.iter().zip(blended).enumerate() {
                // endpoints keep whatever they were solved or pinned to
                if i == 0 || i == last || solved(id) {
                    continue;
                }
                heights[id.index()] = h;
                stats.centerline_filled += 1;
            }
        }

        for lane in road.lanes() {
            let copy = copy_lane(heights, &center, lane);
            stats.record(copy);
        }
    }
    stats
}
