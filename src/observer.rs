// ===========================================================================
// Optional diagnostics hook for the solve pipeline
// ===========================================================================
use crate::connector::{ConnectorRegistry, GroundState};
use crate::graph::ConnectivityGraph;
use serde::Serialize;
use std::io;

/// Receives intermediate state while an enforcer runs. Every callback defaults
/// to doing nothing.
pub trait SolveObserver {
    fn on_graph_built(&mut self, _registry: &ConnectorRegistry, _graph: &ConnectivityGraph) {}

    fn on_step(&mut self, _step: usize, _max_delta: f64) {}

    /// `heights` are the final offsets from ground, indexed by connector id,
    /// before they are written back into the connectors.
    fn on_solved(&mut self, _registry: &ConnectorRegistry, _heights: &[f64]) {}
}

pub struct NoopObserver;

impl SolveObserver for NoopObserver {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointRecord {
    pub id: usize,
    pub x: f64,
    pub z: f64,
    pub ground_state: GroundState,
    pub height: f64,
    pub graph_node: bool,
}

/// Collects every solved point so it can be written out as CSV for inspection.
#[derive(Debug, Default)]
pub struct PointDump {
    graph_nodes: Vec<bool>,
    records: Vec<PointRecord>,
    steps: usize,
    last_delta: Option<f64>,
}

impl PointDump {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[PointRecord] {
        &self.records
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn last_delta(&self) -> Option<f64> {
        self.last_delta
    }

    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_writer(writer);
        for record in &self.records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl SolveObserver for PointDump {
    fn on_graph_built(&mut self, registry: &ConnectorRegistry, graph: &ConnectivityGraph) {
        self.graph_nodes = registry.iter().map(|(id, _)| graph.is_node(id)).collect();
    }

    fn on_step(&mut self, step: usize, max_delta: f64) {
        self.steps = step + 1;
        self.last_delta = Some(max_delta);
    }

    fn on_solved(&mut self, registry: &ConnectorRegistry, heights: &[f64]) {
        self.records = registry
            .iter()
            .map(|(id, c)| PointRecord {
                id: id.index(),
                x: c.x(),
                z: c.z(),
                ground_state: c.ground_state,
                height: heights.get(id.index()).copied().unwrap_or(0.0),
                graph_node: self.graph_nodes.get(id.index()).copied().unwrap_or(false),
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::Connector;

    #[test]
    fn test_point_dump_writes_csv() {
        let mut registry = ConnectorRegistry::new();
        registry.push(Connector::on_ground(1.0, 2.0));
        registry.push(Connector::new(3.0, 0.0, 4.0, GroundState::Above));

        let mut dump = PointDump::new();
        dump.on_solved(&registry, &[0.5, 5.0]);
        assert_eq!(dump.records().len(), 2);
        assert_eq!(dump.records()[1].height, 5.0);

        let mut out = Vec::new();
        dump.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("id,x,z,ground_state,height,graph_node"));
        assert_eq!(lines.next(), Some("0,1.0,2.0,on_ground,0.5,false"));
        assert_eq!(lines.next(), Some("1,3.0,4.0,above,5.0,false"));
    }
}
