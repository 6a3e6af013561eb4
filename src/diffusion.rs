// ===========================================================================
// Explicit heat-equation relaxation of connector heights over the graph
// ===========================================================================
//
// Heights here are offsets from local ground, not absolute elevations. ABOVE
// and BELOW connectors are Dirichlet boundaries and get re-clamped after every
// step; ON_GROUND connectors relax towards their neighbours.

use crate::config::DiffusionConfig;
use crate::connector::{ConnectorId, GroundState};
use crate::graph::ConnectivityGraph;
use crate::observer::SolveObserver;
use log::{debug, info, warn};
use std::time::Instant;

/// Double buffered height per connector, indexed by connector id.
#[derive(Debug, Clone)]
pub struct HeightField {
    current: Vec<f64>,
    next: Vec<f64>,
}

impl HeightField {
    pub fn new(heights: Vec<f64>) -> Self {
        Self {
            next: heights.clone(),
            current: heights,
        }
    }

    /// 0 for connectors on the ground, the shelf height for pinned ones.
    pub fn from_ground_states(states: &[GroundState], config: &DiffusionConfig) -> Self {
        Self::new(states.iter().map(|&s| config.initial_height(s)).collect())
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn get(&self, id: ConnectorId) -> f64 {
        self.current[id.index()]
    }

    pub fn values(&self) -> &[f64] {
        &self.current
    }

    pub fn into_values(self) -> Vec<f64> {
        self.current
    }

    fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveReport {
    pub steps: usize,
    pub simulated_time: f64,
    /// Largest change of a free connector during the last step, summed over
    /// its sub-steps.
    pub max_delta: f64,
    /// Stopped early because `max_delta` fell to the tolerance.
    pub converged: bool,
    /// Sub-steps per step, above 1 when `dt` was too coarse for the graph.
    pub substeps: usize,
}

pub struct DiffusionSolver<'a> {
    config: &'a DiffusionConfig,
}

impl<'a> DiffusionSolver<'a> {
    pub fn new(config: &'a DiffusionConfig) -> Self {
        Self { config }
    }

    fn coupling(&self, distance: f64) -> f64 {
        self.config.conductance / (distance * distance).max(self.config.min_distance_sq)
    }

    /// Forces every pinned connector back onto its shelf height.
    pub fn clamp_boundaries(&self, states: &[GroundState], heights: &mut [f64]) {
        for (h, &state) in heights.iter_mut().zip(states) {
            if let Some(shelf) = self.config.shelf_height(state) {
                *h = shelf;
            }
        }
    }

    /// Largest `dt * sum(coupling)` over the free connectors in `nodes`.
    /// Above 1 an explicit step overshoots its neighbours and oscillates.
    pub fn stability(
        &self,
        graph: &ConnectivityGraph,
        nodes: &[ConnectorId],
        states: &[GroundState],
    ) -> f64 {
        nodes
            .iter()
            .filter(|a| !states[a.index()].is_pinned())
            .map(|&a| {
                let rate: f64 = graph
                    .neighbors(a)
                    .iter()
                    .map(|e| self.coupling(e.distance))
                    .sum();
                self.config.dt * rate
            })
            .fold(0.0, f64::max)
    }

    /// One explicit Euler step of the configured `dt` over `nodes`. Returns
    /// the largest absolute change of any free connector.
    pub fn step(
        &self,
        graph: &ConnectivityGraph,
        nodes: &[ConnectorId],
        states: &[GroundState],
        field: &mut HeightField,
    ) -> f64 {
        self.step_by(self.config.dt, graph, nodes, states, field)
    }

    fn step_by(
        &self,
        dt: f64,
        graph: &ConnectivityGraph,
        nodes: &[ConnectorId],
        states: &[GroundState],
        field: &mut HeightField,
    ) -> f64 {
        field.next.copy_from_slice(&field.current);

        let mut max_delta: f64 = 0.0;
        for &a in nodes {
            if states[a.index()].is_pinned() {
                continue;
            }
            let h = field.current[a.index()];
            let dhdt: f64 = graph
                .neighbors(a)
                .iter()
                .map(|e| -self.coupling(e.distance) * (h - field.current[e.to.index()]))
                .sum();
            let updated = h + dt * dhdt;
            max_delta = max_delta.max((updated - h).abs());
            field.next[a.index()] = updated;
        }

        self.clamp_boundaries(states, &mut field.next);
        field.swap();
        max_delta
    }

    /// Runs until the step budget is spent or, with a tolerance configured,
    /// until no free connector moves more than the tolerance in one step.
    ///
    /// When `dt` is too coarse for the stiffest free connector each step is
    /// split into equal sub-steps, so the simulated time stays the same.
    pub fn solve(
        &self,
        graph: &ConnectivityGraph,
        states: &[GroundState],
        field: &mut HeightField,
        observer: &mut dyn SolveObserver,
    ) -> SolveReport {
        self.clamp_boundaries(states, &mut field.current);
        field.next.copy_from_slice(&field.current);

        let nodes: Vec<ConnectorId> = graph.nodes().collect();
        let budget = self.config.step_budget();

        let mut report = SolveReport {
            steps: 0,
            simulated_time: 0.0,
            max_delta: 0.0,
            converged: nodes.is_empty(),
            substeps: 1,
        };
        if nodes.is_empty() {
            debug!("diffusion: empty graph, nothing to relax");
            return report;
        }

        let stability = self.stability(graph, &nodes, states);
        if stability > 1.0 {
            report.substeps = stability.ceil() as usize;
            warn!(
                "diffusion: dt {} is unstable for this graph (dt * rate = {:.3}), \
                 splitting each step into {} sub-steps",
                self.config.dt, stability, report.substeps
            );
        }
        let sub_dt = self.config.dt / report.substeps as f64;

        let start_time = Instant::now();
        let mut last_report = start_time;

        for step in 0..budget {
            let max_delta: f64 = (0..report.substeps)
                .map(|_| self.step_by(sub_dt, graph, &nodes, states, field))
                .sum();
            observer.on_step(step, max_delta);

            report.steps = step + 1;
            report.max_delta = max_delta;

            if self.config.tolerance.is_some_and(|tol| max_delta <= tol) {
                report.converged = true;
                break;
            }

            if last_report.elapsed().as_secs() >= 5 {
                last_report = Instant::now();
                info!(
                    "diffusion: step {}/{} max delta {:e} {}ms",
                    step + 1,
                    budget,
                    max_delta,
                    start_time.elapsed().as_millis()
                );
            }
        }

        report.simulated_time = report.steps as f64 * self.config.dt;
        report
    }
}
