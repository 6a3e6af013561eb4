use crate::connector::GroundState;
use crate::error::EnforcerError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Which enforcer implementation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcerKind {
    /// Keeps terrain elevation, ignores every constraint.
    None,
    /// Boundary heights plus linear interpolation along each road.
    Interpolated,
    /// Union-find grouping plus heat equation relaxation over the road graph.
    #[default]
    Diffusion,
}

impl FromStr for EnforcerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "noop" | "no-op" => Ok(EnforcerKind::None),
            "interpolated" | "simple" | "linear" => Ok(EnforcerKind::Interpolated),
            "diffusion" | "heat" => Ok(EnforcerKind::Diffusion),
            _ => Err(format!(
                "Unknown enforcer strategy: '{}'. Valid options: none, interpolated, diffusion",
                s
            )),
        }
    }
}

impl std::fmt::Display for EnforcerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EnforcerKind::None => "none",
            EnforcerKind::Interpolated => "interpolated",
            EnforcerKind::Diffusion => "diffusion",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Edge length of one spatial bucket
    pub cell_size: f64,
    /// Connectors this close to a bucket edge are also stored in the neighbour
    pub margin: f64,
    /// Horizontal distance under which two connectors count as the same point
    pub coincidence_tolerance: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: 100.0,
            margin: 1.0,
            coincidence_tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffusionConfig {
    pub dt: f64,
    pub conductance: f64,
    /// Floor for the squared edge length in the coupling term
    pub min_distance_sq: f64,
    pub total_time: f64,
    /// Overrides `total_time / dt` when set
    pub max_steps: Option<usize>,
    /// Stop once no free connector moves more than this in one step
    pub tolerance: Option<f64>,
    pub above_height: f64,
    pub below_height: f64,
    pub subdivide_centerlines: bool,
}

impl Default for DiffusionConfig {
    fn default() -> Self {
        Self {
            dt: 0.01,
            conductance: 1.0,
            min_distance_sq: 5.0,
            total_time: 100.0,
            max_steps: None,
            tolerance: Some(1e-9),
            above_height: 5.0,
            below_height: -5.0,
            subdivide_centerlines: true,
        }
    }
}

impl DiffusionConfig {
    pub fn step_budget(&self) -> usize {
        self.max_steps
            .unwrap_or_else(|| (self.total_time / self.dt).ceil().max(0.0) as usize)
    }

    /// Pinned height for a ground state, `None` for connectors on the ground.
    pub fn shelf_height(&self, state: GroundState) -> Option<f64> {
        match state {
            GroundState::OnGround => None,
            GroundState::Above => Some(self.above_height),
            GroundState::Below => Some(self.below_height),
        }
    }

    pub fn initial_height(&self, state: GroundState) -> f64 {
        self.shelf_height(state).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnforcerConfig {
    pub strategy: EnforcerKind,
    pub grid: GridConfig,
    pub diffusion: DiffusionConfig,
}

fn positive(name: &str, value: f64) -> Result<(), EnforcerError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EnforcerError::InvalidConfig(format!(
            "{} must be finite and positive, got {}",
            name, value
        )))
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), EnforcerError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EnforcerError::InvalidConfig(format!(
            "{} must be finite and non-negative, got {}",
            name, value
        )))
    }
}

impl EnforcerConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading enforcer config {}", path.display()))?;
        let config: EnforcerConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing enforcer config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EnforcerError> {
        if !self.grid.cell_size.is_finite() || self.grid.cell_size <= 0.0 {
            return Err(EnforcerError::InvalidCellSize(self.grid.cell_size));
        }
        non_negative("grid.margin", self.grid.margin)?;
        non_negative("grid.coincidence_tolerance", self.grid.coincidence_tolerance)?;

        let d = &self.diffusion;
        positive("diffusion.dt", d.dt)?;
        positive("diffusion.conductance", d.conductance)?;
        positive("diffusion.min_distance_sq", d.min_distance_sq)?;
        non_negative("diffusion.total_time", d.total_time)?;
        if let Some(tolerance) = d.tolerance {
            non_negative("diffusion.tolerance", tolerance)?;
        }
        if !(d.above_height.is_finite() && d.below_height.is_finite())
            || d.above_height < d.below_height
        {
            return Err(EnforcerError::InvalidConfig(format!(
                "above_height ({}) must be finite and not below below_height ({})",
                d.above_height, d.below_height
            )));
        }
        Ok(())
    }
}
