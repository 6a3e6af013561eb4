// ===========================================================================
// Grid bucket index for connectors (broad phase for coincidence tests)
// ===========================================================================
use crate::connector::ConnectorId;
use crate::error::EnforcerError;
use ahash::AHashMap;
use itertools::Itertools;

/// Integer grid coordinates of a bucket, `floor(x / size)` and `floor(z / size)`.
pub type CellKey = (i64, i64);

/// Axis aligned bounds of one bucket on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBounds {
    pub min_x: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_z: f64,
}

impl CellBounds {
    pub fn new(min_x: f64, min_z: f64, max_x: f64, max_z: f64) -> Result<Self, EnforcerError> {
        // negated comparisons so NaN bounds are rejected too
        if !(min_x <= max_x) || !(min_z <= max_z) {
            return Err(EnforcerError::InvalidCellBounds {
                min_x,
                min_z,
                max_x,
                max_z,
            });
        }
        Ok(Self {
            min_x,
            min_z,
            max_x,
            max_z,
        })
    }

    /// Inclusive containment test with the bounds grown by `margin` on every side.
    pub fn contains(&self, x: f64, z: f64, margin: f64) -> bool {
        x >= self.min_x - margin
            && x <= self.max_x + margin
            && z >= self.min_z - margin
            && z <= self.max_z + margin
    }
}

/// Buckets connectors into fixed size cells. A connector lying within `margin`
/// of a cell edge is stored in the neighbouring cell as well, so two
/// coincident points never end up in disjoint buckets.
#[derive(Debug, Clone)]
pub struct ConnectorGridIndex {
    cell_size: f64,
    margin: f64,
    cells: AHashMap<CellKey, Vec<ConnectorId>>,
}

impl ConnectorGridIndex {
    pub fn new(cell_size: f64, margin: f64) -> Result<Self, EnforcerError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(EnforcerError::InvalidCellSize(cell_size));
        }
        if !margin.is_finite() || margin < 0.0 {
            return Err(EnforcerError::InvalidConfig(format!(
                "grid margin must be finite and non-negative, got {}",
                margin
            )));
        }
        Ok(Self {
            cell_size,
            margin,
            cells: AHashMap::new(),
        })
    }

    pub fn build<I>(cell_size: f64, margin: f64, connectors: I) -> Result<Self, EnforcerError>
    where
        I: IntoIterator<Item = (ConnectorId, [f64; 3])>,
    {
        let mut index = Self::new(cell_size, margin)?;
        for (id, pos) in connectors {
            index.insert(id, pos[0], pos[2])?;
        }
        Ok(index)
    }

    pub fn cell_key(&self, x: f64, z: f64) -> CellKey {
        (
            (x / self.cell_size).floor() as i64,
            (z / self.cell_size).floor() as i64,
        )
    }

    pub fn cell_bounds(&self, key: CellKey) -> Result<CellBounds, EnforcerError> {
        let min_x = key.0 as f64 * self.cell_size;
        let min_z = key.1 as f64 * self.cell_size;
        CellBounds::new(min_x, min_z, min_x + self.cell_size, min_z + self.cell_size)
    }

    /// Every cell whose margin-expanded bounds contain the point.
    pub fn keys_containing(&self, x: f64, z: f64) -> Result<Vec<CellKey>, EnforcerError> {
        let min_c = self.cell_key(x - self.margin, z - self.margin);
        let max_c = self.cell_key(x + self.margin, z + self.margin);

        let mut keys = Vec::new();
        for cx in min_c.0..=max_c.0 {
            for cz in min_c.1..=max_c.1 {
                if self.cell_bounds((cx, cz))?.contains(x, z, self.margin) {
                    keys.push((cx, cz));
                }
            }
        }
        Ok(keys)
    }

    pub fn insert(&mut self, id: ConnectorId, x: f64, z: f64) -> Result<(), EnforcerError> {
        for key in self.keys_containing(x, z)? {
            self.cells.entry(key).or_default().push(id);
        }
        Ok(())
    }

    /// Candidate neighbours of a point: the union of the buckets it falls into.
    pub fn query(&self, x: f64, z: f64) -> Result<Vec<ConnectorId>, EnforcerError> {
        let candidates = self
            .keys_containing(x, z)?
            .into_iter()
            .filter_map(|key| self.cells.get(&key))
            .flatten()
            .copied()
            .sorted_unstable()
            .dedup()
            .collect();
        Ok(candidates)
    }

    pub fn bucket(&self, key: CellKey) -> &[ConnectorId] {
        self.cells.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn bucket_count(&self) -> usize {
        self.cells.len()
    }
}
