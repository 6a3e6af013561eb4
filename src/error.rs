use crate::connector::ConnectorId;
use crate::stiff_groups::GroupId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnforcerError {
    #[error("Invalid cell bounds: min ({min_x}, {min_z}) exceeds max ({max_x}, {max_z})")]
    InvalidCellBounds {
        min_x: f64,
        min_z: f64,
        max_x: f64,
        max_z: f64,
    },
    #[error("Invalid grid cell size {0}, must be finite and positive")]
    InvalidCellSize(f64),
    #[error("Constraints were already enforced, no further declarations or solves are accepted")]
    AlreadyEnforced,
    #[error("Unknown connector {0}")]
    UnknownConnector(ConnectorId),
    #[error("Stiff group {0} was merged into another group and can no longer be used")]
    MergedGroup(GroupId),
    #[error("{0} does not name a stiff group")]
    NotAGroup(GroupId),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
