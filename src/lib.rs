// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

//! Elevation constraint enforcement for road and bridge connectors.
//!
//! Feature modules register [`connector::Connector`]s and declare constraints
//! between them; an [`enforcer::EleConstraintEnforcer`] then turns those into
//! concrete elevations. The diffusion strategy groups coincident connectors with
//! a union-find, builds a distance weighted graph along the road network, relaxes
//! it with an explicit heat-equation solver and fans the result out to lane edges.

#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::repeat_once,
    clippy::deref_addrof,
    clippy::suspicious_map,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::cmp_null,
    clippy::op_ref
)]

pub mod config;
pub mod connector;
pub mod diffusion;
pub mod enforcer;
pub mod error;
pub mod graph;
pub mod lanes;
pub mod observer;
pub mod spatial_index;
pub mod stiff_groups;
pub mod topology;

pub use config::{DiffusionConfig, EnforcerConfig, EnforcerKind, GridConfig};
pub use connector::{Connector, ConnectorId, ConnectorRegistry, GroundState};
pub use enforcer::{ConstraintType, EleConstraintEnforcer, build_enforcer};
pub use error::EnforcerError;
pub use topology::{MapNodeId, RoadId, RoadNetwork, RoadSegment, RoadTopology};
