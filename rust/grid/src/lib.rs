// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Vortex Grid
//!
//! Arena-based surface grid for vortex-loop solvers.
//!
//! Nodes, edges and loops (triangles, quadrilaterals and general simple
//! polygons) are stored in slot maps and addressed by stable generational
//! keys. Each edge records the loops on its two sides and carries a
//! boundary-condition tag (corner, trailing edge, leading edge, boundary,
//! interior). The grid answers the adjacency and geometry queries that the
//! multigrid agglomeration engine needs and round-trips through an
//! index-based JSON snapshot.

pub mod arena;
pub mod bc;
pub mod classify;
pub mod construction;
pub mod error;
pub mod geometry;
pub mod keys;
pub mod serialization;
pub mod spatial;
pub mod traversal;

pub use arena::{EdgeData, Grid, LoopData, NodeData};
pub use bc::BoundaryCondition;
pub use error::{Error, Result};
pub use keys::{EdgeKey, EntityKind, GridKey, LoopKey, NodeKey};
pub use serialization::GridSnapshot;
pub use spatial::SpatialIndex;
pub use traversal::Neighbor;

/// Default turning angle (degrees) above which a border node is a CORNER.
pub const DEFAULT_CORNER_ANGLE: f64 = 30.0;
