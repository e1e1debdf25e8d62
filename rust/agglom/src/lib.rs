// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Vortex Agglomeration
//!
//! Coarsens a fine vortex-loop surface grid for a multigrid solver.
//!
//! Fine loops are paired across shared INTERIOR edges by an advancing front
//! that prefers well-shaped quadrilaterals, never merges across trailing
//! edges, leading edges or surface borders, and leaves unmergeable loops
//! as they are. The coarse grid is then cleaned (duplicate nodes, slivers,
//! stretched triangles, tiny loops, fans, hanging nodes) and validated.
//!
//! ```no_run
//! use vortex_agglom::{AgglomConfig, Agglomerator};
//! use vortex_grid::construction::make_triangle_strip;
//!
//! let (fine, _) = make_triangle_strip(4, 1)?;
//! let coarse = Agglomerator::new(AgglomConfig::default())?.agglomerate(&fine)?;
//! assert_eq!(coarse.loop_count(), 4);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builder;
pub mod check;
pub mod cleanup;
pub mod config;
pub mod driver;
pub mod error;
pub mod front;
pub mod merge;
pub mod quality;
pub mod session;

pub use builder::CoarseLoopRecord;
pub use check::{check_mesh, fatal_violations, MeshViolation};
pub use cleanup::{clean_up_mesh, CleanupSummary};
pub use config::{AgglomConfig, AspectRatioMetric, AssemblyMode, MergePolicy};
pub use driver::{AgglomerationReport, Agglomerator};
pub use error::{Error, Result};
pub use front::{BoundaryCensus, EdgeStackEntry, EdgeState, Front};
pub use merge::{MergeCandidate, MergeOutcome, RejectReason};
pub use session::{AgglomerationSession, AgglomerationState, AgglomerationStats};
