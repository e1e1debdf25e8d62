// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for agglomeration and cleanup.

use crate::check::MeshViolation;

/// Result type alias for agglomeration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while coarsening or cleaning a grid.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The fine grid handed to the agglomerator is not a valid mesh.
    #[error("input mesh is invalid ({} violation(s)): {}", .0.len(), first(.0))]
    InvalidInputMesh(Vec<MeshViolation>),

    /// The assembled coarse grid failed the final consistency check.
    #[error("coarse mesh is invalid ({} violation(s)): {}", .0.len(), first(.0))]
    InvalidCoarseMesh(Vec<MeshViolation>),

    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An underlying grid edit failed.
    #[error(transparent)]
    Grid(#[from] vortex_grid::Error),
}

fn first(violations: &[MeshViolation]) -> String {
    match violations.first() {
        Some(v) if violations.len() > 1 => format!("{v}, ..."),
        Some(v) => v.to_string(),
        None => String::from("none"),
    }
}
