// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for grid operations.

use crate::keys::*;

/// Result type alias for grid operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during grid operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A referenced grid entity was not found in the arena.
    #[error("{} not found: {0:?}", .0.kind())]
    NotFound(GridKey),

    /// A loop needs at least three distinct nodes.
    #[error("loop has {0} distinct nodes, at least 3 are required")]
    DegenerateLoop(usize),

    /// A loop visits the same node twice.
    #[error("loop visits node {0:?} more than once")]
    RepeatedNode(NodeKey),

    /// An edge would be shared by more than two loops.
    #[error("edge {0:?} already has two adjacent loops")]
    NonManifoldEdge(EdgeKey),

    /// A snapshot references a node index outside its node list.
    #[error("snapshot references node {index} but only {count} nodes exist")]
    NodeIndexOutOfRange { index: usize, count: usize },

    /// A snapshot edge tag names a node pair that no loop uses.
    #[error("edge tag references nodes {0} and {1}, which share no edge")]
    UnknownEdge(usize, usize),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}
