// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Index-based snapshots of grids, with JSON round trips.
//!
//! A snapshot lists node coordinates, loops as node-index cycles, and the
//! explicit edge tags. It is the interchange format between the surrounding
//! application and the arena: slot keys are replaced by dense indices in
//! slot order, so a snapshot of a rebuilt grid is stable.

use serde::{Deserialize, Serialize};

use crate::arena::Grid;
use crate::bc::BoundaryCondition;
use crate::error::{Error, Result};
use crate::keys::*;

/// Serializable representation of a whole grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub loops: Vec<LoopSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edge_tags: Vec<EdgeTagSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Tag pinned by the surface definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bc: Option<BoundaryCondition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopSnapshot {
    pub nodes: Vec<usize>,
    #[serde(default)]
    pub surface: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeTagSnapshot {
    pub nodes: [usize; 2],
    pub bc: BoundaryCondition,
}

impl GridSnapshot {
    /// Starts a snapshot from node coordinates.
    pub fn from_points(points: &[[f64; 3]]) -> Self {
        Self {
            nodes: points
                .iter()
                .map(|&[x, y, z]| NodeSnapshot { x, y, z, bc: None })
                .collect(),
            ..Default::default()
        }
    }

    /// Adds a loop given as node indices.
    #[must_use]
    pub fn with_loop(mut self, nodes: &[usize], surface: u32) -> Self {
        self.loops.push(LoopSnapshot {
            nodes: nodes.to_vec(),
            surface,
        });
        self
    }

    /// Tags the edge between two node indices.
    #[must_use]
    pub fn with_edge_tag(mut self, a: usize, b: usize, bc: BoundaryCondition) -> Self {
        self.edge_tags.push(EdgeTagSnapshot { nodes: [a, b], bc });
        self
    }

    /// Serializes the snapshot to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserializes a snapshot from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }
}

impl Grid {
    /// Builds a grid from a snapshot and classifies its boundaries.
    pub fn from_snapshot(snapshot: &GridSnapshot, corner_angle: f64) -> Result<Self> {
        let mut grid = Grid::new();
        let count = snapshot.nodes.len();

        let keys: Vec<NodeKey> = snapshot
            .nodes
            .iter()
            .map(|n| grid.add_node(n.x, n.y, n.z))
            .collect();
        let key_of = |index: usize| {
            keys.get(index)
                .copied()
                .ok_or(Error::NodeIndexOutOfRange { index, count })
        };

        for lp in &snapshot.loops {
            let nodes = lp
                .nodes
                .iter()
                .map(|&i| key_of(i))
                .collect::<Result<Vec<_>>>()?;
            grid.add_loop(&nodes, lp.surface)?;
        }

        for tag in &snapshot.edge_tags {
            let [a, b] = tag.nodes;
            let edge = grid
                .edge_between(key_of(a)?, key_of(b)?)
                .ok_or(Error::UnknownEdge(a, b))?;
            grid.set_edge_bc(edge, tag.bc)?;
        }

        for (node, key) in snapshot.nodes.iter().zip(&keys) {
            if let Some(bc) = node.bc {
                grid.set_node_bc(*key, bc)?;
            }
        }

        grid.classify_boundaries(corner_angle);
        Ok(grid)
    }

    /// Captures the grid as a dense, index-based snapshot.
    pub fn to_snapshot(&self) -> GridSnapshot {
        let index: rustc_hash::FxHashMap<NodeKey, usize> = self
            .nodes
            .keys()
            .enumerate()
            .map(|(i, k)| (k, i))
            .collect();

        let nodes = self
            .nodes
            .values()
            .map(|n| NodeSnapshot {
                x: n.position.x,
                y: n.position.y,
                z: n.position.z,
                bc: n.fixed_bc,
            })
            .collect();

        let loops = self
            .loops
            .values()
            .map(|l| LoopSnapshot {
                nodes: l.nodes.iter().map(|n| index[n]).collect(),
                surface: l.surface,
            })
            .collect();

        let edge_tags = self
            .edges
            .values()
            .filter(|e| !e.bc.is_interior())
            .map(|e| EdgeTagSnapshot {
                nodes: [index[&e.nodes[0]], index[&e.nodes[1]]],
                bc: e.bc,
            })
            .collect();

        GridSnapshot {
            nodes,
            loops,
            edge_tags,
        }
    }
}
