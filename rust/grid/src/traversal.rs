// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Neighbor queries: edges and loops around a node, loops across an edge.

use crate::arena::Grid;
use crate::keys::*;

/// A loop found across one of another loop's edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    /// The loop on the far side of the edge.
    pub lp: LoopKey,
    /// The shared edge.
    pub edge: EdgeKey,
    /// Endpoints of the shared edge, in the query loop's traversal order.
    pub nodes: [NodeKey; 2],
}

impl Grid {
    /// Returns the edge joining two nodes, if one exists.
    pub fn edge_between(&self, a: NodeKey, b: NodeKey) -> Option<EdgeKey> {
        self.edge_lookup.get(&Self::pair(a, b)).copied()
    }

    /// Returns the endpoints of an edge.
    pub fn edge_nodes(&self, key: EdgeKey) -> Option<[NodeKey; 2]> {
        self.edges.get(key).map(|e| e.nodes)
    }

    /// Returns the edges incident to a node.
    pub fn node_edges(&self, key: NodeKey) -> &[EdgeKey] {
        self.node_to_edges
            .get(&key)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Returns the loops using a node.
    pub fn node_loops(&self, key: NodeKey) -> &[LoopKey] {
        self.node_to_loops
            .get(&key)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Finds the loop across local edge `local_edge` of `lp`
    /// (FindNeighborLoopOnLocalEdge).
    ///
    /// Returns `None` if the local index is out of range or the edge lies on
    /// the surface border.
    pub fn find_neighbor_loop_on_local_edge(&self, lp: LoopKey, local_edge: usize) -> Option<Neighbor> {
        let data = self.loops.get(lp)?;
        let edge = *data.edges.get(local_edge)?;
        let other = self.edges.get(edge)?.other_side(lp)?;
        let n = data.nodes.len();
        Some(Neighbor {
            lp: other,
            edge,
            nodes: [data.nodes[local_edge], data.nodes[(local_edge + 1) % n]],
        })
    }

    /// Finds the loop across global edge `edge` of `lp` (FindNeighborLoopOnEdge).
    ///
    /// Returns `None` if `lp` does not use the edge or nothing lies across it.
    pub fn find_neighbor_loop_on_edge(&self, lp: LoopKey, edge: EdgeKey) -> Option<Neighbor> {
        let local = self.loops.get(lp)?.local_edge_index(edge)?;
        self.find_neighbor_loop_on_local_edge(lp, local)
    }

    /// Returns every loop sharing an edge with `lp`, in local edge order.
    pub fn loop_neighbors(&self, lp: LoopKey) -> Vec<Neighbor> {
        let Some(data) = self.loops.get(lp) else {
            return Vec::new();
        };
        (0..data.edges.len())
            .filter_map(|i| self.find_neighbor_loop_on_local_edge(lp, i))
            .collect()
    }

    /// Returns the edges shared by two loops.
    pub fn shared_edges(&self, a: LoopKey, b: LoopKey) -> Vec<EdgeKey> {
        let Some(data) = self.loops.get(a) else {
            return Vec::new();
        };
        data.edges
            .iter()
            .copied()
            .filter(|&ek| self.edges.get(ek).is_some_and(|e| e.has_side(b)))
            .collect()
    }

    /// Returns the loops around a node ordered by edge adjacency, split into
    /// fans. A manifold node has exactly one fan; a pinched node has several.
    pub fn node_fans(&self, node: NodeKey) -> Vec<Vec<LoopKey>> {
        let loops = self.node_loops(node);
        let mut fans: Vec<Vec<LoopKey>> = Vec::new();
        let mut seen: Vec<LoopKey> = Vec::with_capacity(loops.len());

        for &start in loops {
            if seen.contains(&start) {
                continue;
            }
            let mut fan = vec![start];
            seen.push(start);
            let mut stack = vec![start];
            while let Some(lp) = stack.pop() {
                for &ek in self.node_edges(node) {
                    let Some(edge) = self.edges.get(ek) else { continue };
                    if let Some(next) = edge.other_side(lp) {
                        if !seen.contains(&next) {
                            seen.push(next);
                            fan.push(next);
                            stack.push(next);
                        }
                    }
                }
            }
            fans.push(fan);
        }
        fans
    }
}
