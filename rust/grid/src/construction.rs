// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Construction and editing of grid entities.
//!
//! Every edit goes through the arena so referential integrity holds (all
//! referenced nodes exist, no edge carries more than two loops) and the
//! adjacency indices stay in sync. Edges are created on demand when a loop
//! needs them and removed when their last loop goes away. Edits validate
//! before they mutate, so a failed edit leaves the grid untouched.

use nalgebra::Point3;
use smallvec::SmallVec;

use crate::arena::*;
use crate::bc::BoundaryCondition;
use crate::error::{Error, Result};
use crate::keys::*;

impl Grid {
    /// Adds a node at the given coordinates.
    pub fn add_node(&mut self, x: f64, y: f64, z: f64) -> NodeKey {
        self.add_node_at(Point3::new(x, y, z))
    }

    /// Adds a node at the given point.
    pub fn add_node_at(&mut self, position: Point3<f64>) -> NodeKey {
        self.nodes.insert(NodeData {
            position,
            bc: BoundaryCondition::Interior,
            fixed_bc: None,
            on_surface_border: false,
            degenerate: false,
        })
    }

    /// Moves a node. Loops keep their connectivity.
    pub fn move_node(&mut self, key: NodeKey, position: Point3<f64>) -> Result<()> {
        let node = self
            .nodes
            .get_mut(key)
            .ok_or(Error::NotFound(GridKey::Node(key)))?;
        node.position = position;
        Ok(())
    }

    /// Removes a node that no loop references.
    ///
    /// Returns `false` (and keeps the node) while any loop still uses it.
    pub fn remove_node(&mut self, key: NodeKey) -> bool {
        if self.node_to_loops.contains_key(&key) || self.node_to_edges.contains_key(&key) {
            return false;
        }
        self.nodes.remove(key).is_some()
    }

    /// Creates a loop from an ordered node cycle.
    ///
    /// Missing edges are created with an INTERIOR tag; existing edges gain
    /// the loop as a side. Returns an error if a node is missing or repeated,
    /// fewer than three nodes are given, or an edge already has two loops.
    pub fn add_loop(&mut self, nodes: &[NodeKey], surface: u32) -> Result<LoopKey> {
        self.add_loop_from(nodes, surface, &[])
    }

    /// Creates a loop that records the parent-grid loops it was built from.
    pub fn add_loop_from(
        &mut self,
        nodes: &[NodeKey],
        surface: u32,
        fine_loops: &[LoopKey],
    ) -> Result<LoopKey> {
        self.validate_cycle(nodes, None)?;

        let key = self.loops.insert(LoopData {
            nodes: nodes.to_vec(),
            edges: Vec::with_capacity(nodes.len()),
            surface,
            fine_loops: SmallVec::from_slice(fine_loops),
        });
        self.attach_loop(key);
        Ok(key)
    }

    /// Replaces the node cycle of an existing loop, keeping its key.
    ///
    /// Edges shared by the old and new cycle keep their key and tag; edges
    /// left without any loop are removed.
    pub fn replace_loop_nodes(&mut self, key: LoopKey, nodes: &[NodeKey]) -> Result<()> {
        if !self.loops.contains_key(key) {
            return Err(Error::NotFound(GridKey::Loop(key)));
        }
        self.validate_cycle(nodes, Some(key))?;

        let old_edges = self.detach_loop(key);
        if let Some(data) = self.loops.get_mut(key) {
            data.nodes = nodes.to_vec();
            data.edges.clear();
        }
        self.attach_loop(key);
        self.prune_edges(&old_edges);
        Ok(())
    }

    /// Removes a loop and any edge left without loops.
    pub fn remove_loop(&mut self, key: LoopKey) -> Option<LoopData> {
        if !self.loops.contains_key(key) {
            return None;
        }
        let old_edges = self.detach_loop(key);
        self.prune_edges(&old_edges);
        self.loops.remove(key)
    }

    /// Sets the tag of an edge.
    pub fn set_edge_bc(&mut self, key: EdgeKey, bc: BoundaryCondition) -> Result<()> {
        let edge = self
            .edges
            .get_mut(key)
            .ok_or(Error::NotFound(GridKey::Edge(key)))?;
        edge.bc = bc;
        Ok(())
    }

    /// Pins a node tag supplied by the surface definition.
    ///
    /// Classification combines the pinned tag with the derived one and keeps
    /// the more restrictive of the two.
    pub fn set_node_bc(&mut self, key: NodeKey, bc: BoundaryCondition) -> Result<()> {
        let node = self
            .nodes
            .get_mut(key)
            .ok_or(Error::NotFound(GridKey::Node(key)))?;
        node.fixed_bc = Some(bc);
        node.bc = node.bc.most_restrictive(bc);
        Ok(())
    }

    /// Checks that `nodes` can become the cycle of a loop. Sides held by
    /// `replacing` are treated as free.
    pub(crate) fn validate_cycle(&self, nodes: &[NodeKey], replacing: Option<LoopKey>) -> Result<()> {
        for (i, &n) in nodes.iter().enumerate() {
            if !self.nodes.contains_key(n) {
                return Err(Error::NotFound(GridKey::Node(n)));
            }
            if nodes[..i].contains(&n) {
                return Err(Error::RepeatedNode(n));
            }
        }
        if nodes.len() < 3 {
            return Err(Error::DegenerateLoop(nodes.len()));
        }

        for i in 0..nodes.len() {
            let a = nodes[i];
            let b = nodes[(i + 1) % nodes.len()];
            if let Some(&ek) = self.edge_lookup.get(&Self::pair(a, b)) {
                let edge = &self.edges[ek];
                let taken = edge
                    .sides
                    .iter()
                    .filter(|s| s.is_some() && **s != replacing)
                    .count();
                if taken >= 2 {
                    return Err(Error::NonManifoldEdge(ek));
                }
            }
        }
        Ok(())
    }

    /// Links a loop whose node cycle is already stored and validated.
    fn attach_loop(&mut self, key: LoopKey) {
        let nodes = self.loops[key].nodes.clone();
        let mut edges = Vec::with_capacity(nodes.len());

        for i in 0..nodes.len() {
            let a = nodes[i];
            let b = nodes[(i + 1) % nodes.len()];
            let ek = self.edge_or_insert(a, b);
            let edge = &mut self.edges[ek];
            if edge.sides[0].is_none() {
                edge.sides[0] = Some(key);
            } else {
                edge.sides[1] = Some(key);
            }
            edges.push(ek);
            self.link_node_loop(a, key);
        }

        self.loops[key].edges = edges;
    }

    /// Clears the loop from its edges and nodes, returning the old edges.
    fn detach_loop(&mut self, key: LoopKey) -> Vec<EdgeKey> {
        let (nodes, edges) = {
            let data = &self.loops[key];
            (data.nodes.clone(), data.edges.clone())
        };

        for &ek in &edges {
            if let Some(edge) = self.edges.get_mut(ek) {
                for side in edge.sides.iter_mut() {
                    if *side == Some(key) {
                        *side = None;
                    }
                }
                // Keep Side[0] filled when only one loop remains.
                if edge.sides[0].is_none() {
                    edge.sides.swap(0, 1);
                }
            }
        }
        for &n in &nodes {
            self.unlink_node_loop(n, key);
        }
        edges
    }

    fn edge_or_insert(&mut self, a: NodeKey, b: NodeKey) -> EdgeKey {
        let pair = Self::pair(a, b);
        if let Some(&ek) = self.edge_lookup.get(&pair) {
            return ek;
        }
        let ek = self.edges.insert(EdgeData {
            nodes: [pair.0, pair.1],
            sides: [None, None],
            bc: BoundaryCondition::Interior,
        });
        self.edge_lookup.insert(pair, ek);
        self.link_node_edge(a, ek);
        self.link_node_edge(b, ek);
        ek
    }

    /// Removes the listed edges that no longer border any loop.
    fn prune_edges(&mut self, candidates: &[EdgeKey]) {
        for &ek in candidates {
            let orphan = self
                .edges
                .get(ek)
                .is_some_and(|e| e.side_count() == 0);
            if !orphan {
                continue;
            }
            if let Some(edge) = self.edges.remove(ek) {
                self.edge_lookup.remove(&Self::pair(edge.nodes[0], edge.nodes[1]));
                self.unlink_node_edge(edge.nodes[0], ek);
                self.unlink_node_edge(edge.nodes[1], ek);
            }
        }
    }
}

/// Helper to build a unit-spaced rectangular patch of `nx` by `ny` squares,
/// each split into two triangles along the `(i, j) -> (i + 1, j + 1)` diagonal.
///
/// Returns the grid and its nodes in row-major order (`(nx + 1) * (ny + 1)`).
/// Boundaries are classified with the default corner angle.
pub fn make_triangle_strip(nx: usize, ny: usize) -> Result<(Grid, Vec<NodeKey>)> {
    let mut grid = Grid::new();
    let mut nodes = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            nodes.push(grid.add_node(i as f64, j as f64, 0.0));
        }
    }

    let at = |i: usize, j: usize| nodes[j * (nx + 1) + i];
    for j in 0..ny {
        for i in 0..nx {
            grid.add_loop(&[at(i, j), at(i + 1, j), at(i + 1, j + 1)], 0)?;
            grid.add_loop(&[at(i, j), at(i + 1, j + 1), at(i, j + 1)], 0)?;
        }
    }
    grid.classify_boundaries(crate::DEFAULT_CORNER_ANGLE);
    Ok((grid, nodes))
}
