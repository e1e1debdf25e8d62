// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Arena-based storage for vortex-loop grids.
//!
//! The [`Grid`] owns every node, edge and loop in slot maps with stable,
//! generational keys. Upward adjacency indices (node -> edges, node -> loops)
//! and an edge lookup by node pair keep neighbor queries O(1) on average.
//!
//! ## Manifold surface grids
//!
//! An edge borders at most two loops. The two loops are recorded in
//! [`EdgeData::sides`] (`Side[0]` and `Side[1]` in the solver's terms); an edge
//! with a single side lies on the surface border. Loop construction refuses
//! to attach a third loop to an edge.

use nalgebra::Point3;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::bc::BoundaryCondition;
use crate::keys::*;

/// Data stored for a node: a point on the surface plus its classification.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub position: Point3<f64>,
    /// Classification derived from the incident edges (see
    /// [`Grid::classify_boundaries`]), combined with `fixed_bc`.
    pub bc: BoundaryCondition,
    /// Tag pinned by the surface definition; classification never relaxes it.
    pub fixed_bc: Option<BoundaryCondition>,
    /// `true` if the node touches any non-interior edge.
    pub on_surface_border: bool,
    /// Set by cleanup when the node's loop fan is inconsistent.
    pub degenerate: bool,
}

/// Data stored for an edge: an undirected node pair and its adjacent loops.
#[derive(Debug, Clone)]
pub struct EdgeData {
    pub nodes: [NodeKey; 2],
    pub sides: [Option<LoopKey>; 2],
    pub bc: BoundaryCondition,
}

impl EdgeData {
    /// Number of loops attached to this edge (0, 1 or 2).
    pub fn side_count(&self) -> usize {
        self.sides.iter().filter(|s| s.is_some()).count()
    }

    /// `true` if `lp` is one of the edge's sides.
    pub fn has_side(&self, lp: LoopKey) -> bool {
        self.sides.contains(&Some(lp))
    }

    /// Returns the loop on the other side of `lp`, if any.
    pub fn other_side(&self, lp: LoopKey) -> Option<LoopKey> {
        match self.sides {
            [Some(a), b] if a == lp => b,
            [a, Some(b)] if b == lp => a,
            _ => None,
        }
    }

    /// Returns the endpoint opposite to `node`.
    pub fn other_node(&self, node: NodeKey) -> Option<NodeKey> {
        if self.nodes[0] == node {
            Some(self.nodes[1])
        } else if self.nodes[1] == node {
            Some(self.nodes[0])
        } else {
            None
        }
    }

    /// Both sides, when the edge is shared by two loops.
    pub fn both_sides(&self) -> Option<[LoopKey; 2]> {
        match self.sides {
            [Some(a), Some(b)] => Some([a, b]),
            _ => None,
        }
    }
}

/// Data stored for a loop: a closed polygon of nodes.
#[derive(Debug, Clone)]
pub struct LoopData {
    /// Nodes in traversal order. The polygon closes from the last node back
    /// to the first.
    pub nodes: Vec<NodeKey>,
    /// `edges[i]` joins `nodes[i]` and `nodes[(i + 1) % n]`.
    pub edges: Vec<EdgeKey>,
    /// Surface (component) identifier supplied by the surface definition.
    pub surface: u32,
    /// Loops of the parent (finer) grid this loop was agglomerated from.
    /// Empty for loops of an original fine grid.
    pub fine_loops: SmallVec<[LoopKey; 2]>,
}

impl LoopData {
    /// Number of nodes (and edges) of the polygon.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_triangle(&self) -> bool {
        self.nodes.len() == 3
    }

    /// Returns the local position of `node` in the node cycle.
    pub fn local_index(&self, node: NodeKey) -> Option<usize> {
        self.nodes.iter().position(|&n| n == node)
    }

    /// Returns the local edge index of `edge`.
    pub fn local_edge_index(&self, edge: EdgeKey) -> Option<usize> {
        self.edges.iter().position(|&e| e == edge)
    }
}

/// The arena that owns a grid's entities and their adjacency indices.
///
/// # Example
///
/// ```
/// use vortex_grid::Grid;
///
/// let mut grid = Grid::new();
/// let a = grid.add_node(0.0, 0.0, 0.0);
/// let b = grid.add_node(1.0, 0.0, 0.0);
/// let c = grid.add_node(0.0, 1.0, 0.0);
/// grid.add_loop(&[a, b, c], 0).unwrap();
///
/// assert_eq!(grid.node_count(), 3);
/// assert_eq!(grid.edge_count(), 3);
/// assert_eq!(grid.loop_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Grid {
    // Entity storage
    pub(crate) nodes: SlotMap<NodeKey, NodeData>,
    pub(crate) edges: SlotMap<EdgeKey, EdgeData>,
    pub(crate) loops: SlotMap<LoopKey, LoopData>,

    // Upward adjacency: child -> parents
    pub(crate) node_to_edges: FxHashMap<NodeKey, Vec<EdgeKey>>,
    pub(crate) node_to_loops: FxHashMap<NodeKey, Vec<LoopKey>>,

    // Edge lookup by (min, max) node pair
    pub(crate) edge_lookup: FxHashMap<(NodeKey, NodeKey), EdgeKey>,
}

impl Grid {
    /// Creates a new, empty grid.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            edges: SlotMap::with_key(),
            loops: SlotMap::with_key(),

            node_to_edges: FxHashMap::default(),
            node_to_loops: FxHashMap::default(),

            edge_lookup: FxHashMap::default(),
        }
    }

    // --- Node access ---

    /// Returns the node data for the given key, or `None` if not found.
    pub fn node(&self, key: NodeKey) -> Option<&NodeData> {
        self.nodes.get(key)
    }

    /// Returns the number of nodes in the grid.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterates over all nodes in slot order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeKey, &NodeData)> {
        self.nodes.iter()
    }

    /// Returns all node keys in slot order.
    pub fn node_keys(&self) -> Vec<NodeKey> {
        self.nodes.keys().collect()
    }

    /// Returns the position of a node.
    pub fn node_point(&self, key: NodeKey) -> Option<Point3<f64>> {
        self.nodes.get(key).map(|n| n.position)
    }

    /// Returns the classification of a node.
    pub fn node_bc(&self, key: NodeKey) -> Option<BoundaryCondition> {
        self.nodes.get(key).map(|n| n.bc)
    }

    /// Marks or clears the degenerate flag of a node.
    pub fn set_node_degenerate(&mut self, key: NodeKey, degenerate: bool) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.degenerate = degenerate;
        }
    }

    // --- Edge access ---

    /// Returns the edge data for the given key, or `None` if not found.
    pub fn edge(&self, key: EdgeKey) -> Option<&EdgeData> {
        self.edges.get(key)
    }

    /// Returns the number of edges in the grid.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Iterates over all edges in slot order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeKey, &EdgeData)> {
        self.edges.iter()
    }

    /// Returns all edge keys in slot order.
    pub fn edge_keys(&self) -> Vec<EdgeKey> {
        self.edges.keys().collect()
    }

    /// Returns the classification of an edge.
    pub fn edge_bc(&self, key: EdgeKey) -> Option<BoundaryCondition> {
        self.edges.get(key).map(|e| e.bc)
    }

    // --- Loop access ---

    /// Returns the loop data for the given key, or `None` if not found.
    pub fn vortex_loop(&self, key: LoopKey) -> Option<&LoopData> {
        self.loops.get(key)
    }

    /// Returns the number of loops in the grid.
    pub fn loop_count(&self) -> usize {
        self.loops.len()
    }

    /// Iterates over all loops in slot order.
    pub fn loops(&self) -> impl Iterator<Item = (LoopKey, &LoopData)> {
        self.loops.iter()
    }

    /// Returns all loop keys in slot order.
    pub fn loop_keys(&self) -> Vec<LoopKey> {
        self.loops.keys().collect()
    }

    /// Returns the node cycle of a loop.
    pub fn loop_nodes(&self, key: LoopKey) -> Option<&[NodeKey]> {
        self.loops.get(key).map(|l| l.nodes.as_slice())
    }

    /// Returns the edge cycle of a loop.
    pub fn loop_edges(&self, key: LoopKey) -> Option<&[EdgeKey]> {
        self.loops.get(key).map(|l| l.edges.as_slice())
    }

    // --- Entity existence checks ---

    /// Returns `true` if the given key references a live entity.
    pub fn contains(&self, key: GridKey) -> bool {
        match key {
            GridKey::Node(k) => self.nodes.contains_key(k),
            GridKey::Edge(k) => self.edges.contains_key(k),
            GridKey::Loop(k) => self.loops.contains_key(k),
        }
    }

    // --- Adjacency index helpers ---

    pub(crate) fn pair(a: NodeKey, b: NodeKey) -> (NodeKey, NodeKey) {
        if a < b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Register that an edge uses a node (upward adjacency).
    pub(crate) fn link_node_edge(&mut self, node: NodeKey, edge: EdgeKey) {
        let list = self.node_to_edges.entry(node).or_default();
        if !list.contains(&edge) {
            list.push(edge);
        }
    }

    pub(crate) fn unlink_node_edge(&mut self, node: NodeKey, edge: EdgeKey) {
        if let Some(list) = self.node_to_edges.get_mut(&node) {
            list.retain(|&e| e != edge);
            if list.is_empty() {
                self.node_to_edges.remove(&node);
            }
        }
    }

    /// Register that a loop uses a node (upward adjacency).
    pub(crate) fn link_node_loop(&mut self, node: NodeKey, lp: LoopKey) {
        let list = self.node_to_loops.entry(node).or_default();
        if !list.contains(&lp) {
            list.push(lp);
        }
    }

    pub(crate) fn unlink_node_loop(&mut self, node: NodeKey, lp: LoopKey) {
        if let Some(list) = self.node_to_loops.get_mut(&node) {
            list.retain(|&l| l != lp);
            if list.is_empty() {
                self.node_to_loops.remove(&node);
            }
        }
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_grid_is_empty() {
        let grid = Grid::new();
        assert_eq!(grid.node_count(), 0);
        assert_eq!(grid.edge_count(), 0);
        assert_eq!(grid.loop_count(), 0);
    }

    #[test]
    fn add_and_retrieve_node() {
        let mut grid = Grid::new();
        let key = grid.add_node(1.0, 2.0, 3.0);

        let n = grid.node(key).unwrap();
        assert_eq!(n.position, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(n.bc, BoundaryCondition::Interior);
        assert!(!n.on_surface_border);
        assert!(grid.contains(GridKey::Node(key)));
    }

    #[test]
    fn edge_sides_and_other_side() {
        let mut grid = Grid::new();
        let a = grid.add_node(0.0, 0.0, 0.0);
        let b = grid.add_node(1.0, 0.0, 0.0);
        let c = grid.add_node(1.0, 1.0, 0.0);
        let d = grid.add_node(0.0, 1.0, 0.0);
        let l0 = grid.add_loop(&[a, b, c], 0).unwrap();
        let l1 = grid.add_loop(&[a, c, d], 0).unwrap();

        let diag = grid.edge_between(a, c).unwrap();
        let data = grid.edge(diag).unwrap();
        assert_eq!(data.side_count(), 2);
        assert_eq!(data.other_side(l0), Some(l1));
        assert_eq!(data.other_side(l1), Some(l0));
        assert_eq!(data.other_node(a), Some(c));
        assert_eq!(data.both_sides(), Some([l0, l1]));

        let rim = grid.edge_between(a, b).unwrap();
        assert_eq!(grid.edge(rim).unwrap().other_side(l0), None);
    }

    #[test]
    fn loop_local_indices() {
        let mut grid = Grid::new();
        let a = grid.add_node(0.0, 0.0, 0.0);
        let b = grid.add_node(1.0, 0.0, 0.0);
        let c = grid.add_node(0.0, 1.0, 0.0);
        let lp = grid.add_loop(&[a, b, c], 7).unwrap();

        let data = grid.vortex_loop(lp).unwrap();
        assert!(data.is_triangle());
        assert_eq!(data.surface, 7);
        assert_eq!(data.local_index(c), Some(2));
        let bc_edge = grid.edge_between(b, c).unwrap();
        assert_eq!(data.local_edge_index(bc_edge), Some(1));
    }
}
