// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh consistency checks.
//!
//! `check_mesh` is the gate in front of and behind agglomeration. It never
//! mutates the grid; it lists everything it finds so callers can decide
//! what is fatal. Orphan nodes are reported but are not fatal, and a loop of
//! zero area is not a violation at all (slivers are cleanup's business).

use std::fmt;

use nalgebra::Point3;
use rustc_hash::FxHashMap;
use vortex_grid::geometry::{dominant_axes, polygon_normal};
use vortex_grid::{EdgeKey, Grid, GridKey, LoopKey, NodeKey};

/// One consistency problem found in a grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshViolation {
    /// A loop with fewer than three nodes.
    DegenerateLoop { lp: LoopKey, nodes: usize },
    /// A loop references a node that does not exist.
    MissingNode { lp: LoopKey, node: NodeKey },
    /// A loop visits the same node twice.
    RepeatedNode { lp: LoopKey, node: NodeKey },
    /// An edge's side list and the loops' edge lists disagree.
    EdgeSideMismatch { edge: EdgeKey },
    /// An edge is used by more than two loops.
    OverSharedEdge { edge: EdgeKey, loops: usize },
    /// Two non-adjacent edges of a loop cross.
    SelfIntersection { lp: LoopKey },
    /// A node that no loop uses.
    OrphanNode { node: NodeKey },
}

impl MeshViolation {
    /// Whether the violation makes the grid unusable for the solver.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, MeshViolation::OrphanNode { .. })
    }

    /// The entity the violation is about.
    pub fn key(&self) -> GridKey {
        match *self {
            MeshViolation::DegenerateLoop { lp, .. }
            | MeshViolation::MissingNode { lp, .. }
            | MeshViolation::RepeatedNode { lp, .. }
            | MeshViolation::SelfIntersection { lp } => GridKey::Loop(lp),
            MeshViolation::EdgeSideMismatch { edge } | MeshViolation::OverSharedEdge { edge, .. } => {
                GridKey::Edge(edge)
            }
            MeshViolation::OrphanNode { node } => GridKey::Node(node),
        }
    }
}

impl fmt::Display for MeshViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshViolation::DegenerateLoop { lp, nodes } => {
                write!(f, "loop {lp:?} has only {nodes} nodes")
            }
            MeshViolation::MissingNode { lp, node } => {
                write!(f, "loop {lp:?} references missing node {node:?}")
            }
            MeshViolation::RepeatedNode { lp, node } => {
                write!(f, "loop {lp:?} visits node {node:?} twice")
            }
            MeshViolation::EdgeSideMismatch { edge } => {
                write!(f, "edge {edge:?} sides disagree with its loops")
            }
            MeshViolation::OverSharedEdge { edge, loops } => {
                write!(f, "edge {edge:?} is used by {loops} loops")
            }
            MeshViolation::SelfIntersection { lp } => write!(f, "loop {lp:?} intersects itself"),
            MeshViolation::OrphanNode { node } => write!(f, "node {node:?} is used by no loop"),
        }
    }
}

/// Checks the grid's loops and edges for consistency (CheckMesh).
///
/// Violations are returned in a stable order: loops in slot order, then
/// edges, then nodes.
pub fn check_mesh(grid: &Grid) -> Vec<MeshViolation> {
    let mut violations = Vec::new();
    let mut usage: FxHashMap<EdgeKey, usize> = FxHashMap::default();

    for (lp, data) in grid.loops() {
        if data.len() < 3 {
            violations.push(MeshViolation::DegenerateLoop { lp, nodes: data.len() });
        }

        let mut intact = true;
        for (i, &node) in data.nodes.iter().enumerate() {
            if grid.node(node).is_none() {
                violations.push(MeshViolation::MissingNode { lp, node });
                intact = false;
            } else if data.nodes[..i].contains(&node) {
                violations.push(MeshViolation::RepeatedNode { lp, node });
                intact = false;
            }
        }

        if data.edges.len() != data.nodes.len() {
            intact = false;
        }
        for (i, &ek) in data.edges.iter().enumerate() {
            *usage.entry(ek).or_default() += 1;
            let ends = [data.nodes.get(i), data.nodes.get((i + 1) % data.nodes.len().max(1))];
            let consistent = match (grid.edge(ek), ends) {
                (Some(edge), [Some(&a), Some(&b)]) => {
                    edge.has_side(lp) && (edge.nodes == [a, b] || edge.nodes == [b, a])
                }
                _ => false,
            };
            if !consistent {
                violations.push(MeshViolation::EdgeSideMismatch { edge: ek });
                intact = false;
            }
        }

        if intact && data.len() > 3 && self_intersects(grid, &data.nodes) {
            violations.push(MeshViolation::SelfIntersection { lp });
        }
    }

    for (ek, edge) in grid.edges() {
        let used = usage.get(&ek).copied().unwrap_or(0);
        if used > 2 {
            violations.push(MeshViolation::OverSharedEdge { edge: ek, loops: used });
        }
        let sides_ok = edge.side_count() > 0
            && edge.side_count() == used
            && edge.sides.iter().flatten().all(|&lp| {
                grid.vortex_loop(lp)
                    .is_some_and(|l| l.edges.contains(&ek))
            });
        if !sides_ok && used <= 2 {
            violations.push(MeshViolation::EdgeSideMismatch { edge: ek });
        }
    }

    for (node, _) in grid.nodes() {
        if grid.node_loops(node).is_empty() {
            violations.push(MeshViolation::OrphanNode { node });
        }
    }

    violations
}

/// Returns only the violations that make a grid unusable.
pub fn fatal_violations(grid: &Grid) -> Vec<MeshViolation> {
    let mut violations = check_mesh(grid);
    violations.retain(MeshViolation::is_fatal);
    violations
}

/// Tests whether two non-adjacent edges of a polygon cross, after projecting
/// it onto its dominant plane. Degenerate (zero-area) polygons are skipped.
fn self_intersects(grid: &Grid, nodes: &[NodeKey]) -> bool {
    let Some(points) = grid.points_of(nodes) else {
        return false;
    };
    let Some(normal) = polygon_normal(&points) else {
        return false;
    };
    let (u, v) = dominant_axes(&normal);
    let flat: Vec<[f64; 2]> = points.iter().map(|p| project(p, u, v)).collect();

    let scale = points
        .windows(2)
        .map(|w| (w[1] - w[0]).norm())
        .fold(0.0, f64::max);
    let eps = 1e-12 * scale * scale;

    let n = flat.len();
    for i in 0..n {
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            let (a, b) = (flat[i], flat[(i + 1) % n]);
            let (c, d) = (flat[j], flat[(j + 1) % n]);
            if segments_cross(a, b, c, d, eps) {
                return true;
            }
        }
    }
    false
}

fn project(p: &Point3<f64>, u: usize, v: usize) -> [f64; 2] {
    [p[u], p[v]]
}

fn orient(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

fn segments_cross(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2], eps: f64) -> bool {
    let sign = |x: f64| {
        if x > eps {
            1
        } else if x < -eps {
            -1
        } else {
            0
        }
    };
    let d1 = sign(orient(a, b, c));
    let d2 = sign(orient(a, b, d));
    let d3 = sign(orient(c, d, a));
    let d4 = sign(orient(c, d, b));
    d1 * d2 < 0 && d3 * d4 < 0
}
