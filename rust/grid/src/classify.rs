// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boundary-condition classification of edges and nodes.
//!
//! Edge tags for trailing and leading edges come from the surface definition
//! and are set explicitly; everything else is derived from the topology:
//! free edges and edges between two surfaces are BOUNDARY, and nodes inherit
//! the tag of the border they sit on, escalating to CORNER where borders
//! meet, end, or turn sharply.

use crate::arena::Grid;
use crate::bc::BoundaryCondition;
use crate::keys::*;

impl Grid {
    /// Derives edge and node tags from the current topology.
    ///
    /// `corner_angle` is the turning angle in degrees above which a node
    /// between two border edges of the same tag becomes a CORNER. Explicit
    /// non-interior edge tags and pinned node tags are never relaxed.
    pub fn classify_boundaries(&mut self, corner_angle: f64) {
        let edge_keys: Vec<EdgeKey> = self.edges.keys().collect();
        for ek in edge_keys {
            let free_or_seam = {
                let edge = &self.edges[ek];
                match edge.both_sides() {
                    None => true,
                    Some([a, b]) => match (self.loops.get(a), self.loops.get(b)) {
                        (Some(la), Some(lb)) => la.surface != lb.surface,
                        _ => true,
                    },
                }
            };
            let edge = &mut self.edges[ek];
            if free_or_seam && edge.bc.is_interior() {
                edge.bc = BoundaryCondition::Boundary;
            }
        }

        let node_keys: Vec<NodeKey> = self.nodes.keys().collect();
        for nk in node_keys {
            let derived = self.derive_node_bc(nk, corner_angle);
            let node = &mut self.nodes[nk];
            node.on_surface_border = !derived.is_interior();
            node.bc = match node.fixed_bc {
                Some(fixed) => derived.most_restrictive(fixed),
                None => derived,
            };
        }
    }

    fn derive_node_bc(&self, node: NodeKey, corner_angle: f64) -> BoundaryCondition {
        let border: Vec<EdgeKey> = self
            .node_edges(node)
            .iter()
            .copied()
            .filter(|&ek| !self.edges[ek].bc.is_interior())
            .collect();

        let Some(&first) = border.first() else {
            return BoundaryCondition::Interior;
        };
        let tag = self.edges[first].bc;
        if tag == BoundaryCondition::Corner
            || border.len() != 2
            || border.iter().any(|&ek| self.edges[ek].bc != tag)
        {
            return BoundaryCondition::Corner;
        }

        match self.border_turning_angle(node, border[0], border[1]) {
            Some(turn) if turn <= corner_angle => tag,
            _ => BoundaryCondition::Corner,
        }
    }

    /// Angle in degrees by which the border turns at `node` when walking
    /// from edge `e1` into edge `e2`; zero for a straight continuation.
    fn border_turning_angle(&self, node: NodeKey, e1: EdgeKey, e2: EdgeKey) -> Option<f64> {
        let p = self.node_point(node)?;
        let a = self.node_point(self.edges[e1].other_node(node)?)?;
        let b = self.node_point(self.edges[e2].other_node(node)?)?;
        let (u, v) = (a - p, b - p);
        let denom = u.norm() * v.norm();
        if denom < 1e-30 {
            return None;
        }
        let cos = (u.dot(&v) / denom).clamp(-1.0, 1.0);
        Some(180.0 - cos.acos().to_degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construction::make_triangle_strip;

    #[test]
    fn free_edges_become_boundary() {
        let (grid, nodes) = make_triangle_strip(2, 1).unwrap();
        let bottom = grid.edge_between(nodes[0], nodes[1]).unwrap();
        let diag = grid.edge_between(nodes[0], nodes[4]).unwrap();
        assert_eq!(grid.edge_bc(bottom), Some(BoundaryCondition::Boundary));
        assert_eq!(grid.edge_bc(diag), Some(BoundaryCondition::Interior));
    }

    #[test]
    fn node_tags_follow_border_shape() {
        let (grid, nodes) = make_triangle_strip(2, 1).unwrap();
        // Rectangle corner.
        assert_eq!(grid.node_bc(nodes[0]), Some(BoundaryCondition::Corner));
        // Midpoint of the straight bottom side.
        assert_eq!(grid.node_bc(nodes[1]), Some(BoundaryCondition::Boundary));
        assert!(grid.node(nodes[1]).unwrap().on_surface_border);
    }

    #[test]
    fn interior_node_stays_interior() {
        let (grid, nodes) = make_triangle_strip(2, 2).unwrap();
        assert_eq!(grid.node_bc(nodes[4]), Some(BoundaryCondition::Interior));
        assert!(!grid.node(nodes[4]).unwrap().on_surface_border);
    }

    #[test]
    fn mixed_tags_make_a_corner() {
        let (mut grid, nodes) = make_triangle_strip(2, 1).unwrap();
        let left = grid.edge_between(nodes[0], nodes[1]).unwrap();
        grid.set_edge_bc(left, BoundaryCondition::TrailingEdge).unwrap();
        grid.classify_boundaries(30.0);

        assert_eq!(grid.node_bc(nodes[1]), Some(BoundaryCondition::Corner));
        assert_eq!(grid.edge_bc(left), Some(BoundaryCondition::TrailingEdge));
    }

    #[test]
    fn surface_seam_is_boundary() {
        let mut grid = Grid::new();
        let a = grid.add_node(0.0, 0.0, 0.0);
        let b = grid.add_node(1.0, 0.0, 0.0);
        let c = grid.add_node(1.0, 1.0, 0.0);
        let d = grid.add_node(0.0, 1.0, 0.0);
        grid.add_loop(&[a, b, c], 0).unwrap();
        grid.add_loop(&[a, c, d], 1).unwrap();
        grid.classify_boundaries(30.0);

        let seam = grid.edge_between(a, c).unwrap();
        assert_eq!(grid.edge_bc(seam), Some(BoundaryCondition::Boundary));
    }

    #[test]
    fn pinned_tag_survives_classification() {
        let (mut grid, nodes) = make_triangle_strip(2, 2).unwrap();
        grid.set_node_bc(nodes[4], BoundaryCondition::LeadingEdge).unwrap();
        grid.classify_boundaries(30.0);
        assert_eq!(grid.node_bc(nodes[4]), Some(BoundaryCondition::LeadingEdge));
    }
}
