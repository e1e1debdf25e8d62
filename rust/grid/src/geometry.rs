// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometric queries on grid entities.
//!
//! Lengths, normals and areas of loops, computed with standard
//! computational geometry (Newell normals, vector area). The free functions
//! work on raw point lists so callers can evaluate candidate polygons that
//! are not stored in the grid yet.

use nalgebra::{Point3, Vector3};

use crate::arena::Grid;
use crate::keys::*;

/// Newell normal of a closed polygon, not normalized.
///
/// Its length is twice the polygon's (vector) area; the direction follows the
/// right-hand rule relative to the point order.
pub fn newell_normal(points: &[Point3<f64>]) -> Vector3<f64> {
    let mut normal = Vector3::new(0.0, 0.0, 0.0);
    let n = points.len();

    for i in 0..n {
        let curr = &points[i];
        let next = &points[(i + 1) % n];

        normal.x += (curr.y - next.y) * (curr.z + next.z);
        normal.y += (curr.z - next.z) * (curr.x + next.x);
        normal.z += (curr.x - next.x) * (curr.y + next.y);
    }
    normal
}

/// Unit normal of a polygon, `None` when the polygon is degenerate.
pub fn polygon_normal(points: &[Point3<f64>]) -> Option<Vector3<f64>> {
    if points.len() < 3 {
        return None;
    }
    let normal = newell_normal(points);
    let len = normal.norm();
    if len < 1e-15 {
        return None;
    }
    Some(normal / len)
}

/// Area of a polygon (magnitude of its vector area).
pub fn polygon_area(points: &[Point3<f64>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    newell_normal(points).norm() / 2.0
}

/// Returns the two coordinate axes to keep when projecting onto the plane
/// most perpendicular to `normal`.
pub fn dominant_axes(normal: &Vector3<f64>) -> (usize, usize) {
    let abs_n = Vector3::new(normal.x.abs(), normal.y.abs(), normal.z.abs());
    if abs_n.z >= abs_n.x && abs_n.z >= abs_n.y {
        (0, 1) // project onto XY
    } else if abs_n.y >= abs_n.x {
        (0, 2) // project onto XZ
    } else {
        (1, 2) // project onto YZ
    }
}

impl Grid {
    /// Returns the positions of a node sequence.
    pub fn points_of(&self, nodes: &[NodeKey]) -> Option<Vec<Point3<f64>>> {
        nodes.iter().map(|&n| self.node_point(n)).collect()
    }

    /// Returns the corner positions of a loop, in order.
    pub fn loop_points(&self, key: LoopKey) -> Option<Vec<Point3<f64>>> {
        self.points_of(self.loop_nodes(key)?)
    }

    /// Computes the Euclidean length of an edge.
    pub fn edge_length(&self, key: EdgeKey) -> Option<f64> {
        Some(self.edge_vector(key)?.norm())
    }

    /// Vector from an edge's first node to its second.
    pub fn edge_vector(&self, key: EdgeKey) -> Option<Vector3<f64>> {
        let [a, b] = self.edge_nodes(key)?;
        Some(self.node_point(b)? - self.node_point(a)?)
    }

    /// Unit normal of a loop (Newell's method).
    pub fn loop_normal(&self, key: LoopKey) -> Option<Vector3<f64>> {
        polygon_normal(&self.loop_points(key)?)
    }

    /// Area of a loop.
    pub fn loop_area(&self, key: LoopKey) -> Option<f64> {
        Some(polygon_area(&self.loop_points(key)?))
    }

    /// Total area of all loops.
    pub fn surface_area(&self) -> f64 {
        self.loops
            .keys()
            .filter_map(|k| self.loop_area(k))
            .sum()
    }

    /// Length of the bounding-box diagonal, used as the grid's length scale.
    pub fn bounding_diagonal(&self) -> f64 {
        let mut iter = self.nodes.values().map(|n| n.position);
        let Some(first) = iter.next() else {
            return 0.0;
        };
        let (min, max) = iter.fold((first, first), |(lo, hi), p| {
            (
                Point3::new(lo.x.min(p.x), lo.y.min(p.y), lo.z.min(p.z)),
                Point3::new(hi.x.max(p.x), hi.y.max(p.y), hi.z.max(p.z)),
            )
        });
        (max - min).norm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn edge_length_and_vector() {
        let mut grid = Grid::new();
        let a = grid.add_node(0.0, 0.0, 0.0);
        let b = grid.add_node(3.0, 4.0, 0.0);
        let c = grid.add_node(0.0, 4.0, 0.0);
        grid.add_loop(&[a, b, c], 0).unwrap();
        let ab = grid.edge_between(a, b).unwrap();

        assert_relative_eq!(grid.edge_length(ab).unwrap(), 5.0);
        let v = grid.edge_vector(ab).unwrap();
        assert_relative_eq!(v.x, 3.0);
        assert_relative_eq!(v.y, 4.0);
    }

    #[test]
    fn loop_normal_follows_winding() {
        let mut grid = Grid::new();
        let a = grid.add_node(0.0, 0.0, 0.0);
        let b = grid.add_node(1.0, 0.0, 0.0);
        let c = grid.add_node(1.0, 1.0, 0.0);
        let d = grid.add_node(0.0, 1.0, 0.0);
        let ccw = grid.add_loop(&[a, b, c, d], 0).unwrap();

        let normal = grid.loop_normal(ccw).unwrap();
        assert_relative_eq!(normal.z, 1.0, epsilon = 1e-12);
        assert_relative_eq!(grid.loop_area(ccw).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn loop_area_xz_triangle() {
        let mut grid = Grid::new();
        let a = grid.add_node(0.0, 0.0, 0.0);
        let b = grid.add_node(4.0, 0.0, 0.0);
        let c = grid.add_node(0.0, 0.0, 3.0);
        let lp = grid.add_loop(&[a, b, c], 0).unwrap();

        assert_relative_eq!(grid.loop_area(lp).unwrap(), 6.0, epsilon = 1e-12);
        let n = grid.loop_normal(lp).unwrap();
        assert_relative_eq!(n.y.abs(), 1.0, epsilon = 1e-12);
        assert_eq!(dominant_axes(&n), (0, 2));
    }

    #[test]
    fn colinear_polygon_has_no_normal() {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        assert!(polygon_normal(&points).is_none());
        assert_relative_eq!(polygon_area(&points), 0.0);
    }

    #[test]
    fn area_and_scale() {
        let mut grid = Grid::new();
        let a = grid.add_node(0.0, 0.0, 0.0);
        let b = grid.add_node(2.0, 0.0, 0.0);
        let c = grid.add_node(2.0, 2.0, 0.0);
        let d = grid.add_node(0.0, 2.0, 0.0);
        grid.add_loop(&[a, b, c, d], 0).unwrap();

        assert_relative_eq!(grid.surface_area(), 4.0, epsilon = 1e-12);
        assert_relative_eq!(grid.bounding_diagonal(), 8.0_f64.sqrt());
    }
}
