// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometric quality measures for loops and merge candidates.
//!
//! Everything here is a pure function over a `&Grid`. Angles are in degrees.
//! Interior angles are measured about the polygon's own Newell normal, so a
//! reflex vertex reads above 180 regardless of which way the loop faces.

use nalgebra::{Point3, Vector3};
use vortex_grid::geometry::polygon_normal;
use vortex_grid::{EdgeKey, Grid, LoopKey, NodeKey};

use crate::config::AspectRatioMetric;
use crate::merge::merged_cycle;

/// Interior angles of a polygon, one per vertex, in `[0, 360)`.
///
/// Returns `None` for a polygon with no defined normal or with a
/// zero-length edge.
pub fn polygon_angles(points: &[Point3<f64>]) -> Option<Vec<f64>> {
    let normal = polygon_normal(points)?;
    let n = points.len();
    let mut angles = Vec::with_capacity(n);

    for i in 0..n {
        let p = points[i];
        let to_next = points[(i + 1) % n] - p;
        let to_prev = points[(i + n - 1) % n] - p;
        if to_next.norm_squared() < 1e-30 || to_prev.norm_squared() < 1e-30 {
            return None;
        }
        let sin = normal.dot(&to_next.cross(&to_prev));
        let cos = to_next.dot(&to_prev);
        let mut angle = sin.atan2(cos).to_degrees();
        if angle < 0.0 {
            angle += 360.0;
        }
        angles.push(angle);
    }
    Some(angles)
}

/// Indices of the vertices that are real corners, i.e. not within
/// `colinear_angle` of a straight line.
pub fn corner_indices(angles: &[f64], colinear_angle: f64) -> Vec<usize> {
    angles
        .iter()
        .enumerate()
        .filter(|(_, &a)| (a - 180.0).abs() > colinear_angle)
        .map(|(i, _)| i)
        .collect()
}

/// Largest deviation of the corner angles from the regular polygon's angle
/// (90 for four corners, 60 for three).
pub fn angle_deviation(angles: &[f64], corners: &[usize]) -> f64 {
    let k = corners.len();
    if k < 3 {
        return 180.0;
    }
    let ideal = 180.0 * (k as f64 - 2.0) / k as f64;
    corners
        .iter()
        .map(|&i| (angles[i] - ideal).abs())
        .fold(0.0, f64::max)
}

/// Maps an angle deviation onto a `[0, 1]` score, 1 for a perfect shape.
pub fn quality_score(deviation: f64) -> f64 {
    (1.0 - deviation / 90.0).clamp(0.0, 1.0)
}

/// Quality of the quadrilateral `n1..n4` (CalculateQuadQuality):
/// `1 - max|angle - 90| / 90`, clamped to `[0, 1]`.
pub fn calculate_quad_quality(grid: &Grid, nodes: &[NodeKey; 4]) -> Option<f64> {
    let angles = polygon_angles(&grid.points_of(nodes)?)?;
    let all: Vec<usize> = (0..4).collect();
    Some(quality_score(angle_deviation(&angles, &all)))
}

/// Slack above 180 degrees that still reads as a flat vertex.
const FLAT_EPSILON: f64 = 1e-6;

/// Whether every vertex is convex. Corners may open up to `max_angle`;
/// beyond that a vertex must be flat, and a flat vertex may only lean to the
/// convex side. Anything past 180 is reflex.
pub fn is_convex(angles: &[f64], max_angle: f64) -> bool {
    angles
        .iter()
        .all(|&a| a <= max_angle || (a >= max_angle && a <= 180.0 + FLAT_EPSILON))
}

/// Interior angle of `lp` at `node` (CalculateLoopAngle).
pub fn calculate_loop_angle(grid: &Grid, lp: LoopKey, node: NodeKey) -> Option<f64> {
    let data = grid.vortex_loop(lp)?;
    let index = data.local_index(node)?;
    let angles = polygon_angles(&grid.points_of(&data.nodes)?)?;
    angles.get(index).copied()
}

/// Whether the normals of two loops are within `max_angle` of each other.
pub fn loops_are_coplanar(grid: &Grid, a: LoopKey, b: LoopKey, max_angle: f64) -> bool {
    match (grid.loop_normal(a), grid.loop_normal(b)) {
        (Some(na), Some(nb)) => angle_between(&na, &nb) <= max_angle,
        _ => false,
    }
}

/// Whether two edges run along the same line direction within `max_angle`,
/// ignoring their orientation.
pub fn edges_are_colinear(grid: &Grid, a: EdgeKey, b: EdgeKey, max_angle: f64) -> bool {
    match (grid.edge_vector(a), grid.edge_vector(b)) {
        (Some(va), Some(vb)) => {
            let angle = angle_between(&va, &vb);
            angle.min(180.0 - angle) <= max_angle
        }
        _ => false,
    }
}

/// Whether the loop obtained by merging `a` and `b` across their shared edge
/// would be convex (MergedLoopsAreConvex).
pub fn merged_loops_are_convex(grid: &Grid, a: LoopKey, b: LoopKey, max_angle: f64) -> bool {
    merged_cycle(grid, a, b)
        .and_then(|cycle| grid.points_of(&cycle))
        .and_then(|points| polygon_angles(&points))
        .is_some_and(|angles| is_convex(&angles, max_angle))
}

/// Returns the shortest edge of a triangle that is a sliver: one of its
/// angles is below `min_angle`, or its shortest edge is below
/// `min_edge_ratio` times its longest.
pub fn bad_triangle(grid: &Grid, lp: LoopKey, min_angle: f64, min_edge_ratio: f64) -> Option<EdgeKey> {
    let data = grid.vortex_loop(lp)?;
    if !data.is_triangle() {
        return None;
    }
    let (shortest, min_len, max_len) = edge_extremes(grid, &data.edges)?;

    let needle = max_len <= 0.0 || min_len < min_edge_ratio * max_len;
    let sharp = data
        .nodes
        .iter()
        .any(|&n| calculate_loop_angle(grid, lp, n).map_or(true, |a| a < min_angle));
    (needle || sharp).then_some(shortest)
}

/// Aspect ratio of a loop (CalculateAspectRatio).
///
/// `EdgeLength` gives longest over shortest edge for any loop. `RadiusRatio`
/// gives circumradius over twice the inradius for triangles and falls back to
/// the edge ratio otherwise. Degenerate loops read as infinite.
pub fn calculate_aspect_ratio(grid: &Grid, lp: LoopKey, metric: AspectRatioMetric) -> Option<f64> {
    let data = grid.vortex_loop(lp)?;
    let (_, min_len, max_len) = edge_extremes(grid, &data.edges)?;

    if metric == AspectRatioMetric::RadiusRatio && data.is_triangle() {
        let lengths: Vec<f64> = data
            .edges
            .iter()
            .map(|&ek| grid.edge_length(ek))
            .collect::<Option<_>>()?;
        let area = grid.loop_area(lp)?;
        if area <= 0.0 {
            return Some(f64::INFINITY);
        }
        let s = lengths.iter().sum::<f64>() / 2.0;
        let circumradius = lengths.iter().product::<f64>() / (4.0 * area);
        let inradius = area / s;
        return Some(circumradius / (2.0 * inradius));
    }

    if min_len <= 0.0 {
        return Some(f64::INFINITY);
    }
    Some(max_len / min_len)
}

/// Shortest edge key plus minimum and maximum edge length.
fn edge_extremes(grid: &Grid, edges: &[EdgeKey]) -> Option<(EdgeKey, f64, f64)> {
    let mut shortest: Option<(EdgeKey, f64)> = None;
    let mut max_len = 0.0_f64;
    for &ek in edges {
        let len = grid.edge_length(ek)?;
        max_len = max_len.max(len);
        if shortest.map_or(true, |(_, best)| len < best) {
            shortest = Some((ek, len));
        }
    }
    shortest.map(|(ek, min_len)| (ek, min_len, max_len))
}

fn angle_between(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let denom = a.norm() * b.norm();
    if denom < 1e-30 {
        return 180.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos().to_degrees()
}
