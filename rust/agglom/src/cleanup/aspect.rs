// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Repair of stretched triangles.
//!
//! A bad triangle is either a needle (one edge much shorter than the
//! others) or a cap (one angle close to 180 degrees). Needles lose their
//! short edge by collapsing it onto one endpoint; caps are absorbed into the
//! neighbor across their long edge.

use rustc_hash::FxHashSet;
use vortex_grid::geometry::polygon_normal;
use vortex_grid::{BoundaryCondition, EdgeKey, Grid, LoopKey, NodeKey};

use super::absorb_into_neighbor;
use crate::config::AgglomConfig;
use crate::error::Result;
use crate::quality::{bad_triangle, calculate_aspect_ratio, calculate_loop_angle};

/// Largest angle above which a bad triangle is treated as a cap.
const CAP_ANGLE: f64 = 120.0;

/// Repairs triangles whose aspect ratio exceeds `max_aspect_ratio` or that
/// fail the bad-triangle test (CleanUpHighAspectRatioTris). Returns the
/// number of triangles repaired.
pub fn clean_up_high_aspect_ratio_tris(grid: &mut Grid, config: &AgglomConfig) -> Result<usize> {
    let mut repaired = 0;

    for lp in grid.loop_keys() {
        if !grid.vortex_loop(lp).is_some_and(|l| l.is_triangle()) {
            continue;
        }
        let ratio = calculate_aspect_ratio(grid, lp, config.aspect_ratio_metric).unwrap_or(f64::INFINITY);
        let bad = bad_triangle(
            grid,
            lp,
            config.bad_triangle_min_angle,
            config.bad_triangle_min_edge_ratio,
        );
        if ratio <= config.max_aspect_ratio && bad.is_none() {
            continue;
        }

        let fixed = if is_cap(grid, lp, config) {
            absorb_into_neighbor(grid, lp)?
        } else {
            collapse_short_edge(grid, lp)?
        };
        if fixed {
            repaired += 1;
        } else {
            tracing::debug!(lp = ?lp, ratio, "Bad triangle left in place");
        }
    }

    if repaired > 0 {
        tracing::debug!(repaired, "High aspect ratio triangles repaired");
    }
    Ok(repaired)
}

fn is_cap(grid: &Grid, lp: LoopKey, config: &AgglomConfig) -> bool {
    let Some(data) = grid.vortex_loop(lp) else {
        return false;
    };
    let lengths: Vec<f64> = data.edges.iter().filter_map(|&ek| grid.edge_length(ek)).collect();
    let longest = lengths.iter().copied().fold(0.0, f64::max);
    let shortest = lengths.iter().copied().fold(f64::INFINITY, f64::min);
    if shortest < config.bad_triangle_min_edge_ratio * longest {
        return false;
    }
    data.nodes
        .iter()
        .any(|&n| calculate_loop_angle(grid, lp, n).map_or(true, |a| a > CAP_ANGLE))
}

/// Collapses the shortest INTERIOR edge of `lp`. The endpoint on the
/// surface border (or with a pinned tag) survives; nothing happens if both
/// endpoints are border nodes.
fn collapse_short_edge(grid: &mut Grid, lp: LoopKey) -> Result<bool> {
    let Some(data) = grid.vortex_loop(lp) else {
        return Ok(false);
    };
    let mut interior: Vec<(f64, EdgeKey)> = data
        .edges
        .iter()
        .filter(|&&ek| grid.edge_bc(ek).is_some_and(BoundaryCondition::is_interior))
        .filter_map(|&ek| Some((grid.edge_length(ek)?, ek)))
        .collect();
    interior.sort_by(|(la, a), (lb, b)| la.total_cmp(lb).then_with(|| a.cmp(b)));
    let Some(&(_, edge)) = interior.first() else {
        return Ok(false);
    };
    let Some([a, b]) = grid.edge_nodes(edge) else {
        return Ok(false);
    };

    let anchored = |n: NodeKey| {
        grid.node(n)
            .is_some_and(|d| d.on_surface_border || d.fixed_bc.is_some())
    };
    let (keep, drop) = match (anchored(a), anchored(b)) {
        (true, true) => return Ok(false),
        (false, true) => (b, a),
        _ => (a, b),
    };
    collapse_edge(grid, keep, drop)
}

/// Moves every use of `drop` onto `keep`, removing the loops that
/// degenerate. Refuses collapses that would pinch the mesh or flip a loop.
pub(crate) fn collapse_edge(grid: &mut Grid, keep: NodeKey, drop: NodeKey) -> Result<bool> {
    let Some(edge) = grid.edge_between(keep, drop) else {
        return Ok(false);
    };

    // Link condition: the only nodes adjacent to both endpoints are the
    // apexes of the triangles on the collapsed edge.
    let adjacent = |n: NodeKey| -> FxHashSet<NodeKey> {
        grid.node_edges(n)
            .iter()
            .filter_map(|&ek| grid.edge(ek).and_then(|e| e.other_node(n)))
            .collect()
    };
    let (around_keep, around_drop) = (adjacent(keep), adjacent(drop));
    let common: FxHashSet<NodeKey> = around_keep.intersection(&around_drop).copied().collect();
    let apexes: FxHashSet<NodeKey> = grid
        .edge(edge)
        .map(|e| e.sides.iter().flatten().copied().collect::<Vec<LoopKey>>())
        .unwrap_or_default()
        .into_iter()
        .filter_map(|l| grid.vortex_loop(l))
        .filter(|l| l.is_triangle())
        .flat_map(|l| l.nodes.iter().copied())
        .filter(|&n| n != keep && n != drop)
        .collect();
    if common != apexes {
        return Ok(false);
    }

    let mut removals = Vec::new();
    let mut replacements = Vec::new();
    for &lp in grid.node_loops(drop) {
        let Some(data) = grid.vortex_loop(lp) else {
            continue;
        };
        let mut cycle: Vec<NodeKey> = data
            .nodes
            .iter()
            .map(|&n| if n == drop { keep } else { n })
            .collect();
        cycle.dedup();
        while cycle.len() > 1 && cycle.first() == cycle.last() {
            cycle.pop();
        }
        if cycle.len() < 3 {
            removals.push(lp);
            continue;
        }
        if (1..cycle.len()).any(|i| cycle[..i].contains(&cycle[i])) {
            return Ok(false);
        }
        let before = grid.loop_points(lp).and_then(|p| polygon_normal(&p));
        let after = grid.points_of(&cycle).and_then(|p| polygon_normal(&p));
        if let (Some(n0), Some(n1)) = (before, after) {
            if n0.dot(&n1) <= 0.0 {
                return Ok(false);
            }
        }
        replacements.push((lp, cycle));
    }

    for lp in removals {
        grid.remove_loop(lp);
    }
    for (lp, cycle) in replacements {
        grid.replace_loop_nodes(lp, &cycle)?;
    }
    grid.remove_node(drop);
    Ok(true)
}
