// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Simplification of crowded triangle fans.

use vortex_grid::{Grid, LoopKey, NodeKey};

use super::absorb_loop;
use crate::config::AgglomConfig;
use crate::error::Result;
use crate::merge::merged_cycle;
use crate::quality::{loops_are_coplanar, merged_loops_are_convex};

/// Around every interior node ringed by at least `fan_min_triangles`
/// triangles, dissolves every other spoke so neighboring triangles pair up
/// into quads (CleanUpFans). A pair is only merged when the quad is convex
/// and the triangles are coplanar. Returns the number of spokes dissolved.
pub fn clean_up_fans(grid: &mut Grid, config: &AgglomConfig) -> Result<usize> {
    let mut dissolved = 0;

    for hub in grid.node_keys() {
        let Some(order) = closed_fan(grid, hub, config.fan_min_triangles) else {
            continue;
        };

        let mut here = 0;
        for pair in order.chunks_exact(2) {
            let (first, second) = (pair[0], pair[1]);
            if !loops_are_coplanar(grid, first, second, config.coplanar_angle)
                || !merged_loops_are_convex(grid, first, second, config.convex_max_angle)
            {
                continue;
            }
            if let Some(cycle) = merged_cycle(grid, first, second) {
                absorb_loop(grid, first, second, &cycle)?;
                here += 1;
            }
        }

        if here > 0 {
            tracing::debug!(hub = ?hub, triangles = order.len(), spokes = here, "Simplified fan");
            dissolved += here;
        }
    }
    Ok(dissolved)
}

/// Triangles around an interior `hub` in walking order, when there are at
/// least `min_triangles` of them and they close up into a single ring.
fn closed_fan(grid: &Grid, hub: NodeKey, min_triangles: usize) -> Option<Vec<LoopKey>> {
    if grid.node(hub)?.on_surface_border {
        return None;
    }
    let loops = grid.node_loops(hub);
    if loops.len() < min_triangles
        || !loops
            .iter()
            .all(|&lp| grid.vortex_loop(lp).is_some_and(|l| l.is_triangle()))
    {
        return None;
    }

    let start = loops.iter().copied().min()?;
    let mut order = vec![start];
    let mut current = start;
    loop {
        let data = grid.vortex_loop(current)?;
        let i = data.local_index(hub)?;
        let prev = data.nodes[(i + data.len() - 1) % data.len()];
        let spoke = grid.edge_between(prev, hub)?;
        let next = grid.edge(spoke)?.other_side(current)?;
        if next == start {
            break;
        }
        if order.contains(&next) {
            return None;
        }
        order.push(next);
        current = next;
    }
    (order.len() == loops.len()).then_some(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn octagon_fan() -> (Grid, NodeKey) {
        let mut grid = Grid::new();
        let hub = grid.add_node(0.0, 0.0, 0.0);
        let ring: Vec<NodeKey> = (0..8)
            .map(|k| {
                let t = std::f64::consts::FRAC_PI_4 * k as f64;
                grid.add_node(t.cos(), t.sin(), 0.0)
            })
            .collect();
        for k in 0..8 {
            grid.add_loop(&[hub, ring[k], ring[(k + 1) % 8]], 0).unwrap();
        }
        grid.classify_boundaries(30.0);
        (grid, hub)
    }

    #[test]
    fn octagon_fan_becomes_four_quads() {
        let (mut grid, hub) = octagon_fan();
        let area = grid.surface_area();

        let dissolved = clean_up_fans(&mut grid, &AgglomConfig::default()).unwrap();
        assert_eq!(dissolved, 4);
        assert_eq!(grid.loop_count(), 4);
        assert!(grid.loops().all(|(_, l)| l.len() == 4));
        assert_eq!(grid.node_edges(hub).len(), 4);
        assert_relative_eq!(grid.surface_area(), area, epsilon = 1e-12);

        assert_eq!(clean_up_fans(&mut grid, &AgglomConfig::default()).unwrap(), 0);
    }

    #[test]
    fn small_fans_are_kept() {
        let (mut grid, _) = octagon_fan();
        let config = AgglomConfig::default().with_fan_min_triangles(9);
        assert_eq!(clean_up_fans(&mut grid, &config).unwrap(), 0);
        assert_eq!(grid.loop_count(), 8);
    }
}
