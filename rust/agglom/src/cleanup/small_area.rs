// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Removal of loops that are tiny compared to their neighbors.

use vortex_grid::{Grid, LoopKey};

use super::absorb_into_neighbor;
use crate::config::AgglomConfig;
use crate::error::Result;

/// Merges every loop whose area is below `small_area_ratio` times the mean
/// area of its edge neighbors into the neighbor across its longest INTERIOR
/// edge (CleanUpSmallAreaLoops). The total area is unchanged.
///
/// Returns the number of loops removed.
pub fn clean_up_small_area_loops(grid: &mut Grid, config: &AgglomConfig) -> Result<usize> {
    let mut removed = 0;
    for lp in grid.loop_keys() {
        if !is_small(grid, lp, config.small_area_ratio) {
            continue;
        }
        if absorb_into_neighbor(grid, lp)? {
            removed += 1;
        } else {
            tracing::debug!(lp = ?lp, "Small loop has no neighbor to merge into");
        }
    }
    if removed > 0 {
        tracing::debug!(removed, "Small-area loops merged");
    }
    Ok(removed)
}

fn is_small(grid: &Grid, lp: LoopKey, ratio: f64) -> bool {
    let Some(area) = grid.loop_area(lp) else {
        return false;
    };
    let mut neighbors: Vec<LoopKey> = grid.loop_neighbors(lp).iter().map(|nb| nb.lp).collect();
    neighbors.sort_unstable();
    neighbors.dedup();
    if neighbors.is_empty() {
        return false;
    }
    let mean = neighbors.iter().filter_map(|&nb| grid.loop_area(nb)).sum::<f64>() / neighbors.len() as f64;
    area < ratio * mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use vortex_grid::construction::make_triangle_strip;

    #[test]
    fn zero_area_sliver_is_absorbed() {
        // Unit square split into a triangle and a quad, with a zero-area
        // triangle wedged on the diagonal through the flat node `m`.
        let mut grid = Grid::new();
        let a = grid.add_node(0.0, 0.0, 0.0);
        let b = grid.add_node(1.0, 0.0, 0.0);
        let c = grid.add_node(1.0, 1.0, 0.0);
        let d = grid.add_node(0.0, 1.0, 0.0);
        let m = grid.add_node(0.5, 0.5, 0.0);
        grid.add_loop(&[a, b, c], 0).unwrap();
        let sliver = grid.add_loop(&[a, c, m], 0).unwrap();
        grid.add_loop(&[a, m, c, d], 0).unwrap();
        grid.classify_boundaries(30.0);
        let area = grid.surface_area();

        let removed = clean_up_small_area_loops(&mut grid, &AgglomConfig::default()).unwrap();
        assert_eq!(removed, 1);
        assert!(grid.vortex_loop(sliver).is_none());
        assert_eq!(grid.loop_count(), 2);
        assert_relative_eq!(grid.surface_area(), area, epsilon = 1e-12);
        assert!(crate::check::check_mesh(&grid).is_empty());
    }

    #[test]
    fn uniform_grid_has_no_small_loops() {
        let (mut grid, _) = make_triangle_strip(2, 2).unwrap();
        assert_eq!(clean_up_small_area_loops(&mut grid, &AgglomConfig::default()).unwrap(), 0);
    }
}
