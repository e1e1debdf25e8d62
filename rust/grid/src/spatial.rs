// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spatial index for tolerance-based node lookup.
//!
//! Uses a grid-based spatial hash for O(1) average-case neighbor queries.
//! Duplicate-node removal relies on it to find nodes within a weld tolerance.

use nalgebra::Point3;
use rustc_hash::FxHashMap;

use crate::arena::Grid;
use crate::keys::NodeKey;

/// A spatial hash for fast tolerance-based node lookup.
///
/// Space is divided into cubic cells of side `cell_size`; queries scan the
/// 3x3x3 block of cells around the query point.
#[derive(Debug)]
pub struct SpatialIndex {
    cell_size: f64,
    cells: FxHashMap<(i64, i64, i64), Vec<NodeKey>>,
}

impl SpatialIndex {
    /// Creates a new spatial index with the given cell size.
    ///
    /// `cell_size` should be >= the tolerance used for queries.
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: cell_size.max(f64::MIN_POSITIVE),
            cells: FxHashMap::default(),
        }
    }

    /// Builds a spatial index from all nodes of a grid.
    pub fn from_grid(grid: &Grid, cell_size: f64) -> Self {
        let mut index = Self::new(cell_size);
        for (key, data) in grid.nodes.iter() {
            index.insert(key, &data.position);
        }
        index
    }

    /// Inserts a node key at the given position.
    pub fn insert(&mut self, key: NodeKey, p: &Point3<f64>) {
        let cell = self.cell_coords(p);
        self.cells.entry(cell).or_default().push(key);
    }

    /// Finds all nodes within `tolerance` of `p`, in insertion order.
    pub fn find_all_near(&self, grid: &Grid, p: &Point3<f64>, tolerance: f64) -> Vec<NodeKey> {
        let (cx, cy, cz) = self.cell_coords(p);
        let tol_sq = tolerance * tolerance;
        let mut result = Vec::new();

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(keys) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &nk in keys {
                        if let Some(q) = grid.node_point(nk) {
                            if (q - p).norm_squared() <= tol_sq {
                                result.push(nk);
                            }
                        }
                    }
                }
            }
        }

        result.sort();
        result
    }

    fn cell_coords(&self, p: &Point3<f64>) -> (i64, i64, i64) {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
            (p.z / self.cell_size).floor() as i64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_nodes_within_tolerance() {
        let mut grid = Grid::new();
        let a = grid.add_node(0.0, 0.0, 0.0);
        let b = grid.add_node(1e-7, 0.0, 0.0);
        let far = grid.add_node(1.0, 0.0, 0.0);

        let index = SpatialIndex::from_grid(&grid, 1e-6);
        let near = index.find_all_near(&grid, &Point3::new(0.0, 0.0, 0.0), 1e-6);
        assert_eq!(near, vec![a, b]);
        assert!(!near.contains(&far));
    }

    #[test]
    fn query_crosses_cell_borders() {
        let mut grid = Grid::new();
        let a = grid.add_node(0.999_999_9, 0.0, 0.0);
        let b = grid.add_node(1.000_000_1, 0.0, 0.0);

        let index = SpatialIndex::from_grid(&grid, 1e-3);
        let near = index.find_all_near(&grid, &grid.node_point(a).unwrap(), 1e-3);
        assert!(near.contains(&b));
    }
}
