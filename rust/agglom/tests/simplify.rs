// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cleanup-only simplification.

use approx::assert_relative_eq;
use vortex_agglom::{check_mesh, Agglomerator};
use vortex_grid::construction::make_triangle_strip;
use vortex_grid::{Grid, GridSnapshot};

/// Unit square: a triangle, a zero-area sliver on the diagonal, and a quad
/// with a flat vertex at the sliver's apex.
fn square_with_sliver() -> Grid {
    let mut grid = Grid::new();
    let a = grid.add_node(0.0, 0.0, 0.0);
    let b = grid.add_node(1.0, 0.0, 0.0);
    let c = grid.add_node(1.0, 1.0, 0.0);
    let d = grid.add_node(0.0, 1.0, 0.0);
    let m = grid.add_node(0.5, 0.5, 0.0);
    grid.add_loop(&[a, b, c], 0).unwrap();
    grid.add_loop(&[a, c, m], 0).unwrap();
    grid.add_loop(&[a, m, c, d], 0).unwrap();
    grid.classify_boundaries(30.0);
    grid
}

#[test]
fn sliver_is_removed_and_area_kept() {
    let fine = square_with_sliver();
    let (simplified, summary) = Agglomerator::default().simplify_mesh_with_summary(&fine).unwrap();

    assert_eq!(summary.small_loops, 1);
    assert!(simplified.loop_count() < fine.loop_count());
    assert!(simplified
        .loop_keys()
        .iter()
        .all(|&lp| simplified.loop_area(lp).unwrap() > 1e-6));
    assert_relative_eq!(simplified.surface_area(), 1.0, epsilon = 1e-12);
    assert!(check_mesh(&simplified).is_empty());
}

#[test]
fn simplify_is_idempotent() {
    let agglomerator = Agglomerator::default();
    let once = agglomerator.simplify_mesh(&square_with_sliver()).unwrap();
    let twice = agglomerator.simplify_mesh(&once).unwrap();
    assert_eq!(twice.to_snapshot(), once.to_snapshot());
}

#[test]
fn duplicate_nodes_are_welded() {
    // Two triangles meeting along a diagonal whose nodes were emitted twice.
    let snapshot = GridSnapshot::from_points(&[
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
    ])
    .with_loop(&[0, 1, 2], 0)
    .with_loop(&[3, 4, 5], 0);
    let fine = Grid::from_snapshot(&snapshot, 30.0).unwrap();
    assert_eq!(fine.edge_count(), 6);

    let (simplified, summary) = Agglomerator::default().simplify_mesh_with_summary(&fine).unwrap();
    assert_eq!(summary.duplicate_nodes, 2);
    assert_eq!(simplified.node_count(), 4);
    assert_eq!(simplified.edge_count(), 5);
    assert!(check_mesh(&simplified).is_empty());
}

#[test]
fn coarse_grid_simplification_changes_nothing_more() {
    let (fine, _) = make_triangle_strip(4, 2).unwrap();
    let agglomerator = Agglomerator::default();
    let coarse = agglomerator.agglomerate(&fine).unwrap();
    let simplified = agglomerator.simplify_mesh(&coarse).unwrap();
    assert_eq!(simplified.loop_count(), coarse.loop_count());
    assert_relative_eq!(simplified.surface_area(), fine.surface_area(), epsilon = 1e-12);
}
