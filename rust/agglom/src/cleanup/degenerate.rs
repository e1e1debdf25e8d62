// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Orphan, pinched and valence-2 node handling.

use vortex_grid::{Grid, NodeKey};

use crate::error::Result;

/// Outcome of [`check_for_degenerate_nodes`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DegenerateNodeReport {
    pub orphans_removed: usize,
    pub valence_two_dissolved: usize,
    /// Nodes where separate fans of loops touch; flagged, not repaired.
    pub pinched: usize,
}

/// Finds degenerate nodes and repairs what can be repaired
/// (CheckForDegenerateNodes).
///
/// - Nodes used by no loop are removed.
/// - Pinched nodes (several separate fans) get their `degenerate` flag set.
/// - Interior nodes with exactly two edges are removed from both loops when
///   each loop keeps at least three nodes; otherwise they are flagged.
pub fn check_for_degenerate_nodes(grid: &mut Grid) -> Result<DegenerateNodeReport> {
    let mut report = DegenerateNodeReport::default();

    for nk in grid.node_keys() {
        grid.set_node_degenerate(nk, false);

        if grid.node_loops(nk).is_empty() {
            if grid.remove_node(nk) {
                report.orphans_removed += 1;
            }
            continue;
        }

        if grid.node_fans(nk).len() > 1 {
            tracing::warn!(node = ?nk, "Pinched node: separate loop fans share it");
            grid.set_node_degenerate(nk, true);
            report.pinched += 1;
            continue;
        }

        let on_border = grid.node(nk).is_some_and(|n| n.on_surface_border);
        if !on_border && grid.node_edges(nk).len() == 2 {
            if dissolve_valence_two(grid, nk)? {
                report.valence_two_dissolved += 1;
            } else {
                grid.set_node_degenerate(nk, true);
            }
        }
    }

    if report != DegenerateNodeReport::default() {
        tracing::debug!(
            orphans = report.orphans_removed,
            valence_two = report.valence_two_dissolved,
            pinched = report.pinched,
            "Degenerate nodes handled"
        );
    }
    Ok(report)
}

fn dissolve_valence_two(grid: &mut Grid, node: NodeKey) -> Result<bool> {
    let ends: Vec<NodeKey> = grid
        .node_edges(node)
        .iter()
        .filter_map(|&ek| grid.edge(ek).and_then(|e| e.other_node(node)))
        .collect();
    let [a, b] = ends[..] else {
        return Ok(false);
    };
    if grid.edge_between(a, b).is_some() {
        return Ok(false);
    }

    let loops = grid.node_loops(node).to_vec();
    let mut cycles = Vec::with_capacity(loops.len());
    for &lp in &loops {
        let Some(data) = grid.vortex_loop(lp) else {
            return Ok(false);
        };
        if data.len() < 4 {
            return Ok(false);
        }
        let cycle: Vec<NodeKey> = data.nodes.iter().copied().filter(|&n| n != node).collect();
        cycles.push((lp, cycle));
    }

    for (lp, cycle) in cycles {
        grid.replace_loop_nodes(lp, &cycle)?;
    }
    Ok(grid.remove_node(node))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orphans_are_removed() {
        let (mut grid, _) = vortex_grid::construction::make_triangle_strip(1, 1).unwrap();
        grid.add_node(3.0, 3.0, 0.0);
        let report = check_for_degenerate_nodes(&mut grid).unwrap();
        assert_eq!(report.orphans_removed, 1);
        assert_eq!(grid.node_count(), 4);
    }

    #[test]
    fn pinched_node_is_flagged() {
        // Two triangles touching only at `hub`.
        let mut grid = Grid::new();
        let hub = grid.add_node(0.0, 0.0, 0.0);
        let a = grid.add_node(1.0, 0.0, 0.0);
        let b = grid.add_node(0.0, 1.0, 0.0);
        let c = grid.add_node(-1.0, 0.0, 0.0);
        let d = grid.add_node(0.0, -1.0, 0.0);
        grid.add_loop(&[hub, a, b], 0).unwrap();
        grid.add_loop(&[hub, c, d], 0).unwrap();
        grid.classify_boundaries(30.0);

        let report = check_for_degenerate_nodes(&mut grid).unwrap();
        assert_eq!(report.pinched, 1);
        assert!(grid.node(hub).unwrap().degenerate);
        assert_eq!(grid.loop_count(), 2);
    }

    #[test]
    fn interior_valence_two_node_is_dissolved() {
        // Two quads sharing the bent chain a - m - b; m has only two edges
        // and is not on the outer border.
        let mut grid = Grid::new();
        let a = grid.add_node(0.0, 0.0, 0.0);
        let m = grid.add_node(0.1, 1.0, 0.0);
        let b = grid.add_node(0.0, 2.0, 0.0);
        let l = grid.add_node(-1.0, 1.0, 0.0);
        let r = grid.add_node(1.0, 1.0, 0.0);
        grid.add_loop(&[a, m, b, l], 0).unwrap();
        grid.add_loop(&[m, a, r, b], 0).unwrap();
        grid.classify_boundaries(30.0);
        assert!(!grid.node(m).unwrap().on_surface_border);

        let report = check_for_degenerate_nodes(&mut grid).unwrap();
        assert_eq!(report.valence_two_dissolved, 1);
        assert!(grid.node(m).is_none());
        assert!(grid.loops().all(|(_, data)| data.len() == 3));
        assert!(grid.edge_between(a, b).is_some());
    }
}
