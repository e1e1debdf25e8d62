// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Welding of coincident nodes.

use rustc_hash::{FxHashMap, FxHashSet};
use vortex_grid::{Grid, NodeKey, SpatialIndex};

use crate::config::AgglomConfig;
use crate::error::Result;

/// Merges nodes closer than `duplicate_tolerance` times the bounding-box
/// diagonal (DeleteDuplicateNodes).
///
/// The first node of each cluster in slot order survives. Loops that
/// collapse below three nodes or repeat an already kept loop are dropped.
/// Returns an unchanged copy when no duplicates exist.
pub fn delete_duplicate_nodes(grid: &Grid, config: &AgglomConfig) -> Result<Grid> {
    let diagonal = grid.bounding_diagonal();
    let tolerance = config.duplicate_tolerance * diagonal;
    let cell = if tolerance > 0.0 {
        tolerance
    } else {
        (diagonal * 1e-9).max(1e-12)
    };
    let index = SpatialIndex::from_grid(grid, cell);

    let mut representative: FxHashMap<NodeKey, NodeKey> = FxHashMap::default();
    let mut duplicates = 0usize;
    for (nk, node) in grid.nodes() {
        if representative.contains_key(&nk) {
            continue;
        }
        representative.insert(nk, nk);
        for other in index.find_all_near(grid, &node.position, tolerance) {
            if !representative.contains_key(&other) {
                representative.insert(other, nk);
                duplicates += 1;
            }
        }
    }
    if duplicates == 0 {
        return Ok(grid.clone());
    }

    let mut out = Grid::new();
    let mut new_key: FxHashMap<NodeKey, NodeKey> = FxHashMap::default();
    for (nk, node) in grid.nodes() {
        if representative[&nk] == nk {
            new_key.insert(nk, out.add_node_at(node.position));
        }
    }
    let resolve = |nk: &NodeKey| new_key[&representative[nk]];

    for (nk, node) in grid.nodes() {
        if let Some(bc) = node.fixed_bc {
            let target = resolve(&nk);
            let pinned = out
                .node(target)
                .and_then(|n| n.fixed_bc)
                .map_or(bc, |current| current.most_restrictive(bc));
            out.set_node_bc(target, pinned)?;
        }
    }

    let mut kept: FxHashSet<Vec<NodeKey>> = FxHashSet::default();
    let mut collapsed = 0usize;
    for (lk, data) in grid.loops() {
        let mut cycle: Vec<NodeKey> = data.nodes.iter().map(resolve).collect();
        cycle.dedup();
        while cycle.len() > 1 && cycle.first() == cycle.last() {
            cycle.pop();
        }
        let repeats = (1..cycle.len()).any(|i| cycle[..i].contains(&cycle[i]));
        if cycle.len() < 3 || repeats {
            collapsed += 1;
            continue;
        }

        let mut signature = cycle.clone();
        signature.sort_unstable();
        if !kept.insert(signature) {
            collapsed += 1;
            continue;
        }

        match out.add_loop_from(&cycle, data.surface, &data.fine_loops) {
            Ok(_) => {}
            Err(vortex_grid::Error::NonManifoldEdge(edge)) => {
                tracing::warn!(lp = ?lk, ?edge, "Dropping loop that would overload an edge after welding");
                collapsed += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    for (_, edge) in grid.edges() {
        if edge.bc.is_interior() {
            continue;
        }
        let (a, b) = (resolve(&edge.nodes[0]), resolve(&edge.nodes[1]));
        if let Some(ek) = out.edge_between(a, b) {
            if let Some(current) = out.edge_bc(ek) {
                out.set_edge_bc(ek, current.most_restrictive(edge.bc))?;
            }
        }
    }
    out.classify_boundaries(config.corner_angle);

    tracing::debug!(duplicates, collapsed, "Welded duplicate nodes");
    Ok(out)
}
