// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Removal of hanging nodes along straight edges.

use vortex_grid::{BoundaryCondition, EdgeKey, Grid, LoopKey, NodeKey};

use crate::config::AgglomConfig;
use crate::error::Result;
use crate::quality::edges_are_colinear;

/// A node that can be removed, joining its two edges into one.
struct Hanging {
    node: NodeKey,
    ends: [NodeKey; 2],
    bc: BoundaryCondition,
    loops: Vec<LoopKey>,
}

/// Joins pairs of colinear edges that meet at a node with no other edges
/// (MergeColinearEdges). Both edges must carry the same tag and border the
/// same loops, and every loop touched must keep at least three nodes.
/// Corners and pinned nodes are never removed.
pub fn merge_colinear_edges(grid: &Grid, config: &AgglomConfig) -> Result<Grid> {
    let mut out = grid.clone();
    let mut removed = 0usize;

    loop {
        let mut changed = false;
        for nk in out.node_keys() {
            let Some(hanging) = hanging_node(&out, nk, config.colinear_angle) else {
                continue;
            };
            for &lp in &hanging.loops {
                let Some(data) = out.vortex_loop(lp) else {
                    continue;
                };
                let cycle: Vec<NodeKey> = data.nodes.iter().copied().filter(|&n| n != nk).collect();
                out.replace_loop_nodes(lp, &cycle)?;
            }
            if let Some(ek) = out.edge_between(hanging.ends[0], hanging.ends[1]) {
                out.set_edge_bc(ek, hanging.bc)?;
            }
            if out.remove_node(hanging.node) {
                removed += 1;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    if removed > 0 {
        out.classify_boundaries(config.corner_angle);
        tracing::debug!(removed, "Merged colinear edges");
    }
    Ok(out)
}

fn hanging_node(grid: &Grid, nk: NodeKey, colinear_angle: f64) -> Option<Hanging> {
    let node = grid.node(nk)?;
    if node.bc == BoundaryCondition::Corner || node.fixed_bc.is_some() {
        return None;
    }
    let [e1, e2]: [EdgeKey; 2] = grid.node_edges(nk).try_into().ok()?;
    let (first, second) = (grid.edge(e1)?, grid.edge(e2)?);
    if first.bc != second.bc || sorted_sides(first.sides) != sorted_sides(second.sides) {
        return None;
    }
    if !edges_are_colinear(grid, e1, e2, colinear_angle) {
        return None;
    }

    let a = first.other_node(nk)?;
    let b = second.other_node(nk)?;
    let m = node.position;
    let (pa, pb) = (grid.node_point(a)?, grid.node_point(b)?);
    // `m` must lie between its neighbors, not on a spike folding back.
    if (pa - m).dot(&(pb - m)) >= 0.0 || grid.edge_between(a, b).is_some() {
        return None;
    }

    let loops = grid.node_loops(nk).to_vec();
    if loops
        .iter()
        .any(|&lp| grid.vortex_loop(lp).map_or(true, |l| l.len() < 4))
    {
        return None;
    }
    Some(Hanging {
        node: nk,
        ends: [a, b],
        bc: first.bc,
        loops,
    })
}

fn sorted_sides(mut sides: [Option<LoopKey>; 2]) -> [Option<LoopKey>; 2] {
    sides.sort_unstable();
    sides
}
