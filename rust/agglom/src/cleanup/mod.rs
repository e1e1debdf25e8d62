// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh repair passes.
//!
//! Each pass fixes one kind of defect and does nothing on a grid that does
//! not have it, so running a pass twice changes nothing the second time.
//! [`clean_up_mesh`] runs them once in the order below:
//!
//! 1. [`delete_duplicate_nodes`]: weld coincident nodes.
//! 2. [`check_for_degenerate_nodes`]: drop orphans, dissolve interior
//!    valence-2 nodes, flag pinches.
//! 3. [`clean_up_small_area_loops`]: absorb slivers into a neighbor.
//! 4. [`clean_up_high_aspect_ratio_tris`]: collapse needles, absorb caps.
//! 5. [`clean_up_fans`]: pair up triangles around crowded interior nodes.
//! 6. [`merge_colinear_edges`]: remove hanging nodes on straight edges.
//!
//! Passes 4 and 5 can orphan nodes, so the degenerate-node check runs once
//! more at the end.

mod aspect;
mod colinear;
mod degenerate;
mod duplicates;
mod fans;
mod small_area;

use std::fmt;

use rustc_hash::FxHashMap;
use vortex_grid::{BoundaryCondition, Grid, LoopKey, NodeKey};

use crate::config::AgglomConfig;
use crate::error::Result;
use crate::merge::splice_across;

pub use aspect::clean_up_high_aspect_ratio_tris;
pub use colinear::merge_colinear_edges;
pub use degenerate::{check_for_degenerate_nodes, DegenerateNodeReport};
pub use duplicates::delete_duplicate_nodes;
pub use fans::clean_up_fans;
pub use small_area::clean_up_small_area_loops;

/// What one cleanup round changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    pub duplicate_nodes: usize,
    pub orphan_nodes: usize,
    pub valence_two_nodes: usize,
    /// Pinched nodes left in place (reported, not repaired).
    pub pinch_nodes: usize,
    pub small_loops: usize,
    pub bad_triangles: usize,
    pub fan_spokes: usize,
    pub colinear_nodes: usize,
}

impl CleanupSummary {
    /// Number of edits made. Pinched nodes are not edits.
    pub fn changes(&self) -> usize {
        self.duplicate_nodes
            + self.orphan_nodes
            + self.valence_two_nodes
            + self.small_loops
            + self.bad_triangles
            + self.fan_spokes
            + self.colinear_nodes
    }

    /// Adds the counts of a later round.
    pub fn accumulate(&mut self, other: &CleanupSummary) {
        self.duplicate_nodes += other.duplicate_nodes;
        self.orphan_nodes += other.orphan_nodes;
        self.valence_two_nodes += other.valence_two_nodes;
        self.pinch_nodes = other.pinch_nodes;
        self.small_loops += other.small_loops;
        self.bad_triangles += other.bad_triangles;
        self.fan_spokes += other.fan_spokes;
        self.colinear_nodes += other.colinear_nodes;
    }

    fn add_degenerate(&mut self, report: DegenerateNodeReport) {
        self.orphan_nodes += report.orphans_removed;
        self.valence_two_nodes += report.valence_two_dissolved;
        self.pinch_nodes = report.pinched;
    }
}

impl fmt::Display for CleanupSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} duplicate, {} orphan, {} valence-2 and {} colinear nodes removed; \
             {} small loops, {} bad triangles, {} fan spokes cleaned; {} pinch nodes",
            self.duplicate_nodes,
            self.orphan_nodes,
            self.valence_two_nodes,
            self.colinear_nodes,
            self.small_loops,
            self.bad_triangles,
            self.fan_spokes,
            self.pinch_nodes
        )
    }
}

/// Runs every cleanup pass once (CleanUpMesh).
pub fn clean_up_mesh(grid: &Grid, config: &AgglomConfig) -> Result<(Grid, CleanupSummary)> {
    let mut summary = CleanupSummary::default();

    let before = grid.node_count();
    let mut grid = delete_duplicate_nodes(grid, config)?;
    summary.duplicate_nodes = before.saturating_sub(grid.node_count());

    summary.add_degenerate(check_for_degenerate_nodes(&mut grid)?);
    summary.small_loops = clean_up_small_area_loops(&mut grid, config)?;
    summary.bad_triangles = clean_up_high_aspect_ratio_tris(&mut grid, config)?;
    summary.fan_spokes = clean_up_fans(&mut grid, config)?;

    let before = grid.node_count();
    let mut grid = merge_colinear_edges(&grid, config)?;
    summary.colinear_nodes = before.saturating_sub(grid.node_count());

    summary.add_degenerate(check_for_degenerate_nodes(&mut grid)?);
    grid.classify_boundaries(config.corner_angle);

    tracing::debug!(changes = summary.changes(), %summary, "Cleanup round finished");
    Ok((grid, summary))
}

/// Replaces `keep` by `cycle` and deletes `absorbed`, keeping the tags of
/// `absorbed`'s edges that reappear in the new cycle.
pub(crate) fn absorb_loop(grid: &mut Grid, keep: LoopKey, absorbed: LoopKey, cycle: &[NodeKey]) -> Result<()> {
    let mut tags: FxHashMap<(NodeKey, NodeKey), BoundaryCondition> = FxHashMap::default();
    if let Some(data) = grid.vortex_loop(absorbed) {
        for &ek in &data.edges {
            if let Some(edge) = grid.edge(ek).filter(|e| !e.bc.is_interior()) {
                tags.insert((edge.nodes[0], edge.nodes[1]), edge.bc);
            }
        }
    }

    grid.remove_loop(absorbed);
    grid.replace_loop_nodes(keep, cycle)?;

    for ((a, b), bc) in tags {
        if let Some(ek) = grid.edge_between(a, b) {
            let current = grid.edge_bc(ek).unwrap_or(BoundaryCondition::Interior);
            grid.set_edge_bc(ek, current.most_restrictive(bc))?;
        }
    }
    Ok(())
}

/// Merges `lp` into the neighbor across its longest INTERIOR edge, falling
/// back to shorter edges when a splice is impossible. Returns whether a
/// merge happened.
pub(crate) fn absorb_into_neighbor(grid: &mut Grid, lp: LoopKey) -> Result<bool> {
    let mut options: Vec<(f64, vortex_grid::Neighbor)> = grid
        .loop_neighbors(lp)
        .into_iter()
        .filter(|nb| grid.edge_bc(nb.edge).is_some_and(BoundaryCondition::is_interior))
        .map(|nb| (grid.edge_length(nb.edge).unwrap_or(0.0), nb))
        .collect();
    options.sort_by(|(la, a), (lb, b)| lb.total_cmp(la).then_with(|| a.edge.cmp(&b.edge)));

    for (_, nb) in options {
        if let Some(cycle) = splice_across(grid, nb.lp, lp, nb.edge) {
            absorb_loop(grid, nb.lp, lp, &cycle)?;
            return Ok(true);
        }
    }
    Ok(false)
}
