// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Assembly of the coarse grid from a finished session.
//!
//! Coarse loops are emitted in fine-loop slot order: a merged pair appears
//! where its first fine loop sat, an unmerged fine loop is copied as is.
//! Coarse edges inherit the tags of the fine edges they coincide with, and
//! pinned node tags are carried over before the coarse grid is classified.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::{smallvec, SmallVec};
use vortex_grid::{EdgeKey, Grid, LoopKey, NodeKey};

use crate::error::Result;
use crate::session::AgglomerationSession;

/// A committed coarse loop, in terms of the fine grid.
#[derive(Debug, Clone, PartialEq)]
pub struct CoarseLoopRecord {
    /// Fine node cycle.
    pub nodes: Vec<NodeKey>,
    /// Fine loops absorbed into this coarse loop.
    pub fine_loops: SmallVec<[LoopKey; 2]>,
    pub surface: u32,
    pub deviation: f64,
}

impl AgglomerationSession<'_> {
    /// Builds the coarse grid from the committed merges and the loops left
    /// unmerged.
    pub fn build_coarse_grid(&self) -> Result<Grid> {
        let fine = self.fine;

        let mut owner: FxHashMap<LoopKey, usize> = FxHashMap::default();
        for (index, record) in self.records.iter().enumerate() {
            for &lp in &record.fine_loops {
                owner.insert(lp, index);
            }
        }

        let mut plan: Vec<CoarseLoopRecord> = Vec::with_capacity(fine.loop_count());
        let mut emitted: FxHashSet<usize> = FxHashSet::default();
        for (lp, data) in fine.loops() {
            match owner.get(&lp) {
                Some(&index) => {
                    if emitted.insert(index) {
                        plan.push(self.records[index].clone());
                    }
                }
                None => plan.push(CoarseLoopRecord {
                    nodes: data.nodes.clone(),
                    fine_loops: smallvec![lp],
                    surface: data.surface,
                    deviation: 0.0,
                }),
            }
        }

        let used: FxHashSet<NodeKey> = plan.iter().flat_map(|r| r.nodes.iter().copied()).collect();
        let mut coarse = Grid::new();
        let mut to_coarse: FxHashMap<NodeKey, NodeKey> = FxHashMap::default();
        let mut to_fine: FxHashMap<NodeKey, NodeKey> = FxHashMap::default();
        for (nk, node) in fine.nodes() {
            if !used.contains(&nk) {
                continue;
            }
            let ck = coarse.add_node_at(node.position);
            if let Some(bc) = node.fixed_bc {
                coarse.set_node_bc(ck, bc)?;
            }
            to_coarse.insert(nk, ck);
            to_fine.insert(ck, nk);
        }

        for record in &plan {
            let nodes: Vec<NodeKey> = record.nodes.iter().map(|n| to_coarse[n]).collect();
            coarse.add_loop_from(&nodes, record.surface, &record.fine_loops)?;
        }

        let tags: Vec<(EdgeKey, _)> = coarse
            .edges()
            .filter_map(|(ek, edge)| {
                let fine_edge = fine.edge_between(to_fine[&edge.nodes[0]], to_fine[&edge.nodes[1]])?;
                let bc = fine.edge_bc(fine_edge)?;
                (!bc.is_interior()).then_some((ek, bc))
            })
            .collect();
        for (ek, bc) in tags {
            coarse.set_edge_bc(ek, bc)?;
        }

        coarse.classify_boundaries(self.config.corner_angle);
        tracing::debug!(
            loops = coarse.loop_count(),
            nodes = coarse.node_count(),
            merged = self.records.len(),
            "Coarse grid assembled"
        );
        Ok(coarse)
    }

    /// Runs a second front pass over the loops left unmerged that also
    /// accepts merged triangles, then assembles the mixed coarse grid
    /// (CreateMixedMesh).
    pub fn create_mixed_mesh(&mut self) -> Result<Grid> {
        self.allow_triangle_merges();
        let merges = self.run_front();
        tracing::debug!(merges, "Mixed-mesh pass finished");
        self.build_coarse_grid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgglomConfig;
    use vortex_grid::construction::make_triangle_strip;
    use vortex_grid::BoundaryCondition;

    #[test]
    fn strip_becomes_four_quads() {
        let (fine, _) = make_triangle_strip(4, 1).unwrap();
        let config = AgglomConfig::default();
        let mut session = AgglomerationSession::new(&fine, &config);
        session.run_front();

        let coarse = session.build_coarse_grid().unwrap();
        assert_eq!(coarse.loop_count(), 4);
        assert_eq!(coarse.node_count(), 10);
        assert!(coarse.loops().all(|(_, l)| l.len() == 4 && l.fine_loops.len() == 2));
    }

    #[test]
    fn unmerged_loops_are_copied_with_tags() {
        let (mut fine, nodes) = make_triangle_strip(1, 1).unwrap();
        let diag = fine.edge_between(nodes[0], nodes[3]).unwrap();
        fine.set_edge_bc(diag, BoundaryCondition::LeadingEdge).unwrap();
        fine.set_node_bc(nodes[1], BoundaryCondition::TrailingEdge).unwrap();
        fine.classify_boundaries(30.0);

        let config = AgglomConfig::default();
        let mut session = AgglomerationSession::new(&fine, &config);
        assert_eq!(session.run_front(), 0);

        let coarse = session.build_coarse_grid().unwrap();
        assert_eq!(coarse.loop_count(), 2);
        let le = coarse
            .edges()
            .filter(|(_, e)| e.bc == BoundaryCondition::LeadingEdge)
            .count();
        assert_eq!(le, 1);
        let pinned = coarse
            .nodes()
            .filter(|(_, n)| n.fixed_bc == Some(BoundaryCondition::TrailingEdge))
            .count();
        assert_eq!(pinned, 1);
    }
}
