// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Merge evaluation and commit.
//!
//! A merge fuses the two fine loops on either side of an INTERIOR edge into
//! one coarse loop. Only unmerged fine loops are paired, so every coarse loop
//! comes from one or two fine loops and the fine grid is never touched.

use std::fmt;

use smallvec::smallvec;
use vortex_grid::{EdgeKey, Grid, LoopKey, NodeKey};

use crate::builder::CoarseLoopRecord;
use crate::config::{AgglomConfig, MergePolicy};
use crate::front::EdgeStackEntry;
use crate::quality::{angle_deviation, corner_indices, is_convex, loops_are_coplanar, polygon_angles, quality_score};
use crate::session::{AgglomerationSession, AgglomerationState};

/// A feasible merge across one edge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeCandidate {
    pub edge: EdgeKey,
    pub loops: [LoopKey; 2],
    /// Node cycle of the merged loop, in the first loop's orientation.
    pub nodes: Vec<NodeKey>,
    /// Number of real (non-flat) corners.
    pub corners: usize,
    /// Worst corner deviation from the regular shape, in degrees.
    pub deviation: f64,
}

impl MergeCandidate {
    /// Quality score in `[0, 1]`.
    pub fn score(&self) -> f64 {
        quality_score(self.deviation)
    }
}

/// Why a merge was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotInterior,
    NotTwoSided,
    AlreadyMerged,
    /// The loops share this many edges instead of exactly one.
    SharedEdges(usize),
    /// The spliced cycle would visit a node twice.
    RepeatedNode,
    NotCoplanar,
    NotConvex,
    /// The merged loop would have this many corners.
    CornerCount(usize),
    TooDistorted,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NotInterior => f.write_str("edge is not interior"),
            RejectReason::NotTwoSided => f.write_str("edge does not separate two loops"),
            RejectReason::AlreadyMerged => f.write_str("a loop is already merged"),
            RejectReason::SharedEdges(n) => write!(f, "loops share {n} edges"),
            RejectReason::RepeatedNode => f.write_str("merged loop repeats a node"),
            RejectReason::NotCoplanar => f.write_str("loops are not coplanar"),
            RejectReason::NotConvex => f.write_str("merged loop is not convex"),
            RejectReason::CornerCount(n) => write!(f, "merged loop has {n} corners"),
            RejectReason::TooDistorted => f.write_str("merged loop is too distorted"),
        }
    }
}

/// What became of one popped edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Committed as coarse loop record `n`.
    Committed(usize),
    Deferred,
    Rejected(RejectReason),
}

/// Node cycle of `a` and `b` joined across `edge`, following `a`'s
/// orientation. `None` if either loop does not use the edge, the loops
/// traverse it in the same direction, or the result repeats a node.
pub fn splice_across(grid: &Grid, a: LoopKey, b: LoopKey, edge: EdgeKey) -> Option<Vec<NodeKey>> {
    let la = grid.vortex_loop(a)?;
    let lb = grid.vortex_loop(b)?;
    let i = la.local_edge_index(edge)?;
    let j = lb.local_edge_index(edge)?;
    let (na, nb) = (la.len(), lb.len());

    // `a` runs u -> v along the edge; `b` must run v -> u.
    let (u, v) = (la.nodes[i], la.nodes[(i + 1) % na]);
    if lb.nodes[j] != v || lb.nodes[(j + 1) % nb] != u {
        return None;
    }

    let mut cycle = Vec::with_capacity(na + nb - 2);
    cycle.extend((1..=na).map(|k| la.nodes[(i + k) % na]));
    cycle.extend((2..nb).map(|k| lb.nodes[(j + k) % nb]));

    for (k, n) in cycle.iter().enumerate() {
        if cycle[..k].contains(n) {
            return None;
        }
    }
    Some(cycle)
}

/// Node cycle of two loops joined across their single shared edge.
pub fn merged_cycle(grid: &Grid, a: LoopKey, b: LoopKey) -> Option<Vec<NodeKey>> {
    match grid.shared_edges(a, b).as_slice() {
        [edge] => splice_across(grid, a, b, *edge),
        _ => None,
    }
}

/// Evaluates the merge across `edge` on purely geometric and topological
/// grounds. The angle thresholds are applied by the caller's policy.
pub fn evaluate_merge(
    grid: &Grid,
    edge: EdgeKey,
    config: &AgglomConfig,
    allow_triangles: bool,
) -> Result<MergeCandidate, RejectReason> {
    let data = grid.edge(edge).ok_or(RejectReason::NotTwoSided)?;
    if !data.bc.is_interior() {
        return Err(RejectReason::NotInterior);
    }
    let [a, b] = data.both_sides().ok_or(RejectReason::NotTwoSided)?;

    let shared = grid.shared_edges(a, b).len();
    if shared != 1 {
        return Err(RejectReason::SharedEdges(shared));
    }
    let nodes = splice_across(grid, a, b, edge).ok_or(RejectReason::RepeatedNode)?;

    if !loops_are_coplanar(grid, a, b, config.coplanar_angle) {
        return Err(RejectReason::NotCoplanar);
    }

    let angles = grid
        .points_of(&nodes)
        .and_then(|points| polygon_angles(&points))
        .ok_or(RejectReason::NotConvex)?;
    if !is_convex(&angles, config.convex_max_angle) {
        return Err(RejectReason::NotConvex);
    }

    let corners = corner_indices(&angles, config.colinear_angle);
    let count = corners.len();
    if !(count == 4 || (allow_triangles && count == 3)) {
        return Err(RejectReason::CornerCount(count));
    }

    Ok(MergeCandidate {
        edge,
        loops: [a, b],
        nodes,
        corners: count,
        deviation: angle_deviation(&angles, &corners),
    })
}

impl AgglomerationSession<'_> {
    /// Cached [`evaluate_merge`] for a fine edge.
    pub fn evaluate(&mut self, edge: EdgeKey) -> Result<MergeCandidate, RejectReason> {
        if let Some(cached) = self.evaluations.get(&edge) {
            return cached.clone();
        }
        let result = evaluate_merge(self.fine, edge, self.config, self.allow_triangles);
        self.evaluations.insert(edge, result.clone());
        result
    }

    /// Tries to merge the two loops of a popped edge (MergeVortexLoops).
    pub fn merge_vortex_loops(&mut self, entry: EdgeStackEntry) -> MergeOutcome {
        self.advance(AgglomerationState::EvaluateMerge);
        self.stats.attempts += 1;

        if entry.sides.iter().any(|&lp| self.is_merged(lp)) {
            self.front.remove(entry.edge);
            return MergeOutcome::Rejected(RejectReason::AlreadyMerged);
        }
        for lp in entry.sides {
            match self.loop_hits.get_mut(lp) {
                Some(hits) => *hits += 1,
                None => {
                    self.loop_hits.insert(lp, 1);
                }
            }
        }

        let candidate = match self.evaluate(entry.edge) {
            Ok(candidate) => candidate,
            Err(reason) => return self.reject(entry.edge, reason),
        };

        match self.config.merge_policy {
            MergePolicy::Legacy => self.merge_vortex_loops_legacy(candidate),
            MergePolicy::QualityAware => {
                if candidate.deviation > self.config.worst_quad_angle {
                    return self.reject(entry.edge, RejectReason::TooDistorted);
                }
                if candidate.deviation <= self.config.good_quad_angle
                    || self.front.is_relaxed()
                    || !self.has_better_competitor(&candidate)
                {
                    return MergeOutcome::Committed(self.commit(candidate));
                }
                tracing::trace!(edge = ?entry.edge, deviation = candidate.deviation, "Deferred merge");
                self.stats.deferrals += 1;
                self.front.defer(entry);
                MergeOutcome::Deferred
            }
        }
    }

    /// Accepts any feasible merge in front order (MergeVortexLoopsOld).
    fn merge_vortex_loops_legacy(&mut self, candidate: MergeCandidate) -> MergeOutcome {
        MergeOutcome::Committed(self.commit(candidate))
    }

    /// Whether another live edge of either loop would give a strictly better
    /// merge than `candidate`.
    fn has_better_competitor(&mut self, candidate: &MergeCandidate) -> bool {
        let fine = self.fine;
        for lp in candidate.loops {
            let Some(data) = fine.vortex_loop(lp) else {
                continue;
            };
            for &ek in &data.edges {
                if ek == candidate.edge || !self.front.is_live(ek) {
                    continue;
                }
                if let Ok(other) = self.evaluate(ek) {
                    if other.deviation < candidate.deviation
                        && other.deviation <= self.config.worst_quad_angle
                    {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn reject(&mut self, edge: EdgeKey, reason: RejectReason) -> MergeOutcome {
        tracing::trace!(edge = ?edge, %reason, "Rejected merge");
        self.stats.dropped += 1;
        self.front.drop_edge(edge);
        MergeOutcome::Rejected(reason)
    }

    fn commit(&mut self, candidate: MergeCandidate) -> usize {
        self.advance(AgglomerationState::CommitMerge);
        let [a, b] = candidate.loops;
        self.merged.insert(a, ());
        self.merged.insert(b, ());

        if candidate.corners == 3 {
            self.stats.triangle_merges += 1;
        } else {
            self.stats.quad_merges += 1;
        }
        self.stats.merges += 1;
        self.stats.max_deviation = self.stats.max_deviation.max(candidate.deviation);
        tracing::trace!(
            edge = ?candidate.edge,
            deviation = candidate.deviation,
            corners = candidate.corners,
            "Committed merge"
        );

        let surface = self.fine.vortex_loop(a).map_or(0, |l| l.surface);
        self.records.push(CoarseLoopRecord {
            nodes: candidate.nodes,
            fine_loops: smallvec![a, b],
            surface,
            deviation: candidate.deviation,
        });
        self.front.note_commit();
        self.update_front([a, b]);
        self.records.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vortex_grid::construction::make_triangle_strip;
    use vortex_grid::BoundaryCondition;

    #[test]
    fn splice_joins_two_triangles_into_a_square() {
        let (grid, nodes) = make_triangle_strip(1, 1).unwrap();
        let loops = grid.loop_keys();
        let cycle = merged_cycle(&grid, loops[0], loops[1]).unwrap();
        assert_eq!(cycle, vec![nodes[0], nodes[1], nodes[3], nodes[2]]);
    }

    #[test]
    fn square_merge_is_perfect() {
        let (grid, nodes) = make_triangle_strip(1, 1).unwrap();
        let diag = grid.edge_between(nodes[0], nodes[3]).unwrap();
        let candidate = evaluate_merge(&grid, diag, &AgglomConfig::default(), false).unwrap();
        assert_eq!(candidate.corners, 4);
        assert!(candidate.deviation < 1e-9);
        assert!((candidate.score() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn border_edges_are_never_merged() {
        let (grid, nodes) = make_triangle_strip(1, 1).unwrap();
        let bottom = grid.edge_between(nodes[0], nodes[1]).unwrap();
        assert_eq!(grid.edge_bc(bottom), Some(BoundaryCondition::Boundary));
        assert_eq!(
            evaluate_merge(&grid, bottom, &AgglomConfig::default(), false),
            Err(RejectReason::NotInterior)
        );
    }

    #[test]
    fn tagged_interior_edge_blocks_merge() {
        let (mut grid, nodes) = make_triangle_strip(1, 1).unwrap();
        let diag = grid.edge_between(nodes[0], nodes[3]).unwrap();
        grid.set_edge_bc(diag, BoundaryCondition::TrailingEdge).unwrap();
        assert_eq!(
            evaluate_merge(&grid, diag, &AgglomConfig::default(), false),
            Err(RejectReason::NotInterior)
        );
    }

    #[test]
    fn triangle_result_needs_mixed_mode() {
        // Two triangles whose union is a triangle with a flat hanging node.
        let mut grid = Grid::new();
        let a = grid.add_node(0.0, 0.0, 0.0);
        let m = grid.add_node(1.0, 0.0, 0.0);
        let b = grid.add_node(2.0, 0.0, 0.0);
        let c = grid.add_node(1.0, 1.0, 0.0);
        grid.add_loop(&[a, m, c], 0).unwrap();
        grid.add_loop(&[m, b, c], 0).unwrap();
        grid.classify_boundaries(30.0);
        let spoke = grid.edge_between(m, c).unwrap();

        let config = AgglomConfig::default();
        assert_eq!(
            evaluate_merge(&grid, spoke, &config, false),
            Err(RejectReason::CornerCount(3))
        );
        let candidate = evaluate_merge(&grid, spoke, &config, true).unwrap();
        assert_eq!(candidate.corners, 3);
        assert!((candidate.deviation - 30.0).abs() < 1e-9);
    }

    #[test]
    fn non_convex_merge_is_rejected() {
        // Dart: the union of the two triangles has a reflex vertex at `d`.
        let mut grid = Grid::new();
        let a = grid.add_node(0.0, 0.0, 0.0);
        let b = grid.add_node(2.0, 0.0, 0.0);
        let c = grid.add_node(1.0, 2.0, 0.0);
        let d = grid.add_node(1.0, 0.5, 0.0);
        grid.add_loop(&[a, d, c], 0).unwrap();
        grid.add_loop(&[d, b, c], 0).unwrap();
        grid.classify_boundaries(30.0);
        let spoke = grid.edge_between(d, c).unwrap();
        assert_eq!(
            evaluate_merge(&grid, spoke, &AgglomConfig::default(), false),
            Err(RejectReason::NotConvex)
        );
    }

    /// The vertical edge between the first two squares of a strip: merging
    /// across it gives a 45 degree parallelogram.
    fn skewed_entry(grid: &Grid, nodes: &[NodeKey]) -> EdgeStackEntry {
        let edge = grid.edge_between(nodes[1], nodes[6]).unwrap();
        let sides = grid.edge(edge).and_then(|e| e.both_sides()).unwrap();
        EdgeStackEntry { edge, sides }
    }

    #[test]
    fn skewed_merge_waits_for_a_better_neighbor() {
        let (grid, nodes) = make_triangle_strip(4, 1).unwrap();
        let config = AgglomConfig::default();
        let mut session = AgglomerationSession::new(&grid, &config);
        session.initialize_front();

        let entry = skewed_entry(&grid, &nodes);
        let deviation = session.evaluate(entry.edge).unwrap().deviation;
        assert!(deviation > config.good_quad_angle && deviation <= config.worst_quad_angle);

        assert_eq!(session.merge_vortex_loops(entry), MergeOutcome::Deferred);
        assert_eq!(session.stats().deferrals, 1);
        assert_eq!(session.front().state(entry.edge), crate::front::EdgeState::Deferred);
        assert!(entry.sides.iter().all(|&lp| !session.is_merged(lp)));

        while let Some(next) = session.next_agglomeration_edge() {
            session.merge_vortex_loops(next);
        }
        assert_eq!(session.records().len(), 4);
        assert!(session.records().iter().all(|r| r.deviation < 1e-9));
        assert_eq!(session.front().state(entry.edge), crate::front::EdgeState::Off);
    }

    #[test]
    fn skewed_merge_is_committed_without_competitors() {
        // A single parallelogram split along its short diagonal: the only
        // candidate is skewed but nothing better exists.
        let mut grid = Grid::new();
        let a = grid.add_node(0.0, 0.0, 0.0);
        let b = grid.add_node(1.0, 0.0, 0.0);
        let c = grid.add_node(2.0, 1.0, 0.0);
        let d = grid.add_node(1.0, 1.0, 0.0);
        grid.add_loop(&[a, b, d], 0).unwrap();
        grid.add_loop(&[b, c, d], 0).unwrap();
        grid.classify_boundaries(30.0);

        let config = AgglomConfig::default();
        let mut session = AgglomerationSession::new(&grid, &config);
        assert_eq!(session.run_front(), 1);
        assert_eq!(session.stats().deferrals, 0);
        assert!((session.stats().max_deviation - 45.0).abs() < 1e-9);
    }

    #[test]
    fn distorted_merge_is_rejected_for_good() {
        let (grid, nodes) = make_triangle_strip(4, 1).unwrap();
        let config = AgglomConfig::default().with_quad_angles(10.0, 20.0);
        let mut session = AgglomerationSession::new(&grid, &config);
        session.initialize_front();

        let entry = skewed_entry(&grid, &nodes);
        assert_eq!(
            session.merge_vortex_loops(entry),
            MergeOutcome::Rejected(RejectReason::TooDistorted)
        );
        assert_eq!(session.stats().dropped, 1);
        assert_eq!(session.front().state(entry.edge), crate::front::EdgeState::Dropped);
    }

    #[test]
    fn shallow_dent_blocks_merge() {
        // Two quads sharing `m-t`; `t` sits just below the top side, so the
        // union has a reflex vertex of about 183 degrees there.
        let mut grid = Grid::new();
        let a = grid.add_node(0.0, 0.0, 0.0);
        let m = grid.add_node(1.0, 0.0, 0.0);
        let b = grid.add_node(2.0, 0.0, 0.0);
        let c = grid.add_node(2.0, 1.0, 0.0);
        let t = grid.add_node(1.0, 0.97, 0.0);
        let d = grid.add_node(0.0, 1.0, 0.0);
        grid.add_loop(&[a, m, t, d], 0).unwrap();
        grid.add_loop(&[m, b, c, t], 0).unwrap();
        grid.classify_boundaries(30.0);

        let spoke = grid.edge_between(m, t).unwrap();
        assert_eq!(
            evaluate_merge(&grid, spoke, &AgglomConfig::default(), false),
            Err(RejectReason::NotConvex)
        );
    }
}
