// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-run agglomeration state.
//!
//! A session borrows the fine grid immutably and owns everything that
//! changes while the front advances: merge marks, the front itself, cached
//! merge evaluations and the records of committed coarse loops. Separate
//! sessions share nothing, so independent grids can be coarsened on
//! separate threads.

use std::fmt;

use rustc_hash::FxHashMap;
use slotmap::SecondaryMap;
use vortex_grid::{EdgeKey, Grid, LoopKey};

use crate::builder::CoarseLoopRecord;
use crate::cleanup::CleanupSummary;
use crate::config::AgglomConfig;
use crate::front::{BoundaryCensus, Front};
use crate::merge::{MergeCandidate, RejectReason};

/// Lifecycle of one agglomeration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgglomerationState {
    EmptyFront,
    Seeded,
    SelectEdge,
    EvaluateMerge,
    CommitMerge,
    Drained,
    Cleaned,
    Validated,
    Done,
}

impl AgglomerationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgglomerationState::EmptyFront => "EmptyFront",
            AgglomerationState::Seeded => "Seeded",
            AgglomerationState::SelectEdge => "SelectEdge",
            AgglomerationState::EvaluateMerge => "EvaluateMerge",
            AgglomerationState::CommitMerge => "CommitMerge",
            AgglomerationState::Drained => "Drained",
            AgglomerationState::Cleaned => "Cleaned",
            AgglomerationState::Validated => "Validated",
            AgglomerationState::Done => "Done",
        }
    }
}

impl fmt::Display for AgglomerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters collected over one agglomeration run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgglomerationStats {
    pub fine_loops: usize,
    pub coarse_loops: usize,
    /// Edges taken off the front and evaluated.
    pub attempts: usize,
    pub merges: usize,
    pub quad_merges: usize,
    pub triangle_merges: usize,
    pub deferrals: usize,
    pub dropped: usize,
    pub relaxed_passes: usize,
    /// Worst angle deviation among committed merges, in degrees.
    pub max_deviation: f64,
    /// Most evaluations any single fine loop took part in.
    pub max_loop_hits: u32,
    pub census: BoundaryCensus,
    pub cleanup: CleanupSummary,
}

impl fmt::Display for AgglomerationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fine loops -> {} coarse loops ({} merges: {} quads, {} triangles; \
             {} attempts, {} deferrals, {} dropped, worst deviation {:.1} deg)",
            self.fine_loops,
            self.coarse_loops,
            self.merges,
            self.quad_merges,
            self.triangle_merges,
            self.attempts,
            self.deferrals,
            self.dropped,
            self.max_deviation
        )
    }
}

/// Mutable state of one agglomeration run over a borrowed fine grid.
#[derive(Debug)]
pub struct AgglomerationSession<'a> {
    pub(crate) fine: &'a Grid,
    pub(crate) config: &'a AgglomConfig,
    pub(crate) front: Front,
    pub(crate) merged: SecondaryMap<LoopKey, ()>,
    pub(crate) evaluations: FxHashMap<EdgeKey, Result<MergeCandidate, RejectReason>>,
    pub(crate) loop_hits: SecondaryMap<LoopKey, u32>,
    pub(crate) records: Vec<CoarseLoopRecord>,
    pub(crate) allow_triangles: bool,
    pub(crate) stats: AgglomerationStats,
    state: AgglomerationState,
}

impl<'a> AgglomerationSession<'a> {
    pub fn new(fine: &'a Grid, config: &'a AgglomConfig) -> Self {
        Self {
            fine,
            config,
            front: Front::new(),
            merged: SecondaryMap::new(),
            evaluations: FxHashMap::default(),
            loop_hits: SecondaryMap::new(),
            records: Vec::new(),
            allow_triangles: false,
            stats: AgglomerationStats {
                fine_loops: fine.loop_count(),
                ..Default::default()
            },
            state: AgglomerationState::EmptyFront,
        }
    }

    pub fn state(&self) -> AgglomerationState {
        self.state
    }

    pub(crate) fn advance(&mut self, next: AgglomerationState) {
        if next != self.state {
            tracing::trace!(from = %self.state, to = %next, "Agglomeration state");
            self.state = next;
        }
    }

    /// Whether a fine loop has already been absorbed into a coarse loop.
    pub fn is_merged(&self, lp: LoopKey) -> bool {
        self.merged.contains_key(lp)
    }

    /// Coarse loops committed so far.
    pub fn records(&self) -> &[CoarseLoopRecord] {
        &self.records
    }

    pub fn stats(&self) -> &AgglomerationStats {
        &self.stats
    }

    pub fn front(&self) -> &Front {
        &self.front
    }

    /// Runs one front pass to exhaustion. Returns the number of merges
    /// committed during the pass.
    pub fn run_front(&mut self) -> usize {
        let before = self.stats.merges;
        self.initialize_front();
        self.advance(AgglomerationState::Seeded);

        while let Some(entry) = self.next_agglomeration_edge() {
            self.advance(AgglomerationState::SelectEdge);
            self.merge_vortex_loops(entry);
        }

        self.advance(AgglomerationState::Drained);
        self.stats.max_loop_hits = self.loop_hits.values().copied().max().unwrap_or(0);
        let merges = self.stats.merges - before;
        tracing::debug!(
            merges,
            attempts = self.stats.attempts,
            deferrals = self.stats.deferrals,
            allow_triangles = self.allow_triangles,
            "Front drained"
        );
        merges
    }

    /// Switches the next front pass to also accept merged triangles.
    pub(crate) fn allow_triangle_merges(&mut self) {
        self.allow_triangles = true;
        self.evaluations.clear();
    }

    /// Consumes the session, returning its statistics.
    pub fn into_stats(self) -> AgglomerationStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vortex_grid::construction::make_triangle_strip;

    #[test]
    fn strip_pairs_every_triangle() {
        let (grid, _) = make_triangle_strip(4, 1).unwrap();
        let config = AgglomConfig::default();
        let mut session = AgglomerationSession::new(&grid, &config);

        assert_eq!(session.state(), AgglomerationState::EmptyFront);
        assert_eq!(session.run_front(), 4);
        assert_eq!(session.state(), AgglomerationState::Drained);
        assert!(grid.loop_keys().iter().all(|&lp| session.is_merged(lp)));
        assert!(session.stats().attempts <= grid.loop_count());
        assert!(session.stats().max_deviation < 1e-9);
    }

    #[test]
    fn second_pass_has_nothing_left() {
        let (grid, _) = make_triangle_strip(2, 2).unwrap();
        let config = AgglomConfig::default();
        let mut session = AgglomerationSession::new(&grid, &config);
        let first = session.run_front();
        assert!(first > 0);

        session.allow_triangle_merges();
        session.run_front();
        let merged = grid.loop_keys().iter().filter(|&&lp| session.is_merged(lp)).count();
        assert_eq!(merged, 2 * session.records().len());
    }

    /// Regular octahedron: every edge is interior but no two faces are
    /// within the coplanar tolerance.
    fn octahedron() -> Grid {
        let mut grid = Grid::new();
        let px = grid.add_node(1.0, 0.0, 0.0);
        let nx = grid.add_node(-1.0, 0.0, 0.0);
        let py = grid.add_node(0.0, 1.0, 0.0);
        let ny = grid.add_node(0.0, -1.0, 0.0);
        let pz = grid.add_node(0.0, 0.0, 1.0);
        let nz = grid.add_node(0.0, 0.0, -1.0);
        for face in [
            [px, py, pz],
            [py, nx, pz],
            [nx, ny, pz],
            [ny, px, pz],
            [py, px, nz],
            [nx, py, nz],
            [ny, nx, nz],
            [px, ny, nz],
        ] {
            grid.add_loop(&face, 0).unwrap();
        }
        grid.classify_boundaries(30.0);
        grid
    }

    #[test]
    fn infeasible_edges_never_reach_the_heap() {
        let grid = octahedron();
        assert_eq!(grid.edge_count(), 12);
        let config = AgglomConfig::default();
        let mut session = AgglomerationSession::new(&grid, &config);

        assert_eq!(session.initialize_front(), 0);
        assert!(session.front().is_empty());
        assert_eq!(session.stats().dropped, 12);

        assert_eq!(session.run_front(), 0);
        assert_eq!(session.stats().attempts, 0);
        assert!(session.stats().attempts <= grid.loop_count());
    }

    #[test]
    fn stats_display_is_readable() {
        let stats = AgglomerationStats {
            fine_loops: 8,
            coarse_loops: 4,
            merges: 4,
            quad_merges: 4,
            ..Default::default()
        };
        let text = stats.to_string();
        assert!(text.starts_with("8 fine loops -> 4 coarse loops"));
    }
}
