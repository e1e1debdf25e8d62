// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entry points: coarsening and cleanup-only simplification.

use std::time::Instant;

use vortex_grid::Grid;

use crate::check::fatal_violations;
use crate::cleanup::{clean_up_mesh, CleanupSummary};
use crate::config::{AgglomConfig, AssemblyMode};
use crate::error::{Error, Result};
use crate::session::{AgglomerationSession, AgglomerationState, AgglomerationStats};

/// Coarse grid together with the counters of the run that produced it.
#[derive(Debug, Clone)]
pub struct AgglomerationReport {
    pub grid: Grid,
    pub stats: AgglomerationStats,
}

/// Coarsens fine vortex-loop grids.
///
/// An `Agglomerator` holds only its configuration; every call builds a fresh
/// session, so one value can serve several threads.
#[derive(Debug, Clone, Default)]
pub struct Agglomerator {
    config: AgglomConfig,
}

impl Agglomerator {
    /// Creates an agglomerator after validating `config`.
    pub fn new(config: AgglomConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AgglomConfig {
        &self.config
    }

    /// Builds the coarse grid of `fine`.
    pub fn agglomerate(&self, fine: &Grid) -> Result<Grid> {
        self.agglomerate_with_report(fine).map(|report| report.grid)
    }

    /// Builds the coarse grid of `fine` and reports what the run did.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInputMesh`] if `fine` fails the mesh check, and
    /// [`Error::InvalidCoarseMesh`] if the assembled grid does.
    pub fn agglomerate_with_report(&self, fine: &Grid) -> Result<AgglomerationReport> {
        let start = Instant::now();
        let violations = fatal_violations(fine);
        if let Some(first) = violations.first() {
            tracing::warn!(
                count = violations.len(),
                entity = %first.key().kind(),
                first = %first,
                "Fine grid failed validation"
            );
            return Err(Error::InvalidInputMesh(violations));
        }

        tracing::info!(
            loops = fine.loop_count(),
            nodes = fine.node_count(),
            edges = fine.edge_count(),
            policy = ?self.config.merge_policy,
            mode = ?self.config.assembly_mode,
            "Agglomerating grid"
        );

        let mut session = AgglomerationSession::new(fine, &self.config);
        session.run_front();
        let coarse = match self.config.assembly_mode {
            AssemblyMode::Quad => session.build_coarse_grid()?,
            AssemblyMode::Mixed => session.create_mixed_mesh()?,
        };

        let (grid, cleanup) = clean_up_mesh(&coarse, &self.config)?;
        session.advance(AgglomerationState::Cleaned);

        let violations = fatal_violations(&grid);
        if let Some(first) = violations.first() {
            tracing::warn!(
                count = violations.len(),
                entity = %first.key().kind(),
                first = %first,
                "Coarse grid failed validation"
            );
            return Err(Error::InvalidCoarseMesh(violations));
        }
        session.advance(AgglomerationState::Validated);
        session.advance(AgglomerationState::Done);

        let mut stats = session.into_stats();
        stats.coarse_loops = grid.loop_count();
        stats.cleanup = cleanup;

        tracing::info!(
            fine = stats.fine_loops,
            coarse = stats.coarse_loops,
            merges = stats.merges,
            attempts = stats.attempts,
            cleanup_changes = stats.cleanup.changes(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Agglomeration complete"
        );
        Ok(AgglomerationReport { grid, stats })
    }

    /// Runs the cleanup passes without any merging, repeating them until a
    /// round changes nothing or `max_cleanup_rounds` is reached.
    pub fn simplify_mesh(&self, grid: &Grid) -> Result<Grid> {
        self.simplify_mesh_with_summary(grid).map(|(grid, _)| grid)
    }

    /// [`simplify_mesh`](Self::simplify_mesh), also returning the summed
    /// cleanup counts.
    pub fn simplify_mesh_with_summary(&self, grid: &Grid) -> Result<(Grid, CleanupSummary)> {
        let violations = fatal_violations(grid);
        if !violations.is_empty() {
            return Err(Error::InvalidInputMesh(violations));
        }

        let mut total = CleanupSummary::default();
        let mut current = grid.clone();
        let mut rounds = 0;
        while rounds < self.config.max_cleanup_rounds {
            let (next, summary) = clean_up_mesh(&current, &self.config)?;
            rounds += 1;
            total.accumulate(&summary);
            current = next;
            if summary.changes() == 0 {
                break;
            }
        }
        if rounds == self.config.max_cleanup_rounds && total.changes() > 0 {
            tracing::debug!(rounds, "Cleanup stopped at the round limit");
        }

        let violations = fatal_violations(&current);
        if !violations.is_empty() {
            return Err(Error::InvalidCoarseMesh(violations));
        }
        tracing::info!(
            loops_before = grid.loop_count(),
            loops_after = current.loop_count(),
            rounds,
            %total,
            "Mesh simplified"
        );
        Ok((current, total))
    }
}
