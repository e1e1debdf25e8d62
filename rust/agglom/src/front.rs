// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Advancing front of candidate merge edges.
//!
//! The front is a lazy max-heap: re-ranking an edge pushes a fresh entry and
//! bumps the edge's stamp, so stale entries are skipped when popped instead
//! of being searched for and removed. Each edge is in one of four states:
//!
//! - `Off`: never seeded, or removed because one of its loops merged.
//! - `Queued`: waiting in the heap.
//! - `Deferred`: evaluated, but a better alternative exists for now.
//! - `Dropped`: permanently rejected.
//!
//! When the heap runs dry the deferred list is flushed. Deferred edges come
//! back only if a merge was committed since the previous flush (the
//! neighborhood changed), or once more in relaxed mode, where the competitor
//! check is skipped. After that they are dropped as unmergeable remnants.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use slotmap::SecondaryMap;
use smallvec::SmallVec;
use vortex_grid::{BoundaryCondition, EdgeKey, LoopKey, NodeKey};

use crate::config::MergePolicy;
use crate::merge::{MergeCandidate, RejectReason};
use crate::quality::calculate_quad_quality;
use crate::session::AgglomerationSession;

/// Where an edge currently stands in the front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeState {
    Off,
    Queued,
    Deferred,
    Dropped,
}

/// A candidate edge together with the two loops it separates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeStackEntry {
    pub edge: EdgeKey,
    pub sides: [LoopKey; 2],
}

/// Priority of a candidate edge, compared lexicographically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rank {
    /// Neither endpoint lies on a surface border.
    pub interior: bool,
    /// Predicted quality of the merged loop.
    pub score: f64,
    /// Number of other live edges sharing a loop with this one.
    pub degree: usize,
    /// Live edges touching either endpoint, this one included.
    pub crowding: u32,
}

impl Rank {
    /// Placeholder for an edge that has not been ranked yet.
    const UNRANKED: Rank = Rank {
        interior: false,
        score: f64::NEG_INFINITY,
        degree: usize::MAX,
        crowding: u32::MAX,
    };
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    rank: Rank,
    edge: EdgeKey,
    stamp: u32,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank
            .interior
            .cmp(&other.rank.interior)
            .then_with(|| self.rank.score.total_cmp(&other.rank.score))
            .then_with(|| other.rank.degree.cmp(&self.rank.degree))
            .then_with(|| other.rank.crowding.cmp(&self.rank.crowding))
            .then_with(|| other.edge.cmp(&self.edge))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

#[derive(Debug, Clone, Copy)]
struct Slot {
    state: EdgeState,
    stamp: u32,
    sides: [LoopKey; 2],
    nodes: [NodeKey; 2],
    rank: Rank,
}

/// What happened when the heap ran dry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flush {
    /// Nothing was deferred; the front is finished.
    Empty,
    /// Deferred edges went back into the heap after a commit.
    Requeued(usize),
    /// Deferred edges went back once more with relaxed acceptance.
    Relaxed(usize),
    /// Deferred edges were dropped for good.
    Exhausted(Vec<EdgeKey>),
}

/// Priority queue and per-edge bookkeeping for one front pass.
#[derive(Debug, Default)]
pub struct Front {
    heap: BinaryHeap<Candidate>,
    slots: SecondaryMap<EdgeKey, Slot>,
    node_counts: SecondaryMap<NodeKey, u32>,
    deferred: Vec<EdgeStackEntry>,
    committed_since_flush: bool,
    relaxed: bool,
    relaxed_used: bool,
}

impl Front {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts an edge on the front without queueing it; call [`Front::rerank`]
    /// once its rank is known.
    pub fn enlist(&mut self, edge: EdgeKey, sides: [LoopKey; 2], nodes: [NodeKey; 2]) {
        if self.is_live(edge) {
            return;
        }
        for n in nodes {
            match self.node_counts.get_mut(n) {
                Some(count) => *count += 1,
                None => {
                    self.node_counts.insert(n, 1);
                }
            }
        }
        let stamp = self.slots.get(edge).map_or(0, |s| s.stamp);
        self.slots.insert(
            edge,
            Slot {
                state: EdgeState::Queued,
                stamp,
                sides,
                nodes,
                rank: Rank::UNRANKED,
            },
        );
    }

    /// Updates the rank of a live edge and (re)queues it. A deferred edge
    /// becomes queued again.
    pub fn rerank(&mut self, edge: EdgeKey, rank: Rank) {
        let Some(slot) = self.slots.get_mut(edge) else {
            return;
        };
        if !matches!(slot.state, EdgeState::Queued | EdgeState::Deferred) {
            return;
        }
        slot.state = EdgeState::Queued;
        slot.rank = rank;
        slot.stamp = slot.stamp.wrapping_add(1);
        self.heap.push(Candidate {
            rank,
            edge,
            stamp: slot.stamp,
        });
    }

    /// Pops the best live edge. The edge stays on the front until the caller
    /// removes, defers or drops it.
    pub fn pop(&mut self) -> Option<(EdgeStackEntry, Rank)> {
        while let Some(candidate) = self.heap.pop() {
            let Some(slot) = self.slots.get_mut(candidate.edge) else {
                continue;
            };
            if slot.state != EdgeState::Queued || slot.stamp != candidate.stamp {
                continue;
            }
            // Invalidate any other heap copy of this edge.
            slot.stamp = slot.stamp.wrapping_add(1);
            let entry = EdgeStackEntry {
                edge: candidate.edge,
                sides: slot.sides,
            };
            return Some((entry, slot.rank));
        }
        None
    }

    /// Parks a popped edge until the next flush.
    pub fn defer(&mut self, entry: EdgeStackEntry) {
        if let Some(slot) = self.slots.get_mut(entry.edge) {
            slot.state = EdgeState::Deferred;
            self.deferred.push(entry);
        }
    }

    /// Permanently rejects an edge.
    pub fn drop_edge(&mut self, edge: EdgeKey) {
        self.leave(edge, EdgeState::Dropped);
    }

    /// Takes an edge off the front because one of its loops is gone.
    pub fn remove(&mut self, edge: EdgeKey) {
        self.leave(edge, EdgeState::Off);
    }

    fn leave(&mut self, edge: EdgeKey, state: EdgeState) {
        let Some(slot) = self.slots.get_mut(edge) else {
            return;
        };
        let was_live = matches!(slot.state, EdgeState::Queued | EdgeState::Deferred);
        slot.state = state;
        if was_live {
            let nodes = slot.nodes;
            for n in nodes {
                if let Some(count) = self.node_counts.get_mut(n) {
                    *count = count.saturating_sub(1);
                }
            }
        }
    }

    /// Records that a merge was committed since the last flush.
    pub fn note_commit(&mut self) {
        self.committed_since_flush = true;
    }

    /// Called when [`Front::pop`] returns `None`.
    pub fn flush(&mut self) -> Flush {
        let pending: Vec<EdgeStackEntry> = std::mem::take(&mut self.deferred)
            .into_iter()
            .filter(|e| self.state(e.edge) == EdgeState::Deferred)
            .collect();
        if pending.is_empty() {
            return Flush::Empty;
        }

        if self.committed_since_flush || !self.relaxed_used {
            let relaxing = !self.committed_since_flush;
            if relaxing {
                self.relaxed = true;
                self.relaxed_used = true;
            }
            self.committed_since_flush = false;
            for entry in &pending {
                if let Some(rank) = self.slots.get(entry.edge).map(|s| s.rank) {
                    self.rerank(entry.edge, rank);
                }
            }
            return if relaxing {
                Flush::Relaxed(pending.len())
            } else {
                Flush::Requeued(pending.len())
            };
        }

        let edges: Vec<EdgeKey> = pending.iter().map(|e| e.edge).collect();
        for &edge in &edges {
            self.drop_edge(edge);
        }
        Flush::Exhausted(edges)
    }

    pub fn state(&self, edge: EdgeKey) -> EdgeState {
        self.slots.get(edge).map_or(EdgeState::Off, |s| s.state)
    }

    /// Queued or deferred.
    pub fn is_live(&self, edge: EdgeKey) -> bool {
        matches!(self.state(edge), EdgeState::Queued | EdgeState::Deferred)
    }

    /// Number of live edges touching a node.
    pub fn node_front_count(&self, node: NodeKey) -> u32 {
        self.node_counts.get(node).copied().unwrap_or(0)
    }

    /// Whether the competitor check is switched off.
    pub fn is_relaxed(&self) -> bool {
        self.relaxed
    }

    /// Number of live edges.
    pub fn len(&self) -> usize {
        self.slots
            .values()
            .filter(|s| matches!(s.state, EdgeState::Queued | EdgeState::Deferred))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Counts of fine edges by tag, gathered while seeding the front.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundaryCensus {
    pub corner: usize,
    pub trailing_edge: usize,
    pub leading_edge: usize,
    pub boundary: usize,
    pub interior: usize,
}

impl BoundaryCensus {
    fn count(&mut self, bc: BoundaryCondition) {
        match bc {
            BoundaryCondition::Corner => self.corner += 1,
            BoundaryCondition::TrailingEdge => self.trailing_edge += 1,
            BoundaryCondition::LeadingEdge => self.leading_edge += 1,
            BoundaryCondition::Boundary => self.boundary += 1,
            BoundaryCondition::Interior => self.interior += 1,
        }
    }
}

impl AgglomerationSession<'_> {
    /// Seeds the front with every INTERIOR edge between two unmerged loops
    /// (InitializeFront). Edges whose merge is infeasible are dropped right
    /// away and never reach the heap. Returns the number of queued edges.
    pub fn initialize_front(&mut self) -> usize {
        let fine = self.fine;
        let mut front = Front::new();
        let mut census = BoundaryCensus::default();
        let mut seeded = Vec::new();

        for (ek, edge) in fine.edges() {
            census.count(edge.bc);
            if !edge.bc.is_interior() {
                continue;
            }
            let Some(sides) = edge.both_sides() else {
                continue;
            };
            if sides.iter().any(|&lp| self.is_merged(lp)) {
                continue;
            }
            front.enlist(ek, sides, edge.nodes);
            seeded.push(ek);
        }

        self.front = front;
        self.stats.census = census;
        seeded.retain(|&ek| match self.evaluate(ek) {
            Ok(_) => true,
            Err(reason) => {
                self.drop_infeasible(ek, reason);
                false
            }
        });
        for &ek in &seeded {
            self.requeue(ek);
        }

        tracing::debug!(
            seeded = seeded.len(),
            trailing_edges = census.trailing_edge,
            leading_edges = census.leading_edge,
            boundary_edges = census.boundary,
            "Front initialized"
        );
        seeded.len()
    }

    /// Pops the next edge to try (NextAgglomerationEdge), flushing deferred
    /// edges when the heap runs dry. `None` means the front is finished.
    pub fn next_agglomeration_edge(&mut self) -> Option<EdgeStackEntry> {
        loop {
            if let Some((entry, rank)) = self.front.pop() {
                tracing::trace!(edge = ?entry.edge, score = rank.score, degree = rank.degree, "Selected edge");
                return Some(entry);
            }
            match self.front.flush() {
                Flush::Empty => return None,
                Flush::Requeued(count) => {
                    tracing::debug!(count, "Re-queued deferred edges after commits");
                }
                Flush::Relaxed(count) => {
                    self.stats.relaxed_passes += 1;
                    tracing::debug!(count, "Re-queued deferred edges in relaxed mode");
                }
                Flush::Exhausted(edges) => {
                    self.stats.dropped += edges.len();
                    tracing::warn!(count = edges.len(), "Dropping unmergeable edges");
                }
            }
        }
    }

    /// Takes every edge of the merged loops off the front and re-ranks the
    /// live edges of their neighbors (UpdateFront).
    pub fn update_front(&mut self, merged: [LoopKey; 2]) {
        let fine = self.fine;
        let mut touched: SmallVec<[EdgeKey; 16]> = SmallVec::new();

        for lp in merged {
            let Some(data) = fine.vortex_loop(lp) else {
                continue;
            };
            for &ek in &data.edges {
                self.front.remove(ek);
                let neighbor = fine.edge(ek).and_then(|e| e.other_side(lp));
                if let Some(nb) = neighbor.filter(|&nb| !self.is_merged(nb)) {
                    if let Some(nd) = fine.vortex_loop(nb) {
                        touched.extend(nd.edges.iter().copied());
                    }
                }
            }
        }

        touched.sort_unstable();
        touched.dedup();
        for ek in touched {
            if self.front.is_live(ek) {
                self.requeue(ek);
            }
        }
    }

    /// Number of other live edges that share a loop with `edge` (EdgeDegree).
    pub fn edge_degree(&self, edge: EdgeKey) -> usize {
        let fine = self.fine;
        let Some(sides) = fine.edge(edge).and_then(|e| e.both_sides()) else {
            return 0;
        };
        let mut others: SmallVec<[EdgeKey; 8]> = sides
            .iter()
            .filter_map(|&lp| fine.vortex_loop(lp))
            .flat_map(|l| l.edges.iter().copied())
            .filter(|&ek| ek != edge && self.front.is_live(ek))
            .collect();
        others.sort_unstable();
        others.dedup();
        others.len()
    }

    /// Ranks a live edge and queues it, or drops it if its merge is
    /// infeasible.
    fn requeue(&mut self, edge: EdgeKey) {
        match self.evaluate(edge) {
            Ok(candidate) => {
                let rank = self.rank_edge(&candidate);
                self.front.rerank(edge, rank);
            }
            Err(reason) => self.drop_infeasible(edge, reason),
        }
    }

    fn drop_infeasible(&mut self, edge: EdgeKey, reason: RejectReason) {
        tracing::trace!(edge = ?edge, %reason, "Dropped infeasible edge");
        self.stats.dropped += 1;
        self.front.drop_edge(edge);
    }

    fn rank_edge(&self, candidate: &MergeCandidate) -> Rank {
        let fine = self.fine;
        let nodes = fine.edge(candidate.edge).map(|e| e.nodes);
        let interior = nodes.is_some_and(|nodes| {
            nodes
                .iter()
                .all(|&n| fine.node_bc(n).is_some_and(BoundaryCondition::is_interior))
        });
        let crowding = nodes.map_or(0, |nodes| {
            nodes.iter().map(|&n| self.front.node_front_count(n)).sum()
        });
        let score = match self.config.merge_policy {
            MergePolicy::Legacy => 0.0,
            MergePolicy::QualityAware => match <&[NodeKey; 4]>::try_from(candidate.nodes.as_slice()) {
                Ok(quad) => calculate_quad_quality(fine, quad).unwrap_or_else(|| candidate.score()),
                Err(_) => candidate.score(),
            },
        };
        Rank {
            interior,
            score,
            degree: self.edge_degree(candidate.edge),
            crowding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn keys() -> (Vec<EdgeKey>, Vec<LoopKey>, Vec<NodeKey>) {
        let mut edges: SlotMap<EdgeKey, ()> = SlotMap::with_key();
        let mut loops: SlotMap<LoopKey, ()> = SlotMap::with_key();
        let mut nodes: SlotMap<NodeKey, ()> = SlotMap::with_key();
        (
            (0..4).map(|_| edges.insert(())).collect(),
            (0..4).map(|_| loops.insert(())).collect(),
            (0..4).map(|_| nodes.insert(())).collect(),
        )
    }

    fn rank(interior: bool, score: f64, degree: usize) -> Rank {
        Rank {
            interior,
            score,
            degree,
            crowding: 0,
        }
    }

    #[test]
    fn pops_in_rank_order() {
        let (e, l, n) = keys();
        let mut front = Front::new();
        for &edge in &e[..4] {
            front.enlist(edge, [l[0], l[1]], [n[0], n[1]]);
        }
        front.rerank(e[0], rank(false, 1.0, 0));
        front.rerank(e[1], rank(true, 0.2, 3));
        front.rerank(e[2], rank(true, 0.9, 2));
        front.rerank(e[3], rank(true, 0.9, 1));

        let order: Vec<EdgeKey> = std::iter::from_fn(|| {
            let (entry, _) = front.pop()?;
            front.remove(entry.edge);
            Some(entry.edge)
        })
        .collect();
        assert_eq!(order, vec![e[3], e[2], e[1], e[0]]);
    }

    #[test]
    fn ties_break_on_lowest_edge() {
        let (e, l, n) = keys();
        let mut front = Front::new();
        for &edge in &[e[2], e[0], e[1]] {
            front.enlist(edge, [l[0], l[1]], [n[0], n[1]]);
            front.rerank(edge, rank(true, 0.5, 1));
        }
        assert_eq!(front.pop().unwrap().0.edge, e[0]);
    }

    #[test]
    fn less_crowded_edge_wins_a_tie() {
        let (e, l, n) = keys();
        let mut front = Front::new();
        front.enlist(e[0], [l[0], l[1]], [n[0], n[1]]);
        front.enlist(e[1], [l[2], l[3]], [n[2], n[3]]);
        front.rerank(e[0], Rank { crowding: 5, ..rank(true, 0.5, 1) });
        front.rerank(e[1], Rank { crowding: 2, ..rank(true, 0.5, 1) });
        assert_eq!(front.pop().unwrap().0.edge, e[1]);
    }

    #[test]
    fn stale_entries_are_skipped() {
        let (e, l, n) = keys();
        let mut front = Front::new();
        front.enlist(e[0], [l[0], l[1]], [n[0], n[1]]);
        front.rerank(e[0], rank(true, 0.1, 0));
        front.rerank(e[0], rank(true, 0.9, 0));
        front.enlist(e[1], [l[2], l[3]], [n[2], n[3]]);
        front.rerank(e[1], rank(true, 0.5, 0));
        front.remove(e[1]);

        let (entry, r) = front.pop().unwrap();
        assert_eq!(entry.edge, e[0]);
        assert_eq!(r.score, 0.9);
        front.remove(e[0]);
        assert!(front.pop().is_none());
    }

    #[test]
    fn node_counters_track_live_edges() {
        let (e, l, n) = keys();
        let mut front = Front::new();
        front.enlist(e[0], [l[0], l[1]], [n[0], n[1]]);
        front.enlist(e[1], [l[1], l[2]], [n[1], n[2]]);
        assert_eq!(front.node_front_count(n[1]), 2);

        front.drop_edge(e[0]);
        assert_eq!(front.node_front_count(n[1]), 1);
        assert_eq!(front.node_front_count(n[0]), 0);
        assert_eq!(front.state(e[0]), EdgeState::Dropped);
        assert_eq!(front.len(), 1);
    }

    #[test]
    fn flush_requeues_relaxes_then_drops() {
        let (e, l, n) = keys();
        let mut front = Front::new();
        front.enlist(e[0], [l[0], l[1]], [n[0], n[1]]);
        front.rerank(e[0], rank(true, 0.5, 0));

        let (entry, _) = front.pop().unwrap();
        front.defer(entry);
        front.note_commit();
        assert_eq!(front.flush(), Flush::Requeued(1));
        assert!(!front.is_relaxed());

        let (entry, _) = front.pop().unwrap();
        front.defer(entry);
        assert_eq!(front.flush(), Flush::Relaxed(1));
        assert!(front.is_relaxed());

        let (entry, _) = front.pop().unwrap();
        front.defer(entry);
        assert_eq!(front.flush(), Flush::Exhausted(vec![e[0]]));
        assert_eq!(front.state(e[0]), EdgeState::Dropped);
        assert_eq!(front.flush(), Flush::Empty);
    }
}
