// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handle types for grid entities.
//!
//! Nodes, edges and loops live in `slotmap::SlotMap`s. Their keys stay valid
//! while other entities are removed, and a key whose entity was removed is
//! rejected instead of aliasing a newer entity (generational indices). Keys
//! order by slot index, which the agglomeration front uses as its final
//! deterministic tie-break.

use slotmap::new_key_type;

new_key_type! {
    /// Key for a node (mesh vertex).
    pub struct NodeKey;

    /// Key for an edge (undirected node pair with up to two adjacent loops).
    pub struct EdgeKey;

    /// Key for a loop (closed polygon of nodes).
    pub struct LoopKey;
}

/// A key that can reference any grid entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridKey {
    Node(NodeKey),
    Edge(EdgeKey),
    Loop(LoopKey),
}

impl GridKey {
    /// Returns the entity kind of this key.
    pub fn kind(&self) -> EntityKind {
        match self {
            GridKey::Node(_) => EntityKind::Node,
            GridKey::Edge(_) => EntityKind::Edge,
            GridKey::Loop(_) => EntityKind::Loop,
        }
    }
}

/// Discriminant for grid entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Node = 0,
    Edge = 1,
    Loop = 2,
}

impl EntityKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Node => "Node",
            EntityKind::Edge => "Edge",
            EntityKind::Loop => "Loop",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<NodeKey> for GridKey {
    fn from(k: NodeKey) -> Self {
        GridKey::Node(k)
    }
}

impl From<EdgeKey> for GridKey {
    fn from(k: EdgeKey) -> Self {
        GridKey::Edge(k)
    }
}

impl From<LoopKey> for GridKey {
    fn from(k: LoopKey) -> Self {
        GridKey::Loop(k)
    }
}
