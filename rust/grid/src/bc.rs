// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boundary-condition tags for edges and nodes.
//!
//! The numeric codes are part of the solver interface and must survive
//! coarsening unchanged. A lower code is more restrictive: a node touching a
//! trailing edge and a plain boundary is classified by the trailing edge.

use serde::{Deserialize, Serialize};

/// Boundary-condition classification of an edge or node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoundaryCondition {
    Corner = 1,
    TrailingEdge = 2,
    LeadingEdge = 3,
    Boundary = 4,
    Interior = 5,
}

impl BoundaryCondition {
    /// All tags, most restrictive first.
    pub const ALL: [BoundaryCondition; 5] = [
        BoundaryCondition::Corner,
        BoundaryCondition::TrailingEdge,
        BoundaryCondition::LeadingEdge,
        BoundaryCondition::Boundary,
        BoundaryCondition::Interior,
    ];

    /// Returns the solver code of this tag.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Looks a tag up by its solver code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|bc| bc.code() == code)
    }

    /// `true` for the only tag that merging may cross.
    pub fn is_interior(self) -> bool {
        self == BoundaryCondition::Interior
    }

    /// Returns whichever of the two tags is more restrictive.
    pub fn most_restrictive(self, other: Self) -> Self {
        self.min(other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BoundaryCondition::Corner => "CORNER",
            BoundaryCondition::TrailingEdge => "TRAILING_EDGE",
            BoundaryCondition::LeadingEdge => "LEADING_EDGE",
            BoundaryCondition::Boundary => "BOUNDARY",
            BoundaryCondition::Interior => "INTERIOR",
        }
    }
}

impl Default for BoundaryCondition {
    fn default() -> Self {
        BoundaryCondition::Interior
    }
}

impl std::fmt::Display for BoundaryCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_solver_values() {
        assert_eq!(BoundaryCondition::Corner.code(), 1);
        assert_eq!(BoundaryCondition::TrailingEdge.code(), 2);
        assert_eq!(BoundaryCondition::LeadingEdge.code(), 3);
        assert_eq!(BoundaryCondition::Boundary.code(), 4);
        assert_eq!(BoundaryCondition::Interior.code(), 5);
        for bc in BoundaryCondition::ALL {
            assert_eq!(BoundaryCondition::from_code(bc.code()), Some(bc));
        }
        assert_eq!(BoundaryCondition::from_code(0), None);
    }

    #[test]
    fn restrictiveness_follows_code_order() {
        let te = BoundaryCondition::TrailingEdge;
        assert_eq!(te.most_restrictive(BoundaryCondition::Boundary), te);
        assert_eq!(
            BoundaryCondition::Interior.most_restrictive(BoundaryCondition::Corner),
            BoundaryCondition::Corner
        );
    }

    #[test]
    fn serde_uses_screaming_names() {
        let json = serde_json::to_string(&BoundaryCondition::LeadingEdge).unwrap();
        assert_eq!(json, "\"LEADING_EDGE\"");
        let back: BoundaryCondition = serde_json::from_str("\"TRAILING_EDGE\"").unwrap();
        assert_eq!(back, BoundaryCondition::TrailingEdge);
    }
}
