/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Lock rules: pure predicates over provenance.
//!
//! Nothing here raises an error. Callers check first and silently skip the
//! write when a predicate says no.

use super::{Edge, Level, Node};

/// Anything that carries a provenance level.
pub trait Provenance {
    fn level(&self) -> Level;
}

impl Provenance for Node {
    fn level(&self) -> Level {
        self.level
    }
}

impl Provenance for Edge {
    fn level(&self) -> Level {
        self.level
    }
}

pub fn is_locked<E: Provenance + ?Sized>(entity: &E) -> bool {
    entity.level() == Level::Verified
}

/// Update, move or delete. False for locked entities and read-only sessions.
pub fn can_mutate<E: Provenance + ?Sized>(entity: &E, read_only: bool) -> bool {
    !read_only && !is_locked(entity)
}

/// Deleting a node cascades to its edges, so a locked incident edge pins
/// the node in place.
pub fn can_delete_node(node: &Node, incident_edges: &[&Edge], read_only: bool) -> bool {
    can_mutate(node, read_only) && !incident_edges.iter().any(|edge| is_locked(*edge))
}

/// Edge creation is refused when either endpoint is locked.
pub fn can_connect(source: &Node, target: &Node) -> bool {
    !is_locked(source) && !is_locked(target)
}

/// New entities need a writable target graph.
pub fn can_create(read_only: bool, writable_graph: Option<&str>) -> bool {
    !read_only && writable_graph.is_some_and(|id| !id.is_empty())
}

/// Duplicating reads the source only; the copy is always created editable,
/// so a locked source may still be duplicated.
pub fn can_duplicate(_source: &Node, read_only: bool, writable_graph: Option<&str>) -> bool {
    can_create(read_only, writable_graph)
}
