/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Identity-keyed reconciliation of remote push events into the merged graph.
//!
//! Application is idempotent: a `Created` for a known id is a no-op, an
//! `Updated` or `Deleted` for an unknown id is dropped. Within one entity the
//! last applied event wins; the wire contract carries no version, so
//! concurrent edits to the same entity cannot be detected here.

use super::lock::{can_connect, can_delete_node, is_locked};
use super::overlay::{edge_from_record, node_from_record};
use super::{EdgeProps, Graph, Level, NodeProps, OriginColor, clamp_weight};
use crate::services::transport::types::{EdgeRecord, NodeRecord, RemoteEvent};

/// Scope a reconciliation pass runs in.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileScope<'a> {
    /// Graph the subscription is scoped to. Events naming another graph are ignored.
    pub writable_graph: &'a str,
    pub origin_color: OriginColor,
}

/// Why an event left the graph untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    UnknownEntity,
    Locked,
    DanglingEndpoint,
    ForeignGraph,
}

/// What an event did to the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Inserted,
    /// A local copy with the same identity already existed.
    Deduplicated,
    Updated,
    /// The update matched the local copy already.
    Unchanged,
    Removed {
        /// Edge ids removed because they touched a removed node.
        cascaded_edges: Vec<String>,
    },
    Dropped(DropReason),
}

impl ReconcileOutcome {
    /// Whether the graph changed.
    pub fn changed(&self) -> bool {
        matches!(self, Self::Inserted | Self::Updated | Self::Removed { .. })
    }
}

/// Apply one remote event to `graph`.
pub fn apply_remote_event(
    graph: &mut Graph,
    event: &RemoteEvent,
    scope: ReconcileScope<'_>,
) -> ReconcileOutcome {
    if let Some(graph_id) = event.graph_id()
        && graph_id != scope.writable_graph
    {
        log::debug!(
            "reconcile: ignoring {} from foreign graph {graph_id}",
            event.entity_id()
        );
        return ReconcileOutcome::Dropped(DropReason::ForeignGraph);
    }

    let outcome = match event {
        RemoteEvent::NodeCreated(record) => node_created(graph, record, scope),
        RemoteEvent::NodeUpdated(record) => node_updated(graph, record),
        RemoteEvent::NodeDeleted { id } => node_deleted(graph, id),
        RemoteEvent::EdgeCreated(record) => edge_created(graph, record, scope),
        RemoteEvent::EdgeUpdated(record) => edge_updated(graph, record),
        RemoteEvent::EdgeDeleted { id } => edge_deleted(graph, id),
    };
    if let ReconcileOutcome::Dropped(reason) = outcome {
        log::warn!("reconcile: dropped event for {} ({reason:?})", event.entity_id());
    }
    outcome
}

fn node_created(graph: &mut Graph, record: &NodeRecord, scope: ReconcileScope<'_>) -> ReconcileOutcome {
    if graph.contains_node(&record.id) {
        return ReconcileOutcome::Deduplicated;
    }
    let (node, _) = node_from_record(
        record,
        scope.writable_graph,
        scope.origin_color,
        &mut rand::thread_rng(),
    );
    graph.insert_node(node);
    ReconcileOutcome::Inserted
}

fn node_updated(graph: &mut Graph, record: &NodeRecord) -> ReconcileOutcome {
    let Some(node) = graph.get_node_mut(&record.id) else {
        return ReconcileOutcome::Dropped(DropReason::UnknownEntity);
    };
    if is_locked(&*node) {
        return ReconcileOutcome::Dropped(DropReason::Locked);
    }
    let before = node.clone();
    merge_node_fields(node, record);
    if *node == before {
        ReconcileOutcome::Unchanged
    } else {
        ReconcileOutcome::Updated
    }
}

/// Merge incoming fields into an existing node. A malformed property bag
/// keeps the current props; a bag without a position keeps the current one.
pub(crate) fn merge_node_fields(node: &mut super::Node, record: &NodeRecord) {
    node.weight = clamp_weight(record.weight);
    node.level = Level::from_wire(record.level);
    match NodeProps::parse(&record.props) {
        Some(mut props) => {
            if props.position.is_none() {
                props.position = node.props.position;
            }
            node.props = props;
        },
        None => log::debug!("reconcile: malformed props on {}, keeping current", record.id),
    }
}

fn node_deleted(graph: &mut Graph, id: &str) -> ReconcileOutcome {
    match graph.get_node(id) {
        None => return ReconcileOutcome::Dropped(DropReason::UnknownEntity),
        Some(node) if !can_delete_node(node, &graph.incident_edges(id), false) => {
            return ReconcileOutcome::Dropped(DropReason::Locked);
        },
        Some(_) => {},
    }
    match graph.remove_node(id) {
        Some((_, cascaded)) => ReconcileOutcome::Removed {
            cascaded_edges: cascaded.into_iter().map(|edge| edge.id).collect(),
        },
        None => ReconcileOutcome::Dropped(DropReason::UnknownEntity),
    }
}

fn edge_created(graph: &mut Graph, record: &EdgeRecord, scope: ReconcileScope<'_>) -> ReconcileOutcome {
    if graph.contains_edge(&record.id) {
        return ReconcileOutcome::Deduplicated;
    }
    let (Some(from), Some(to)) = (graph.get_node(&record.from.id), graph.get_node(&record.to.id))
    else {
        return ReconcileOutcome::Dropped(DropReason::DanglingEndpoint);
    };
    if !can_connect(from, to) {
        return ReconcileOutcome::Dropped(DropReason::Locked);
    }
    let (edge, _) = edge_from_record(record, scope.writable_graph, scope.origin_color);
    match graph.insert_edge(edge) {
        Some(_) => ReconcileOutcome::Inserted,
        None => ReconcileOutcome::Dropped(DropReason::DanglingEndpoint),
    }
}

fn edge_updated(graph: &mut Graph, record: &EdgeRecord) -> ReconcileOutcome {
    let Some(edge) = graph.get_edge_mut(&record.id) else {
        return ReconcileOutcome::Dropped(DropReason::UnknownEntity);
    };
    if is_locked(&*edge) {
        return ReconcileOutcome::Dropped(DropReason::Locked);
    }
    let before = edge.clone();
    merge_edge_fields(edge, record);
    if *edge == before {
        ReconcileOutcome::Unchanged
    } else {
        ReconcileOutcome::Updated
    }
}

/// Endpoints are part of an edge's identity and are never rewritten by an update.
pub(crate) fn merge_edge_fields(edge: &mut super::Edge, record: &EdgeRecord) {
    edge.weight = clamp_weight(record.weight);
    edge.level = Level::from_wire(record.level);
    match EdgeProps::parse(&record.props) {
        Some(props) => edge.props = props,
        None => log::debug!("reconcile: malformed props on edge {}, keeping current", record.id),
    }
}

fn edge_deleted(graph: &mut Graph, id: &str) -> ReconcileOutcome {
    match graph.get_edge(id) {
        None => return ReconcileOutcome::Dropped(DropReason::UnknownEntity),
        Some(edge) if is_locked(edge) => return ReconcileOutcome::Dropped(DropReason::Locked),
        Some(_) => {},
    }
    graph.remove_edge(id);
    ReconcileOutcome::Removed {
        cascaded_edges: Vec::new(),
    }
}
