/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Record shapes exchanged with the transport collaborator.
//!
//! Property bags travel as JSON strings and are parsed by the overlay store.

use serde::{Deserialize, Serialize};

use crate::graph::{EntityId, GraphId};

/// `{ id }` reference used for edge endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub id: EntityId,
}

impl From<&str> for RecordRef {
    fn from(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

/// Node record as returned by fetches, mutations and subscriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: EntityId,
    /// Owning graph; subscriptions and mutation results carry it, fetched
    /// graphs may omit it because the enclosing graph is implied.
    #[serde(default, rename = "graphId", skip_serializing_if = "Option::is_none")]
    pub graph_id: Option<GraphId>,
    #[serde(default)]
    pub weight: f32,
    #[serde(default)]
    pub level: u8,
    #[serde(default)]
    pub props: String,
}

/// Edge record as returned by fetches, mutations and subscriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: EntityId,
    #[serde(default, rename = "graphId", skip_serializing_if = "Option::is_none")]
    pub graph_id: Option<GraphId>,
    pub from: RecordRef,
    pub to: RecordRef,
    #[serde(default)]
    pub weight: f32,
    #[serde(default)]
    pub level: u8,
    #[serde(default)]
    pub props: String,
}

/// A fully fetched source graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawGraph {
    pub id: GraphId,
    #[serde(default)]
    pub name: String,
    /// Explicit provenance level of the whole graph, when the backend sends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

/// Push-stream event scoped to one graph.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    NodeCreated(NodeRecord),
    NodeUpdated(NodeRecord),
    NodeDeleted { id: EntityId },
    EdgeCreated(EdgeRecord),
    EdgeUpdated(EdgeRecord),
    EdgeDeleted { id: EntityId },
}

impl RemoteEvent {
    /// Graph id carried by the record, if any. Deletions carry none.
    pub fn graph_id(&self) -> Option<&str> {
        match self {
            Self::NodeCreated(record) | Self::NodeUpdated(record) => record.graph_id.as_deref(),
            Self::EdgeCreated(record) | Self::EdgeUpdated(record) => record.graph_id.as_deref(),
            Self::NodeDeleted { .. } | Self::EdgeDeleted { .. } => None,
        }
    }

    pub fn entity_id(&self) -> &str {
        match self {
            Self::NodeCreated(record) | Self::NodeUpdated(record) => &record.id,
            Self::EdgeCreated(record) | Self::EdgeUpdated(record) => &record.id,
            Self::NodeDeleted { id } | Self::EdgeDeleted { id } => id,
        }
    }
}
