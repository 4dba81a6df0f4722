/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Transport collaborator contract: graph fetches, entity mutations and
//! per-graph push subscriptions.
//!
//! Implementations own the wire format. The editor only relies on the record
//! shapes in [`types`] and on every call being independently awaitable.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;

use crate::error::TransportError;
use crate::graph::{EntityId, GraphId};

pub mod memory;
pub mod types;

pub use types::{EdgeRecord, NodeRecord, RawGraph, RecordRef, RemoteEvent};

/// Boxed round-trip future returned by every transport call.
pub type TransportFuture<T> = BoxFuture<'static, Result<T, TransportError>>;

pub trait GraphTransport: Send + Sync + 'static {
    fn fetch_graph(&self, graph_id: &str) -> TransportFuture<RawGraph>;

    fn create_node(&self, graph_id: &str, props: String) -> TransportFuture<NodeRecord>;

    fn update_node(&self, id: &str, props: String, weight: Option<f32>)
    -> TransportFuture<NodeRecord>;

    fn delete_node(&self, id: &str) -> TransportFuture<bool>;

    fn create_edge(
        &self,
        graph_id: &str,
        from: &str,
        to: &str,
        props: String,
    ) -> TransportFuture<EdgeRecord>;

    fn update_edge(&self, id: &str, props: String, weight: Option<f32>)
    -> TransportFuture<EdgeRecord>;

    fn delete_edge(&self, id: &str) -> TransportFuture<bool>;

    /// Push stream of remote changes scoped to `graph_id`. The stream ends
    /// when the backend closes it.
    fn subscribe(&self, graph_id: &str) -> BoxStream<'static, RemoteEvent>;
}

/// A single mutation round-trip, owned so it can travel to a worker task and
/// back with its result.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationRequest {
    CreateNode {
        graph_id: GraphId,
        props: String,
    },
    UpdateNode {
        id: EntityId,
        props: String,
        weight: Option<f32>,
    },
    DeleteNode {
        id: EntityId,
    },
    CreateEdge {
        graph_id: GraphId,
        from: EntityId,
        to: EntityId,
        props: String,
    },
    UpdateEdge {
        id: EntityId,
        props: String,
        weight: Option<f32>,
    },
    DeleteEdge {
        id: EntityId,
    },
}

/// Resolved value of a [`MutationRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutput {
    Node(NodeRecord),
    Edge(EdgeRecord),
    Deleted(bool),
}

impl MutationRequest {
    /// Operation name used in error reports (`createNode`, ...).
    pub fn operation(&self) -> &'static str {
        match self {
            Self::CreateNode { .. } => "createNode",
            Self::UpdateNode { .. } => "updateNode",
            Self::DeleteNode { .. } => "deleteNode",
            Self::CreateEdge { .. } => "createEdge",
            Self::UpdateEdge { .. } => "updateEdge",
            Self::DeleteEdge { .. } => "deleteEdge",
        }
    }

    pub fn execute(&self, transport: &dyn GraphTransport) -> TransportFuture<MutationOutput> {
        match self {
            Self::CreateNode { graph_id, props } => transport
                .create_node(graph_id, props.clone())
                .map(|result| result.map(MutationOutput::Node))
                .boxed(),
            Self::UpdateNode { id, props, weight } => transport
                .update_node(id, props.clone(), *weight)
                .map(|result| result.map(MutationOutput::Node))
                .boxed(),
            Self::DeleteNode { id } => transport
                .delete_node(id)
                .map(|result| result.map(MutationOutput::Deleted))
                .boxed(),
            Self::CreateEdge {
                graph_id,
                from,
                to,
                props,
            } => transport
                .create_edge(graph_id, from, to, props.clone())
                .map(|result| result.map(MutationOutput::Edge))
                .boxed(),
            Self::UpdateEdge { id, props, weight } => transport
                .update_edge(id, props.clone(), *weight)
                .map(|result| result.map(MutationOutput::Edge))
                .boxed(),
            Self::DeleteEdge { id } => transport
                .delete_edge(id)
                .map(|result| result.map(MutationOutput::Deleted))
                .boxed(),
        }
    }
}
