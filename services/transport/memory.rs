/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! In-process transport backend.
//!
//! Holds source graphs in memory, assigns server identities on create and
//! echoes every accepted mutation to subscribers the way a real backend
//! would. Used by tests and by hosts that run the editor without a server.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, BoxStream, StreamExt};
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use super::types::{EdgeRecord, NodeRecord, RawGraph, RecordRef, RemoteEvent};
use super::{GraphTransport, MutationRequest, TransportFuture};
use crate::error::TransportError;
use crate::graph::GraphId;

const EVENT_BUFFER: usize = 1024;

/// Weight assigned by the backend to freshly created entities.
pub const DEFAULT_CREATED_WEIGHT: f32 = 0.5;

#[derive(Debug, Default)]
struct ServerState {
    graphs: Vec<RawGraph>,
    failures: VecDeque<TransportError>,
    mutations: Vec<MutationRequest>,
    fetches: Vec<GraphId>,
    outbox: Vec<(GraphId, RemoteEvent)>,
}

impl ServerState {
    fn graph_mut(&mut self, graph_id: &str) -> Result<&mut RawGraph, TransportError> {
        self.graphs
            .iter_mut()
            .find(|graph| graph.id == graph_id)
            .ok_or_else(|| TransportError::NotFound(format!("graph {graph_id}")))
    }

    fn find_node(&mut self, id: &str) -> Option<(GraphId, &mut NodeRecord)> {
        self.graphs.iter_mut().find_map(|graph| {
            let graph_id = graph.id.clone();
            graph
                .nodes
                .iter_mut()
                .find(|node| node.id == id)
                .map(|node| (graph_id, node))
        })
    }

    fn find_edge(&mut self, id: &str) -> Option<(GraphId, &mut EdgeRecord)> {
        self.graphs.iter_mut().find_map(|graph| {
            let graph_id = graph.id.clone();
            graph
                .edges
                .iter_mut()
                .find(|edge| edge.id == id)
                .map(|edge| (graph_id, edge))
        })
    }

    fn node_exists(&self, id: &str) -> bool {
        self.graphs
            .iter()
            .any(|graph| graph.nodes.iter().any(|node| node.id == id))
    }
}

struct Inner {
    state: Mutex<ServerState>,
    events: broadcast::Sender<(GraphId, RemoteEvent)>,
    latency: Option<Duration>,
    echo_mutations: bool,
}

impl Inner {
    fn publish(&self, pending: Vec<(GraphId, RemoteEvent)>) {
        for (graph_id, event) in pending {
            // No receivers is fine: nobody is subscribed yet.
            let _ = self.events.send((graph_id, event));
        }
    }
}

/// Cheaply cloneable handle to a shared in-memory backend.
#[derive(Clone)]
pub struct InMemoryTransport {
    inner: Arc<Inner>,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::build(None, true)
    }

    /// Every round-trip sleeps for `latency` before touching server state.
    pub fn with_latency(latency: Duration) -> Self {
        Self::build(Some(latency), true)
    }

    /// Backend that does not echo accepted mutations to subscribers.
    pub fn without_echo() -> Self {
        Self::build(None, false)
    }

    fn build(latency: Option<Duration>, echo_mutations: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ServerState::default()),
                events,
                latency,
                echo_mutations,
            }),
        }
    }

    /// Seed or replace a stored graph.
    pub fn insert_graph(&self, graph: RawGraph) {
        let mut state = self.inner.state.lock();
        match state.graphs.iter_mut().find(|existing| existing.id == graph.id) {
            Some(existing) => *existing = graph,
            None => state.graphs.push(graph),
        }
    }

    pub fn graph(&self, graph_id: &str) -> Option<RawGraph> {
        self.inner
            .state
            .lock()
            .graphs
            .iter()
            .find(|graph| graph.id == graph_id)
            .cloned()
    }

    /// The next round-trip (fetch or mutation) fails with `error`.
    pub fn fail_next(&self, error: TransportError) {
        self.inner.state.lock().failures.push_back(error);
    }

    /// Push an event to subscribers of `graph_id`, as another editor would.
    pub fn publish(&self, graph_id: &str, event: RemoteEvent) {
        self.inner.publish(vec![(graph_id.to_string(), event)]);
    }

    /// Mutations received so far, in call order.
    pub fn mutations(&self) -> Vec<MutationRequest> {
        self.inner.state.lock().mutations.clone()
    }

    /// Number of received mutations with the given operation name.
    pub fn mutation_count(&self, operation: &str) -> usize {
        self.inner
            .state
            .lock()
            .mutations
            .iter()
            .filter(|request| request.operation() == operation)
            .count()
    }

    pub fn fetch_count(&self) -> usize {
        self.inner.state.lock().fetches.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.events.receiver_count()
    }

    fn record(&self, request: MutationRequest) {
        self.inner.state.lock().mutations.push(request);
    }

    /// Run `op` against server state after the configured latency, then
    /// publish whatever events it queued.
    fn run<T, F>(&self, op: F) -> TransportFuture<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut ServerState, bool) -> Result<T, TransportError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        async move {
            if let Some(latency) = inner.latency {
                tokio::time::sleep(latency).await;
            }
            let (result, pending) = {
                let mut state = inner.state.lock();
                if let Some(error) = state.failures.pop_front() {
                    return Err(error);
                }
                let result = op(&mut *state, inner.echo_mutations);
                (result, std::mem::take(&mut state.outbox))
            };
            inner.publish(pending);
            result
        }
        .boxed()
    }
}

impl GraphTransport for InMemoryTransport {
    fn fetch_graph(&self, graph_id: &str) -> TransportFuture<RawGraph> {
        let graph_id = graph_id.to_string();
        self.run(move |state, _| {
            state.fetches.push(graph_id.clone());
            state.graph_mut(&graph_id).map(|graph| graph.clone())
        })
    }

    fn create_node(&self, graph_id: &str, props: String) -> TransportFuture<NodeRecord> {
        self.record(MutationRequest::CreateNode {
            graph_id: graph_id.to_string(),
            props: props.clone(),
        });
        let graph_id = graph_id.to_string();
        self.run(move |state, echo| {
            let record = NodeRecord {
                id: Uuid::new_v4().to_string(),
                graph_id: Some(graph_id.clone()),
                weight: DEFAULT_CREATED_WEIGHT,
                level: 1,
                props,
            };
            state.graph_mut(&graph_id)?.nodes.push(record.clone());
            if echo {
                state
                    .outbox
                    .push((graph_id, RemoteEvent::NodeCreated(record.clone())));
            }
            Ok(record)
        })
    }

    fn update_node(
        &self,
        id: &str,
        props: String,
        weight: Option<f32>,
    ) -> TransportFuture<NodeRecord> {
        self.record(MutationRequest::UpdateNode {
            id: id.to_string(),
            props: props.clone(),
            weight,
        });
        let id = id.to_string();
        self.run(move |state, echo| {
            let (graph_id, node) = state
                .find_node(&id)
                .ok_or_else(|| TransportError::NotFound(format!("node {id}")))?;
            if node.level == 0 {
                return Err(TransportError::Rejected(format!("node {id} is verified")));
            }
            node.props = props;
            if let Some(weight) = weight {
                node.weight = weight;
            }
            let mut record = node.clone();
            record.graph_id = Some(graph_id.clone());
            if echo {
                state
                    .outbox
                    .push((graph_id, RemoteEvent::NodeUpdated(record.clone())));
            }
            Ok(record)
        })
    }

    fn delete_node(&self, id: &str) -> TransportFuture<bool> {
        self.record(MutationRequest::DeleteNode { id: id.to_string() });
        let id = id.to_string();
        self.run(move |state, echo| {
            let Some((graph_id, node)) = state.find_node(&id) else {
                return Ok(false);
            };
            if node.level == 0 {
                return Err(TransportError::Rejected(format!("node {id} is verified")));
            }
            for graph in &mut state.graphs {
                graph.nodes.retain(|node| node.id != id);
                graph
                    .edges
                    .retain(|edge| edge.from.id != id && edge.to.id != id);
            }
            if echo {
                state
                    .outbox
                    .push((graph_id, RemoteEvent::NodeDeleted { id }));
            }
            Ok(true)
        })
    }

    fn create_edge(
        &self,
        graph_id: &str,
        from: &str,
        to: &str,
        props: String,
    ) -> TransportFuture<EdgeRecord> {
        self.record(MutationRequest::CreateEdge {
            graph_id: graph_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            props: props.clone(),
        });
        let (graph_id, from, to) = (graph_id.to_string(), from.to_string(), to.to_string());
        self.run(move |state, echo| {
            for endpoint in [&from, &to] {
                if !state.node_exists(endpoint) {
                    return Err(TransportError::NotFound(format!("node {endpoint}")));
                }
            }
            let record = EdgeRecord {
                id: Uuid::new_v4().to_string(),
                graph_id: Some(graph_id.clone()),
                from: RecordRef::from(from.as_str()),
                to: RecordRef::from(to.as_str()),
                weight: DEFAULT_CREATED_WEIGHT,
                level: 1,
                props,
            };
            state.graph_mut(&graph_id)?.edges.push(record.clone());
            if echo {
                state
                    .outbox
                    .push((graph_id, RemoteEvent::EdgeCreated(record.clone())));
            }
            Ok(record)
        })
    }

    fn update_edge(
        &self,
        id: &str,
        props: String,
        weight: Option<f32>,
    ) -> TransportFuture<EdgeRecord> {
        self.record(MutationRequest::UpdateEdge {
            id: id.to_string(),
            props: props.clone(),
            weight,
        });
        let id = id.to_string();
        self.run(move |state, echo| {
            let (graph_id, edge) = state
                .find_edge(&id)
                .ok_or_else(|| TransportError::NotFound(format!("edge {id}")))?;
            if edge.level == 0 {
                return Err(TransportError::Rejected(format!("edge {id} is verified")));
            }
            edge.props = props;
            if let Some(weight) = weight {
                edge.weight = weight;
            }
            let mut record = edge.clone();
            record.graph_id = Some(graph_id.clone());
            if echo {
                state
                    .outbox
                    .push((graph_id, RemoteEvent::EdgeUpdated(record.clone())));
            }
            Ok(record)
        })
    }

    fn delete_edge(&self, id: &str) -> TransportFuture<bool> {
        self.record(MutationRequest::DeleteEdge { id: id.to_string() });
        let id = id.to_string();
        self.run(move |state, echo| {
            let Some((graph_id, edge)) = state.find_edge(&id) else {
                return Ok(false);
            };
            if edge.level == 0 {
                return Err(TransportError::Rejected(format!("edge {id} is verified")));
            }
            for graph in &mut state.graphs {
                graph.edges.retain(|edge| edge.id != id);
            }
            if echo {
                state
                    .outbox
                    .push((graph_id, RemoteEvent::EdgeDeleted { id }));
            }
            Ok(true)
        })
    }

    fn subscribe(&self, graph_id: &str) -> BoxStream<'static, RemoteEvent> {
        let receiver = self.inner.events.subscribe();
        let graph_id = graph_id.to_string();
        stream::unfold(receiver, move |mut receiver| {
            let graph_id = graph_id.clone();
            async move {
                loop {
                    match receiver.recv().await {
                        Ok((source, event)) if source == graph_id => return Some((event, receiver)),
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            log::warn!("transport: subscriber for {graph_id} lagged by {skipped} events");
                        },
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> InMemoryTransport {
        let transport = InMemoryTransport::new();
        transport.insert_graph(RawGraph {
            id: "g1".into(),
            name: "Theory".into(),
            level: None,
            nodes: vec![NodeRecord {
                id: "a".into(),
                graph_id: None,
                weight: 0.6,
                level: 1,
                props: "{}".into(),
            }],
            edges: Vec::new(),
        });
        transport
    }

    #[tokio::test]
    async fn create_assigns_fresh_identity_and_echoes() {
        let transport = seeded();
        let mut events = transport.subscribe("g1");
        let record = transport.create_node("g1", "{}".into()).await.unwrap();
        assert_ne!(record.id, "a");
        assert_eq!(record.graph_id.as_deref(), Some("g1"));

        let echoed = events.next().await.unwrap();
        assert_eq!(echoed, RemoteEvent::NodeCreated(record));
        assert_eq!(transport.mutation_count("createNode"), 1);
    }

    #[tokio::test]
    async fn injected_failure_applies_to_next_call_only() {
        let transport = seeded();
        transport.fail_next(TransportError::Unavailable("offline".into()));
        let failed = transport.update_node("a", "{}".into(), None).await;
        assert_eq!(failed, Err(TransportError::Unavailable("offline".into())));
        assert!(transport.update_node("a", "{}".into(), Some(0.9)).await.is_ok());
        assert_eq!(transport.graph("g1").unwrap().nodes[0].weight, 0.9);
    }

    #[tokio::test]
    async fn verified_records_are_rejected() {
        let transport = seeded();
        transport.insert_graph(RawGraph {
            id: "g0".into(),
            name: "Consensus".into(),
            level: None,
            nodes: vec![NodeRecord {
                id: "v".into(),
                graph_id: None,
                weight: 1.0,
                level: 0,
                props: String::new(),
            }],
            edges: Vec::new(),
        });
        assert!(matches!(
            transport.delete_node("v").await,
            Err(TransportError::Rejected(_))
        ));
        assert_eq!(transport.delete_node("missing").await, Ok(false));
    }

    #[tokio::test]
    async fn subscription_filters_by_graph() {
        let transport = seeded();
        let mut events = transport.subscribe("g1");
        transport.publish("other", RemoteEvent::NodeDeleted { id: "x".into() });
        transport.publish("g1", RemoteEvent::NodeDeleted { id: "y".into() });
        assert_eq!(
            events.next().await,
            Some(RemoteEvent::NodeDeleted { id: "y".into() })
        );
    }

    #[tokio::test]
    async fn edge_create_requires_existing_endpoints() {
        let transport = seeded();
        let result = transport.create_edge("g1", "a", "ghost", "{}".into()).await;
        assert!(matches!(result, Err(TransportError::NotFound(_))));
    }
}
