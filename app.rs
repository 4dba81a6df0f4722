/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Editor session: the explicit store that owns the merged graph.
//!
//! Every state change goes through [`EditorSession::apply_intents`], a
//! synchronous reducer, or through [`EditorSession::tick`], which drains
//! queued transport events and then advances animation and the debounced
//! save. Lifecycle: `Created -> Active -> Disposed`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use euclid::default::Point2D;

use crate::config::EditorConfig;
use crate::error::{ConfigError, EditorError};
use crate::graph::lock::{
    can_connect, can_create, can_delete_node, can_duplicate, can_mutate, is_locked,
};
use crate::graph::overlay::{MergeReport, OverlayStore, edge_from_record, node_from_record};
use crate::graph::reconcile::{ReconcileOutcome, ReconcileScope, apply_remote_event};
use crate::graph::{Edge, EdgeProps, EntityId, Graph, GraphId, Node, NodeProps, clamp_weight};
use crate::history::EditHistory;
use crate::layout::{
    CircularLayout, LayoutAlgorithm, LayoutConfig, LayoutController, LayoutFrame, LayoutPositions,
    plan_targets,
};
use crate::render::action_registry::{
    ActionContext, ActionEntry, ActionId, ActionTarget, is_action_enabled, list_actions_for_context,
};
use crate::render::context_menu::{ContextMenu, MenuTarget, intents_for_action};
use crate::runtime::control_panel::{
    ControlPanel, MutationId, QueuedEvent, SessionEvent, TransportCommand,
};
use crate::runtime::save_debounce::SaveDebouncer;
use crate::services::clipboard::{Clipboard, CopiedEdge, duplicate_props};
use crate::services::transport::{
    EdgeRecord, GraphTransport, MutationOutput, MutationRequest, NodeRecord, RawGraph,
    RemoteEvent,
};

const LOAD_LABEL: &str = "Load";

/// Quiet polls [`EditorSession::settle`] waits for before returning.
const SETTLE_QUIET_ROUNDS: usize = 3;

/// Canonical selection state over nodes and edges.
///
/// Nodes and edges are kept in selection order; the primary element is the
/// most recently selected one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionState {
    nodes: Vec<EntityId>,
    edges: Vec<EntityId>,
    revision: u64,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotonic revision incremented whenever the selection changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn nodes(&self) -> &[EntityId] {
        &self.nodes
    }

    pub fn edges(&self) -> &[EntityId] {
        &self.edges
    }

    pub fn primary_node(&self) -> Option<&str> {
        self.nodes.last().map(String::as_str)
    }

    pub fn primary_edge(&self) -> Option<&str> {
        self.edges.last().map(String::as_str)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|selected| selected == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    fn bump(&mut self) {
        self.revision = self.revision.saturating_add(1);
    }

    /// Without `extend` the selection is replaced; with it the node toggles.
    pub fn select_node(&mut self, id: &str, extend: bool) {
        if extend {
            if let Some(index) = self.nodes.iter().position(|selected| selected == id) {
                self.nodes.remove(index);
            } else {
                self.nodes.push(id.to_string());
            }
        } else {
            self.nodes.clear();
            self.edges.clear();
            self.nodes.push(id.to_string());
        }
        self.bump();
    }

    pub fn select_edge(&mut self, id: &str, extend: bool) {
        if extend {
            if let Some(index) = self.edges.iter().position(|selected| selected == id) {
                self.edges.remove(index);
            } else {
                self.edges.push(id.to_string());
            }
        } else {
            self.nodes.clear();
            self.edges.clear();
            self.edges.push(id.to_string());
        }
        self.bump();
    }

    pub fn replace_nodes(&mut self, ids: Vec<EntityId>) {
        self.nodes = ids;
        self.edges.clear();
        self.bump();
    }

    pub fn clear(&mut self) {
        if self.is_empty() {
            return;
        }
        self.nodes.clear();
        self.edges.clear();
        self.bump();
    }

    /// Drop ids that no longer exist. Returns whether the primary node and
    /// the primary edge were dropped.
    fn retain_existing(&mut self, graph: &Graph) -> (bool, bool) {
        let primary_node = self.nodes.last().cloned();
        let primary_edge = self.edges.last().cloned();
        let before = (self.nodes.len(), self.edges.len());
        self.nodes.retain(|id| graph.contains_node(id));
        self.edges.retain(|id| graph.contains_edge(id));
        if before != (self.nodes.len(), self.edges.len()) {
            self.bump();
        }
        (
            primary_node.is_some_and(|id| !graph.contains_node(&id)),
            primary_edge.is_some_and(|id| !graph.contains_edge(&id)),
        )
    }
}

/// Drag phase of a position update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    /// Intermediate frame: live graph only, no history, no round-trip.
    Dragging,
    /// Drag ended: commit history and persist once.
    Released,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphIntent {
    /// Create a node in the primary writable graph at `position`.
    CreateNode {
        position: Point2D<f32>,
        props: NodeProps,
    },
    /// Replace a node's property bag. A bag without a position keeps the
    /// current one.
    UpdateNodeProps {
        id: EntityId,
        props: NodeProps,
        weight: Option<f32>,
    },
    SetNodePosition {
        id: EntityId,
        position: Point2D<f32>,
        phase: DragPhase,
    },
    DeleteNode {
        id: EntityId,
    },
    CreateEdge {
        from: EntityId,
        to: EntityId,
        props: EdgeProps,
    },
    UpdateEdgeProps {
        id: EntityId,
        props: EdgeProps,
        weight: Option<f32>,
    },
    DeleteEdge {
        id: EntityId,
    },
    DeleteSelection,
    SelectNode {
        id: EntityId,
        extend: bool,
    },
    SelectEdge {
        id: EntityId,
        extend: bool,
    },
    ClearSelection,
    SelectAll,
    CopySelection,
    Paste {
        at: Point2D<f32>,
    },
    DuplicateNode {
        id: EntityId,
    },
    Undo,
    Redo,
    ApplyLayout(LayoutConfig),
    RequestFitToView,
    OpenContextMenu {
        target: MenuTarget,
        screen: Point2D<f32>,
        canvas: Point2D<f32>,
    },
    CloseContextMenu,
    DispatchContextAction(ActionId),
}

/// Outgoing notification for the surrounding application.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorNotification {
    /// Debounced snapshot of the merged collection.
    Save { nodes: Vec<Node>, edges: Vec<Edge> },
    Error(EditorError),
    NodeSelected(Option<Node>),
    EdgeSelected(Option<Edge>),
    FitToView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Active,
    Disposed,
}

type BatchId = u64;

#[derive(Debug, Clone)]
enum PendingCreate {
    Node {
        label: &'static str,
        /// Paste batch and the copied node this create stands for.
        batch: Option<(BatchId, EntityId)>,
    },
    Edge {
        label: &'static str,
        batch: Option<BatchId>,
    },
}

/// A paste in flight: nodes first, then the copied edges rewired to the
/// identities the server assigned.
#[derive(Debug, Clone, Default)]
struct PasteBatch {
    pending_nodes: usize,
    pending_edges: usize,
    id_map: HashMap<EntityId, EntityId>,
    edges: Vec<CopiedEdge>,
    created: usize,
}

pub struct EditorSession {
    config: EditorConfig,
    state: SessionState,
    graph: Graph,
    overlay: OverlayStore,
    merge_report: MergeReport,
    history: EditHistory,
    selection: SelectionState,
    clipboard: Clipboard,
    context_menu: ContextMenu,
    layout: LayoutController,
    layout_algorithm: Box<dyn LayoutAlgorithm>,
    debouncer: SaveDebouncer,
    panel: ControlPanel,
    notifications: Vec<EditorNotification>,
    pending_creates: HashMap<MutationId, PendingCreate>,
    paste_batches: HashMap<BatchId, PasteBatch>,
    next_mutation_id: MutationId,
    next_batch_id: BatchId,
    subscribed: HashSet<GraphId>,
    /// The collection changed since the last tick.
    dirty: bool,
}

impl EditorSession {
    /// Build a session. Transport calls need a tokio runtime to be current.
    pub fn new(config: EditorConfig, transport: Arc<dyn GraphTransport>) -> Result<Self, ConfigError> {
        config.validate()?;
        let overlay = OverlayStore::with_graph_ids(&config.graph_ids)?;
        Ok(Self {
            history: EditHistory::with_limit(config.history_limit),
            debouncer: SaveDebouncer::new(config.save_debounce()),
            config,
            state: SessionState::Created,
            graph: Graph::new(),
            overlay,
            merge_report: MergeReport::default(),
            selection: SelectionState::new(),
            clipboard: Clipboard::default(),
            context_menu: ContextMenu::default(),
            layout: LayoutController::new(),
            layout_algorithm: Box::new(CircularLayout::default()),
            panel: ControlPanel::new(transport),
            notifications: Vec::new(),
            pending_creates: HashMap::new(),
            paste_batches: HashMap::new(),
            next_mutation_id: 0,
            next_batch_id: 0,
            subscribed: HashSet::new(),
            dirty: false,
        })
    }

    pub fn set_layout_algorithm(&mut self, algorithm: impl LayoutAlgorithm + 'static) {
        self.layout_algorithm = Box::new(algorithm);
    }

    /// Activate with already-fetched sources, merged in the given order.
    pub fn init(&mut self, sources: Vec<RawGraph>) {
        if !self.activate() {
            return;
        }
        for raw in sources {
            self.ingest_source(raw);
        }
    }

    /// Activate and fetch every configured source through the transport.
    /// Sources are merged as their fetches resolve.
    pub fn init_from_transport(&mut self) {
        if !self.activate() {
            return;
        }
        let graph_ids: Vec<GraphId> = self.overlay.graph_ids().map(str::to_string).collect();
        for graph_id in graph_ids {
            self.panel.submit(TransportCommand::Fetch { graph_id });
        }
    }

    fn activate(&mut self) -> bool {
        if self.state != SessionState::Created {
            log::warn!("session: init called in state {:?}", self.state);
            return false;
        }
        self.state = SessionState::Active;
        true
    }

    /// Tear down. Results of round-trips still in flight are ignored when
    /// they land.
    pub fn dispose(&mut self) {
        if self.state == SessionState::Disposed {
            return;
        }
        if let Some(transition) = self.layout.cancel() {
            log::debug!("session: cancelled layout {transition:?} on dispose");
        }
        self.debouncer.cancel();
        self.panel.cancel();
        log::debug!("session: {} worker(s) left to reap", self.panel.worker_count());
        self.context_menu.close();
        self.pending_creates.clear();
        self.paste_batches.clear();
        self.state = SessionState::Disposed;
        log::debug!("session: disposed");
    }

    /// Dispose and wait for every background task to finish.
    pub async fn shutdown(&mut self) {
        self.dispose();
        self.panel.shutdown().await;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub fn context_menu(&self) -> &ContextMenu {
        &self.context_menu
    }

    pub fn merge_report(&self) -> &MergeReport {
        &self.merge_report
    }

    pub fn is_read_only(&self) -> bool {
        self.config.read_only
    }

    /// Graph new entities attach to; `None` disables creation.
    pub fn primary_writable(&self) -> Option<&str> {
        self.overlay.primary_writable()
    }

    pub fn is_animating(&self) -> bool {
        self.layout.is_animating()
    }

    pub fn save_pending(&self) -> bool {
        self.dirty || self.debouncer.is_pending()
    }

    pub fn take_notifications(&mut self) -> Vec<EditorNotification> {
        std::mem::take(&mut self.notifications)
    }

    /// Actions of the open context menu, or empty when it is closed.
    pub fn context_actions(&self) -> Vec<ActionEntry> {
        match self.context_menu.open_menu() {
            Some(menu) => list_actions_for_context(&self.action_context(&menu.target)),
            None => Vec::new(),
        }
    }

    fn action_context(&self, target: &MenuTarget) -> ActionContext<'_> {
        let target = match target {
            MenuTarget::Node(id) => self.graph.get_node(id).map(ActionTarget::Node),
            MenuTarget::Edge(id) => self.graph.get_edge(id).map(ActionTarget::Edge),
            MenuTarget::Canvas => Some(ActionTarget::Canvas),
        };
        ActionContext {
            target,
            connect_source: self
                .selection
                .primary_node()
                .and_then(|id| self.graph.get_node(id)),
            pinned_by_edge: match target {
                Some(ActionTarget::Node(node)) => self
                    .graph
                    .incident_edges(&node.id)
                    .into_iter()
                    .any(|edge| is_locked(edge)),
                _ => false,
            },
            read_only: self.config.read_only,
            writable_graph: self.overlay.primary_writable(),
            clipboard_filled: !self.clipboard.is_empty(),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        }
    }

    fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Apply a batch of intents deterministically in insertion order.
    pub fn apply_intents<I>(&mut self, intents: I)
    where
        I: IntoIterator<Item = GraphIntent>,
    {
        for intent in intents {
            self.apply_intent(intent);
        }
    }

    fn apply_intent(&mut self, intent: GraphIntent) {
        if !self.is_active() {
            log::debug!("session: ignoring {intent:?} in state {:?}", self.state);
            return;
        }
        match intent {
            GraphIntent::CreateNode { position, props } => self.create_node(position, props),
            GraphIntent::UpdateNodeProps { id, props, weight } => {
                self.update_node_props(&id, props, weight)
            },
            GraphIntent::SetNodePosition {
                id,
                position,
                phase,
            } => self.set_node_position(&id, position, phase),
            GraphIntent::DeleteNode { id } => {
                if self.remove_node_locally(&id) {
                    self.commit("Delete node");
                }
            },
            GraphIntent::CreateEdge { from, to, props } => self.create_edge(&from, &to, props, None),
            GraphIntent::UpdateEdgeProps { id, props, weight } => {
                self.update_edge_props(&id, props, weight)
            },
            GraphIntent::DeleteEdge { id } => {
                if self.remove_edge_locally(&id) {
                    self.commit("Delete edge");
                }
            },
            GraphIntent::DeleteSelection => self.delete_selection(),
            GraphIntent::SelectNode { id, extend } => {
                if let Some(node) = self.graph.get_node(&id) {
                    let node = node.clone();
                    self.selection.select_node(&id, extend);
                    self.notify(EditorNotification::NodeSelected(Some(node)));
                }
            },
            GraphIntent::SelectEdge { id, extend } => {
                if let Some(edge) = self.graph.get_edge(&id) {
                    let edge = edge.clone();
                    self.selection.select_edge(&id, extend);
                    self.notify(EditorNotification::EdgeSelected(Some(edge)));
                }
            },
            GraphIntent::ClearSelection => {
                if !self.selection.is_empty() {
                    self.selection.clear();
                    self.notify(EditorNotification::NodeSelected(None));
                    self.notify(EditorNotification::EdgeSelected(None));
                }
            },
            GraphIntent::SelectAll => {
                let ids = self.graph.nodes().map(|node| node.id.clone()).collect();
                self.selection.replace_nodes(ids);
                let primary = self
                    .selection
                    .primary_node()
                    .and_then(|id| self.graph.get_node(id))
                    .cloned();
                self.notify(EditorNotification::NodeSelected(primary));
            },
            GraphIntent::CopySelection => {
                self.clipboard = Clipboard::copy(&self.graph, self.selection.nodes(), true);
            },
            GraphIntent::Paste { at } => self.paste(at),
            GraphIntent::DuplicateNode { id } => self.duplicate(&id),
            GraphIntent::Undo => self.step_history(true),
            GraphIntent::Redo => self.step_history(false),
            GraphIntent::ApplyLayout(config) => self.apply_layout(config),
            GraphIntent::RequestFitToView => self.notify(EditorNotification::FitToView),
            GraphIntent::OpenContextMenu {
                target,
                screen,
                canvas,
            } => self.context_menu.open(target, screen, canvas),
            GraphIntent::CloseContextMenu => {
                self.context_menu.close();
            },
            GraphIntent::DispatchContextAction(action) => self.dispatch_context_action(action),
        }
    }

    /// Per-frame entry point.
    pub fn tick(&mut self, now: Instant) {
        self.pump(now);
    }

    /// [`Self::tick`], returning how many queued events were handled.
    fn pump(&mut self, now: Instant) -> usize {
        let events = self.panel.drain_pending();
        if self.state == SessionState::Disposed {
            if !events.is_empty() {
                log::debug!("session: discarding {} events after dispose", events.len());
            }
            return 0;
        }
        let handled = events.len();
        for queued in events {
            self.handle_event(queued);
        }

        if let Some(frame) = self.layout.advance(now) {
            self.apply_layout_frame(frame);
        }

        if self.dirty {
            self.dirty = false;
            self.debouncer.mark_dirty(now);
        }
        if self.debouncer.poll(now) {
            let (nodes, edges) = self.graph.to_parts();
            log::debug!("session: save ({} nodes, {} edges)", nodes.len(), edges.len());
            self.notify(EditorNotification::Save { nodes, edges });
        }
        handled
    }

    /// Tick until every issued round-trip has landed and the event channel
    /// stays quiet for a few polls.
    pub async fn settle(&mut self, now: Instant) {
        let mut quiet = 0;
        while quiet < SETTLE_QUIET_ROUNDS {
            if self.panel.in_flight() > 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            } else {
                tokio::task::yield_now().await;
            }
            let handled = self.pump(now);
            if handled == 0 && self.panel.in_flight() == 0 {
                quiet += 1;
            } else {
                quiet = 0;
            }
        }
    }

    fn notify(&mut self, notification: EditorNotification) {
        self.notifications.push(notification);
    }

    /// Snapshot the graph into history. Animation frames are transient, so
    /// nodes still in flight are recorded at their start positions.
    fn commit(&mut self, label: &'static str) {
        match self.layout.start_positions() {
            Some(start) => {
                let mut settled = self.graph.clone();
                for (id, position) in start {
                    settled.set_node_position(id, *position);
                }
                self.history.commit(&settled, label);
            },
            None => self.history.commit(&self.graph, label),
        }
        self.dirty = true;
        log::debug!("session: committed \"{label}\" ({} entries)", self.history.len());
    }

    fn send(&mut self, request: MutationRequest) -> MutationId {
        self.next_mutation_id += 1;
        let id = self.next_mutation_id;
        self.panel.submit(TransportCommand::Mutate { id, request });
        id
    }

    fn ensure_subscription(&mut self) {
        let Some(primary) = self.overlay.primary_writable() else {
            return;
        };
        if self.subscribed.insert(primary.to_string()) {
            log::debug!("session: subscribing to {primary}");
            self.panel.submit(TransportCommand::Subscribe {
                graph_id: primary.to_string(),
            });
        }
    }

    fn ingest_source(&mut self, raw: RawGraph) {
        let graph_id = raw.id.clone();
        let report = self.overlay.ingest(&mut self.graph, raw);
        if !report.dangling_edges.is_empty() {
            log::warn!(
                "session: {} dangling edge(s) dropped from {graph_id}",
                report.dangling_edges.len()
            );
        }
        self.merge_report.dangling_edges.extend(report.dangling_edges);
        self.merge_report.overridden.extend(report.overridden);
        self.merge_report.skipped_sources.extend(report.skipped_sources);
        self.merge_report.malformed_props.extend(report.malformed_props);

        // Later sources fold into the load snapshot while nothing has been
        // committed on top of it; they never add entries of their own.
        if !self.graph.is_empty() && self.history.len() <= 1 {
            self.history.clear();
            self.history.commit(&self.graph, LOAD_LABEL);
        }
        self.ensure_subscription();
        self.selection.retain_existing(&self.graph);
    }

    fn handle_event(&mut self, queued: QueuedEvent) {
        log::debug!(
            "session: {:?} event after {:?}",
            queued.source,
            queued.queued_at.elapsed()
        );
        match queued.event {
            SessionEvent::SourceLoaded { graph_id, result } => match result {
                Ok(raw) => self.ingest_source(raw),
                Err(source) => {
                    log::warn!("session: loading {graph_id} failed ({source})");
                    self.notify(EditorNotification::Error(EditorError::SourceLoad {
                        graph_id,
                        source,
                    }));
                },
            },
            SessionEvent::Remote { graph_id, event } => self.reconcile(&graph_id, &event),
            SessionEvent::MutationResolved {
                id,
                request,
                result,
            } => self.resolve_mutation(id, request, result),
        }
    }

    fn reconcile(&mut self, subscription: &str, event: &RemoteEvent) {
        let Some(primary) = self.overlay.primary_writable() else {
            return;
        };
        if primary != subscription {
            log::debug!("session: ignoring event from stale subscription {subscription}");
            return;
        }
        let Some(origin_color) = self.overlay.origin_color(primary) else {
            return;
        };
        let scope = ReconcileScope {
            writable_graph: primary,
            origin_color,
        };
        let outcome = apply_remote_event(&mut self.graph, event, scope);
        if outcome.changed() {
            self.dirty = true;
        }
        if let ReconcileOutcome::Removed { .. } = outcome {
            self.prune_selection();
        }
    }

    fn resolve_mutation(
        &mut self,
        id: MutationId,
        request: MutationRequest,
        result: Result<MutationOutput, crate::error::TransportError>,
    ) {
        let pending = self.pending_creates.remove(&id);
        match result {
            Err(source) => {
                log::warn!("session: {} failed ({source})", request.operation());
                self.notify(EditorNotification::Error(EditorError::Transport {
                    operation: request.operation(),
                    source,
                }));
                match pending {
                    Some(PendingCreate::Node {
                        batch: Some((batch, _)),
                        ..
                    }) => self.paste_node_resolved(batch, None),
                    Some(PendingCreate::Edge {
                        batch: Some(batch), ..
                    }) => self.paste_edge_resolved(batch, false),
                    _ => {},
                }
            },
            Ok(MutationOutput::Node(record)) => {
                if let Some(PendingCreate::Node { label, batch }) = pending {
                    let created = self.insert_created_node(&record);
                    match batch {
                        Some((batch, source_id)) => {
                            self.paste_node_resolved(batch, created.then_some((source_id, record.id)))
                        },
                        None if created => self.commit(label),
                        None => {},
                    }
                }
            },
            Ok(MutationOutput::Edge(record)) => {
                if let Some(PendingCreate::Edge { label, batch }) = pending {
                    let created = self.insert_created_edge(&record);
                    match batch {
                        Some(batch) => self.paste_edge_resolved(batch, created),
                        None if created => self.commit(label),
                        None => {},
                    }
                }
            },
            Ok(MutationOutput::Deleted(existed)) => {
                if !existed {
                    log::debug!("session: {} found nothing to delete", request.operation());
                }
            },
        }
    }

    /// Insert a server-confirmed node unless the subscription already did.
    /// Returns whether the node is present afterwards.
    fn insert_created_node(&mut self, record: &NodeRecord) -> bool {
        if self.graph.contains_node(&record.id) {
            return true;
        }
        let Some(origin) = record
            .graph_id
            .clone()
            .or_else(|| self.overlay.primary_writable().map(str::to_string))
        else {
            return false;
        };
        let Some(color) = self.overlay.origin_color(&origin) else {
            log::warn!("session: created node {} names unknown graph {origin}", record.id);
            return false;
        };
        let (node, _) = node_from_record(record, &origin, color, &mut rand::thread_rng());
        self.graph.insert_node(node);
        self.dirty = true;
        true
    }

    fn insert_created_edge(&mut self, record: &EdgeRecord) -> bool {
        if self.graph.contains_edge(&record.id) {
            return true;
        }
        let Some(origin) = record
            .graph_id
            .clone()
            .or_else(|| self.overlay.primary_writable().map(str::to_string))
        else {
            return false;
        };
        let Some(color) = self.overlay.origin_color(&origin) else {
            return false;
        };
        // Lock state may have changed while the round-trip was in flight.
        let connectable = match (self.graph.get_node(&record.from.id), self.graph.get_node(&record.to.id)) {
            (Some(from), Some(to)) => can_connect(from, to),
            _ => false,
        };
        if !connectable {
            log::warn!("session: dropping created edge {} (endpoint missing or locked)", record.id);
            return false;
        }
        let (edge, _) = edge_from_record(record, &origin, color);
        if self.graph.insert_edge(edge).is_none() {
            return false;
        }
        self.dirty = true;
        true
    }

    fn create_node(&mut self, position: Point2D<f32>, mut props: NodeProps) {
        let Some(graph_id) = self.writable_for_create() else {
            return;
        };
        props.position = Some(position);
        let id = self.send(MutationRequest::CreateNode {
            graph_id,
            props: props.to_json_string(),
        });
        self.pending_creates.insert(
            id,
            PendingCreate::Node {
                label: "Create node",
                batch: None,
            },
        );
    }

    fn writable_for_create(&self) -> Option<GraphId> {
        let writable = self.overlay.primary_writable();
        if !can_create(self.config.read_only, writable) {
            log::debug!("session: creation disabled (read-only or no writable graph)");
            return None;
        }
        writable.map(str::to_string)
    }

    fn update_node_props(&mut self, id: &str, mut props: NodeProps, weight: Option<f32>) {
        let read_only = self.config.read_only;
        let Some(node) = self.graph.get_node_mut(id) else {
            return;
        };
        if !can_mutate(&*node, read_only) {
            log::debug!("session: refusing update of locked node {id}");
            return;
        }
        let moved = props.position.is_some();
        if !moved {
            props.position = node.props.position;
        }
        node.props = props;
        if let Some(weight) = weight {
            node.weight = clamp_weight(weight);
        }
        let request = MutationRequest::UpdateNode {
            id: id.to_string(),
            props: node.props.to_json_string(),
            weight: weight.map(clamp_weight),
        };
        if moved {
            self.layout.release(id);
        }
        self.commit("Update node");
        self.send(request);
    }

    fn update_edge_props(&mut self, id: &str, props: EdgeProps, weight: Option<f32>) {
        let read_only = self.config.read_only;
        let Some(edge) = self.graph.get_edge_mut(id) else {
            return;
        };
        if !can_mutate(&*edge, read_only) {
            log::debug!("session: refusing update of locked edge {id}");
            return;
        }
        edge.props = props;
        if let Some(weight) = weight {
            edge.weight = clamp_weight(weight);
        }
        let request = MutationRequest::UpdateEdge {
            id: id.to_string(),
            props: edge.props.to_json_string(),
            weight: weight.map(clamp_weight),
        };
        self.commit("Update edge");
        self.send(request);
    }

    fn set_node_position(&mut self, id: &str, position: Point2D<f32>, phase: DragPhase) {
        if !(position.x.is_finite() && position.y.is_finite()) {
            return;
        }
        let read_only = self.config.read_only;
        let Some(node) = self.graph.get_node_mut(id) else {
            return;
        };
        if !can_mutate(&*node, read_only) {
            return;
        }
        node.props.position = Some(position);
        let props = node.props.to_json_string();
        if self.layout.release(id) {
            log::debug!("session: {id} moved by hand, released from layout");
        }
        self.dirty = true;
        if phase == DragPhase::Released {
            self.commit("Move node");
            self.send(MutationRequest::UpdateNode {
                id: id.to_string(),
                props,
                weight: None,
            });
        }
    }

    /// Remove an unlocked node and persist the delete. No history commit.
    fn remove_node_locally(&mut self, id: &str) -> bool {
        let allowed = self.graph.get_node(id).is_some_and(|node| {
            can_delete_node(node, &self.graph.incident_edges(id), self.config.read_only)
        });
        if !allowed {
            log::debug!("session: refusing delete of locked node {id}");
            return false;
        }
        let Some((_, cascaded)) = self.graph.remove_node(id) else {
            return false;
        };
        if !cascaded.is_empty() {
            log::debug!("session: delete of {id} cascaded to {} edge(s)", cascaded.len());
        }
        self.dirty = true;
        self.send(MutationRequest::DeleteNode { id: id.to_string() });
        self.prune_selection();
        true
    }

    fn remove_edge_locally(&mut self, id: &str) -> bool {
        let allowed = self
            .graph
            .get_edge(id)
            .is_some_and(|edge| can_mutate(edge, self.config.read_only));
        if !allowed || self.graph.remove_edge(id).is_none() {
            return false;
        }
        self.dirty = true;
        self.send(MutationRequest::DeleteEdge { id: id.to_string() });
        self.prune_selection();
        true
    }

    fn delete_selection(&mut self) {
        let nodes = self.selection.nodes().to_vec();
        let edges = self.selection.edges().to_vec();
        let mut removed = false;
        for id in &nodes {
            removed |= self.remove_node_locally(id);
        }
        for id in &edges {
            removed |= self.remove_edge_locally(id);
        }
        if removed {
            self.commit("Delete selection");
        }
    }

    fn prune_selection(&mut self) {
        let (node_dropped, edge_dropped) = self.selection.retain_existing(&self.graph);
        if node_dropped {
            self.notify(EditorNotification::NodeSelected(None));
        }
        if edge_dropped {
            self.notify(EditorNotification::EdgeSelected(None));
        }
    }

    fn create_edge(&mut self, from: &str, to: &str, props: EdgeProps, batch: Option<BatchId>) {
        let Some(graph_id) = self.writable_for_create() else {
            return;
        };
        let connectable = match (self.graph.get_node(from), self.graph.get_node(to)) {
            (Some(source), Some(target)) => can_connect(source, target),
            _ => false,
        };
        if !connectable {
            log::debug!("session: refusing edge {from} -> {to} (endpoint missing or locked)");
            return;
        }
        let id = self.send(MutationRequest::CreateEdge {
            graph_id,
            from: from.to_string(),
            to: to.to_string(),
            props: props.to_json_string(),
        });
        let label = if batch.is_some() { "Paste" } else { "Create edge" };
        self.pending_creates
            .insert(id, PendingCreate::Edge { label, batch });
        if let Some(batch) = batch
            && let Some(paste) = self.paste_batches.get_mut(&batch)
        {
            paste.pending_edges += 1;
        }
    }

    fn duplicate(&mut self, id: &str) {
        let Some(source) = self.graph.get_node(id) else {
            return;
        };
        let writable = self.overlay.primary_writable();
        if !can_duplicate(source, self.config.read_only, writable) {
            return;
        }
        let Some(graph_id) = writable.map(str::to_string) else {
            return;
        };
        let props = duplicate_props(source, self.config.duplicate_offset);
        let mutation = self.send(MutationRequest::CreateNode {
            graph_id,
            props: props.to_json_string(),
        });
        self.pending_creates.insert(
            mutation,
            PendingCreate::Node {
                label: "Duplicate node",
                batch: None,
            },
        );
    }

    fn paste(&mut self, at: Point2D<f32>) {
        let Some(graph_id) = self.writable_for_create() else {
            return;
        };
        let Some(plan) = self.clipboard.paste_plan(at, self.config.paste_spread) else {
            return;
        };
        self.next_batch_id += 1;
        let batch = self.next_batch_id;
        self.paste_batches.insert(
            batch,
            PasteBatch {
                pending_nodes: plan.nodes.len(),
                edges: plan.edges,
                ..PasteBatch::default()
            },
        );
        for node in plan.nodes {
            let mutation = self.send(MutationRequest::CreateNode {
                graph_id: graph_id.clone(),
                props: node.props.to_json_string(),
            });
            self.pending_creates.insert(
                mutation,
                PendingCreate::Node {
                    label: "Paste",
                    batch: Some((batch, node.source_id)),
                },
            );
        }
    }

    /// One node of a paste batch landed (`created` carries source and new id).
    fn paste_node_resolved(&mut self, batch: BatchId, created: Option<(EntityId, EntityId)>) {
        let Some(paste) = self.paste_batches.get_mut(&batch) else {
            return;
        };
        paste.pending_nodes = paste.pending_nodes.saturating_sub(1);
        if let Some((source_id, new_id)) = created {
            paste.id_map.insert(source_id, new_id);
            paste.created += 1;
        }
        if paste.pending_nodes > 0 {
            return;
        }
        let rewired: Vec<(EntityId, EntityId, EdgeProps)> = paste
            .edges
            .iter()
            .filter_map(|edge| {
                let from = paste.id_map.get(&edge.from)?;
                let to = paste.id_map.get(&edge.to)?;
                Some((from.clone(), to.clone(), edge.props.clone()))
            })
            .collect();
        for (from, to, props) in rewired {
            self.create_edge(&from, &to, props, Some(batch));
        }
        self.finish_paste_if_done(batch);
    }

    fn paste_edge_resolved(&mut self, batch: BatchId, created: bool) {
        if let Some(paste) = self.paste_batches.get_mut(&batch) {
            paste.pending_edges = paste.pending_edges.saturating_sub(1);
            if created {
                paste.created += 1;
            }
        }
        self.finish_paste_if_done(batch);
    }

    fn finish_paste_if_done(&mut self, batch: BatchId) {
        let done = self
            .paste_batches
            .get(&batch)
            .is_some_and(|paste| paste.pending_nodes == 0 && paste.pending_edges == 0);
        if !done {
            return;
        }
        if let Some(paste) = self.paste_batches.remove(&batch)
            && paste.created > 0
        {
            self.commit("Paste");
        }
    }

    fn step_history(&mut self, undo: bool) {
        if self.config.read_only {
            return;
        }
        let restored = if undo {
            self.history.undo()
        } else {
            self.history.redo()
        };
        let Some(graph) = restored else {
            return;
        };
        if let Some(transition) = self.layout.cancel() {
            log::debug!("session: history step cancelled layout {transition:?}");
        }
        self.graph = graph;
        self.dirty = true;
        self.prune_selection();
    }

    fn apply_layout(&mut self, config: LayoutConfig) {
        if let Some(previous) = self.layout.cancel() {
            log::debug!("layout: transition {previous:?} superseded by a new request");
        }
        if self.config.read_only {
            return;
        }
        let targets = plan_targets(&self.graph, self.layout_algorithm.as_ref());
        if targets.is_empty() {
            log::debug!("layout: nothing to move");
            return;
        }
        if !config.animated || config.animation_duration().is_zero() {
            self.commit_layout(&targets);
            return;
        }
        let from: LayoutPositions = targets
            .keys()
            .filter_map(|id| self.graph.get_node(id).map(|node| (id.clone(), node.position())))
            .collect();
        self.layout.begin(from, targets, config.animation_duration());
    }

    fn apply_layout_frame(&mut self, frame: LayoutFrame) {
        if frame.finished {
            let targets: LayoutPositions = frame.positions.into_iter().collect();
            self.commit_layout(&targets);
            return;
        }
        for (id, position) in &frame.positions {
            if self
                .graph
                .get_node(id)
                .is_some_and(|node| can_mutate(node, self.config.read_only))
            {
                self.graph.set_node_position(id, *position);
                self.dirty = true;
            }
        }
    }

    /// Write final layout positions through the committed path, then ask
    /// for a camera fit.
    fn commit_layout(&mut self, targets: &LayoutPositions) {
        let mut ids: Vec<&EntityId> = targets.keys().collect();
        ids.sort();
        let mut updates = Vec::new();
        for id in ids {
            let read_only = self.config.read_only;
            let Some(node) = self.graph.get_node_mut(id) else {
                continue;
            };
            if !can_mutate(&*node, read_only) {
                continue;
            }
            node.props.position = Some(targets[id]);
            updates.push(MutationRequest::UpdateNode {
                id: id.clone(),
                props: node.props.to_json_string(),
                weight: None,
            });
        }
        if !updates.is_empty() {
            self.commit("Apply layout");
            for request in updates {
                self.send(request);
            }
        }
        self.notify(EditorNotification::FitToView);
    }

    fn dispatch_context_action(&mut self, action: ActionId) {
        let Some(menu) = self.context_menu.take_for_dispatch() else {
            return;
        };
        let (enabled, connect_source) = {
            let context = self.action_context(&menu.target);
            (
                is_action_enabled(&context, action),
                context.connect_source.map(|node| node.id.clone()),
            )
        };
        if !enabled {
            log::debug!("session: {action:?} is disabled for {:?}", menu.target);
            return;
        }
        let intents = intents_for_action(action, &menu, connect_source.as_deref(), self.config.layout);
        self.apply_intents(intents);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::graph::overlay::test_support::{raw_edge, raw_graph, raw_node};
    use crate::services::transport::memory::InMemoryTransport;

    fn sources() -> Vec<RawGraph> {
        vec![
            raw_graph("g0", vec![raw_node("v", 0, 0.0, 0.0)], Vec::new()),
            raw_graph(
                "g1",
                vec![raw_node("a", 1, 100.0, 100.0), raw_node("b", 1, 200.0, 100.0)],
                vec![raw_edge("ab", "a", "b", 1)],
            ),
        ]
    }

    fn session_with(transport: &InMemoryTransport, config: EditorConfig) -> EditorSession {
        for source in sources() {
            transport.insert_graph(source);
        }
        let mut session = EditorSession::new(config, Arc::new(transport.clone())).unwrap();
        session.init(sources());
        session
    }

    fn active_session(transport: &InMemoryTransport) -> EditorSession {
        session_with(transport, EditorConfig::default())
    }

    #[tokio::test]
    async fn init_seeds_single_load_snapshot() {
        let transport = InMemoryTransport::new();
        let session = active_session(&transport);
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.primary_writable(), Some("g1"));
        assert_eq!(session.history().labels(), vec![LOAD_LABEL]);
        assert_eq!(session.graph().node_count(), 3);
    }

    #[tokio::test]
    async fn intents_before_init_are_ignored() {
        let transport = InMemoryTransport::new();
        let mut session = EditorSession::new(EditorConfig::default(), Arc::new(transport.clone())).unwrap();
        session.apply_intents([GraphIntent::SelectAll]);
        assert!(session.selection().is_empty());
    }

    #[tokio::test]
    async fn locked_node_is_never_moved_or_deleted() {
        let transport = InMemoryTransport::new();
        let mut session = active_session(&transport);
        let before = session.graph().get_node("v").cloned();
        session.apply_intents([
            GraphIntent::SetNodePosition {
                id: "v".into(),
                position: Point2D::new(9.0, 9.0),
                phase: DragPhase::Released,
            },
            GraphIntent::DeleteNode { id: "v".into() },
            GraphIntent::UpdateNodeProps {
                id: "v".into(),
                props: NodeProps::default(),
                weight: Some(0.1),
            },
        ]);
        assert_eq!(session.graph().get_node("v").cloned(), before);
        assert_eq!(session.history().len(), 1);
        session.settle(Instant::now()).await;
        assert!(transport.mutations().is_empty());
    }

    #[tokio::test]
    async fn drag_frames_are_transient_until_release() {
        let transport = InMemoryTransport::new();
        let mut session = active_session(&transport);
        for step in 1..=5 {
            session.apply_intents([GraphIntent::SetNodePosition {
                id: "a".into(),
                position: Point2D::new(100.0 + step as f32, 100.0),
                phase: DragPhase::Dragging,
            }]);
        }
        assert_eq!(session.history().len(), 1);
        session.apply_intents([GraphIntent::SetNodePosition {
            id: "a".into(),
            position: Point2D::new(150.0, 100.0),
            phase: DragPhase::Released,
        }]);
        assert_eq!(session.history().labels(), vec![LOAD_LABEL, "Move node"]);
        session.settle(Instant::now()).await;
        assert_eq!(transport.mutation_count("updateNode"), 1);
    }

    #[tokio::test]
    async fn delete_node_cascades_and_undo_restores() {
        let transport = InMemoryTransport::new();
        let mut session = active_session(&transport);
        session.apply_intents([GraphIntent::DeleteNode { id: "a".into() }]);
        assert!(!session.graph().contains_node("a"));
        assert!(!session.graph().contains_edge("ab"));

        session.apply_intents([GraphIntent::Undo]);
        assert!(session.graph().contains_node("a"));
        assert!(session.graph().contains_edge("ab"));
        session.apply_intents([GraphIntent::Redo]);
        assert!(!session.graph().contains_node("a"));
    }

    #[tokio::test]
    async fn create_node_inserts_server_identity_once() {
        let transport = InMemoryTransport::new();
        let mut session = active_session(&transport);
        session.apply_intents([GraphIntent::CreateNode {
            position: Point2D::new(10.0, 20.0),
            props: NodeProps::default(),
        }]);
        assert_eq!(session.graph().node_count(), 3, "creates wait for the server");
        session.settle(Instant::now()).await;

        assert_eq!(session.graph().node_count(), 4);
        let created = session
            .graph()
            .nodes()
            .find(|node| !["v", "a", "b"].contains(&node.id.as_str()))
            .unwrap();
        assert_eq!(created.origin, "g1");
        assert_eq!(created.position(), Point2D::new(10.0, 20.0));
        assert_eq!(session.history().labels(), vec![LOAD_LABEL, "Create node"]);
    }

    #[tokio::test]
    async fn transport_failure_is_reported_without_rollback() {
        let transport = InMemoryTransport::new();
        let mut session = active_session(&transport);
        transport.fail_next(TransportError::Unavailable("offline".into()));
        session.apply_intents([GraphIntent::DeleteNode { id: "b".into() }]);
        session.settle(Instant::now()).await;

        assert!(!session.graph().contains_node("b"));
        let errors: Vec<_> = session
            .take_notifications()
            .into_iter()
            .filter_map(|notification| match notification {
                EditorNotification::Error(error) => Some(error),
                _ => None,
            })
            .collect();
        assert_eq!(
            errors,
            vec![EditorError::Transport {
                operation: "deleteNode",
                source: TransportError::Unavailable("offline".into()),
            }]
        );
    }

    #[tokio::test]
    async fn edge_to_locked_node_is_refused() {
        let transport = InMemoryTransport::new();
        let mut session = active_session(&transport);
        session.apply_intents([GraphIntent::CreateEdge {
            from: "a".into(),
            to: "v".into(),
            props: EdgeProps::default(),
        }]);
        session.settle(Instant::now()).await;
        assert_eq!(session.graph().edge_count(), 1);
        assert_eq!(transport.mutation_count("createEdge"), 0);
    }

    #[tokio::test]
    async fn delete_selection_skips_locked_members() {
        let transport = InMemoryTransport::new();
        let mut session = active_session(&transport);
        session.apply_intents([GraphIntent::SelectAll, GraphIntent::DeleteSelection]);
        assert!(session.graph().contains_node("v"));
        assert_eq!(session.graph().node_count(), 1);
        assert_eq!(session.history().labels(), vec![LOAD_LABEL, "Delete selection"]);
        assert_eq!(session.selection().nodes(), ["v".to_string()]);
    }

    #[tokio::test]
    async fn paste_rewires_internal_edges() {
        let transport = InMemoryTransport::new();
        let mut session = active_session(&transport);
        session.apply_intents([
            GraphIntent::SelectNode {
                id: "a".into(),
                extend: false,
            },
            GraphIntent::SelectNode {
                id: "b".into(),
                extend: true,
            },
            GraphIntent::CopySelection,
            GraphIntent::Paste {
                at: Point2D::new(500.0, 500.0),
            },
        ]);
        session.settle(Instant::now()).await;

        assert_eq!(session.graph().node_count(), 5);
        assert_eq!(session.graph().edge_count(), 2);
        let pasted_edge = session.graph().edges().find(|edge| edge.id != "ab").unwrap();
        assert!(!["a", "b"].contains(&pasted_edge.from.as_str()));
        assert_eq!(session.history().labels(), vec![LOAD_LABEL, "Paste"]);
    }

    #[tokio::test]
    async fn read_only_session_refuses_every_write() {
        let transport = InMemoryTransport::new();
        let config = EditorConfig {
            read_only: true,
            ..EditorConfig::default()
        };
        let mut session = session_with(&transport, config);
        session.apply_intents([
            GraphIntent::DeleteNode { id: "a".into() },
            GraphIntent::CreateNode {
                position: Point2D::origin(),
                props: NodeProps::default(),
            },
            GraphIntent::DuplicateNode { id: "a".into() },
            GraphIntent::ApplyLayout(LayoutConfig::immediate()),
        ]);
        session.settle(Instant::now()).await;
        assert_eq!(session.graph().node_count(), 3);
        assert!(transport.mutations().is_empty());
    }

    #[tokio::test]
    async fn remote_delete_of_selected_node_clears_selection() {
        let transport = InMemoryTransport::new();
        let mut session = active_session(&transport);
        session.apply_intents([GraphIntent::SelectNode {
            id: "b".into(),
            extend: false,
        }]);
        session.take_notifications();
        transport.publish("g1", RemoteEvent::NodeDeleted { id: "b".into() });
        session.settle(Instant::now()).await;

        assert!(!session.graph().contains_node("b"));
        assert!(session.selection().is_empty());
        assert!(
            session
                .take_notifications()
                .contains(&EditorNotification::NodeSelected(None))
        );
    }

    #[tokio::test]
    async fn context_menu_dispatch_routes_and_returns_to_idle() {
        let transport = InMemoryTransport::new();
        let mut session = active_session(&transport);
        session.apply_intents([GraphIntent::OpenContextMenu {
            target: MenuTarget::Node("v".into()),
            screen: Point2D::origin(),
            canvas: Point2D::origin(),
        }]);
        let actions = session.context_actions();
        assert!(actions.contains(&ActionEntry {
            id: ActionId::NodeDelete,
            enabled: false
        }));

        session.apply_intents([GraphIntent::DispatchContextAction(ActionId::NodeDelete)]);
        assert!(!session.context_menu().is_open());
        assert!(session.graph().contains_node("v"));

        session.apply_intents([
            GraphIntent::OpenContextMenu {
                target: MenuTarget::Node("b".into()),
                screen: Point2D::origin(),
                canvas: Point2D::origin(),
            },
            GraphIntent::DispatchContextAction(ActionId::NodeDelete),
        ]);
        assert!(!session.graph().contains_node("b"));
        assert!(!session.context_menu().is_open());
    }

    #[tokio::test]
    async fn immediate_layout_commits_once_and_fits_view() {
        let transport = InMemoryTransport::new();
        let mut session = active_session(&transport);
        session.apply_intents([GraphIntent::ApplyLayout(LayoutConfig::immediate())]);
        assert_eq!(session.history().labels(), vec![LOAD_LABEL, "Apply layout"]);
        assert_eq!(session.graph().get_node("v").unwrap().position(), Point2D::new(0.0, 0.0));
        assert!(session.take_notifications().contains(&EditorNotification::FitToView));
        session.settle(Instant::now()).await;
        assert_eq!(transport.mutation_count("updateNode"), 2);
    }

    #[tokio::test]
    async fn new_layout_request_cancels_running_animation() {
        let transport = InMemoryTransport::new();
        let mut session = active_session(&transport);
        let start = Instant::now();
        session.apply_intents([GraphIntent::ApplyLayout(LayoutConfig::default())]);
        session.tick(start);
        session.tick(start + Duration::from_millis(100));
        assert!(session.is_animating());

        session.apply_intents([GraphIntent::ApplyLayout(LayoutConfig::immediate())]);
        assert!(!session.is_animating());
        assert_eq!(session.history().labels(), vec![LOAD_LABEL, "Apply layout"]);
        session.tick(start + Duration::from_millis(600));
        assert_eq!(session.history().labels(), vec![LOAD_LABEL, "Apply layout"]);

        session.apply_intents([GraphIntent::ApplyLayout(LayoutConfig::default())]);
        assert!(session.is_animating());
        session.set_layout_algorithm(|_: &[&Node], _: &[&Edge]| LayoutPositions::new());
        session.apply_intents([GraphIntent::ApplyLayout(LayoutConfig::default())]);
        assert!(!session.is_animating());
    }

    #[tokio::test]
    async fn commit_during_animation_records_settled_positions() {
        let transport = InMemoryTransport::new();
        let mut session = active_session(&transport);
        let start = Instant::now();
        session.apply_intents([GraphIntent::ApplyLayout(LayoutConfig::default())]);
        session.tick(start);
        session.tick(start + Duration::from_millis(250));
        assert_ne!(session.graph().get_node("a").unwrap().position(), Point2D::new(100.0, 100.0));

        session.apply_intents([GraphIntent::SetNodePosition {
            id: "b".into(),
            position: Point2D::new(10.0, 10.0),
            phase: DragPhase::Released,
        }]);
        session.tick(start + Duration::from_millis(500));
        assert!(!session.is_animating());
        assert_eq!(
            session.history().labels(),
            vec![LOAD_LABEL, "Move node", "Apply layout"]
        );
        assert_eq!(session.graph().get_node("b").unwrap().position(), Point2D::new(10.0, 10.0));

        session.apply_intents([GraphIntent::Undo]);
        assert_eq!(session.graph().get_node("a").unwrap().position(), Point2D::new(100.0, 100.0));
        assert_eq!(session.graph().get_node("b").unwrap().position(), Point2D::new(10.0, 10.0));
    }

    #[tokio::test]
    async fn select_all_reports_primary_node() {
        let transport = InMemoryTransport::new();
        let mut session = active_session(&transport);
        session.take_notifications();
        session.apply_intents([GraphIntent::SelectAll]);
        let primary = session.selection().primary_node().map(str::to_string);
        assert!(primary.is_some());
        let selected: Vec<_> = session
            .take_notifications()
            .into_iter()
            .filter_map(|notification| match notification {
                EditorNotification::NodeSelected(node) => Some(node.map(|node| node.id)),
                _ => None,
            })
            .collect();
        assert_eq!(selected, vec![primary]);
    }

    #[tokio::test]
    async fn node_pinned_by_verified_edge_is_not_deleted() {
        let transport = InMemoryTransport::new();
        let mut pinned = sources();
        pinned[1].edges.push(raw_edge("va", "v", "a", 0));
        for source in &pinned {
            transport.insert_graph(source.clone());
        }
        let mut session = EditorSession::new(EditorConfig::default(), Arc::new(transport.clone())).unwrap();
        session.init(pinned);
        assert!(session.graph().contains_edge("va"));

        session.apply_intents([GraphIntent::DeleteNode { id: "a".into() }]);
        assert!(session.graph().contains_node("a"));
        assert!(session.graph().contains_edge("va"));
        assert!(session.graph().contains_edge("ab"));
        assert_eq!(session.history().len(), 1);
        session.settle(Instant::now()).await;
        assert_eq!(transport.mutation_count("deleteNode"), 0);
    }

    #[tokio::test]
    async fn events_after_dispose_are_discarded() {
        let transport = InMemoryTransport::new();
        let mut session = active_session(&transport);
        session.dispose();
        transport.publish("g1", RemoteEvent::NodeDeleted { id: "a".into() });
        session.tick(Instant::now());
        assert!(session.graph().contains_node("a"));
        session.apply_intents([GraphIntent::DeleteNode { id: "a".into() }]);
        assert!(session.graph().contains_node("a"));
        session.shutdown().await;
    }
}
