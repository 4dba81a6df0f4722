/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Merged graph data structures for the overlay editor.
//!
//! Core structures:
//! - `Graph`: merged node/edge collection backed by petgraph::StableGraph
//! - `Node` / `Edge`: entities tagged with their origin graph and provenance level
//! - `NodeProps` / `EdgeProps`: parsed property bags (label, position, metadata)
//!
//! Boundary: direct mutation methods are `pub(crate)`; everything outside the
//! crate goes through the session reducer so the lock guard cannot be skipped.

use euclid::default::Point2D;
use petgraph::Directed;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub mod lock;
pub mod overlay;
pub mod reconcile;

/// Stable node handle (petgraph NodeIndex, survives other deletions)
pub type NodeKey = NodeIndex;

/// Stable edge handle (petgraph EdgeIndex)
pub type EdgeKey = EdgeIndex;

/// Identifier of a source graph as used by the transport.
pub type GraphId = String;

/// Globally unique entity identity (node or edge).
pub type EntityId = String;

/// Provenance tier of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    /// Level 0: community-consensus content, immutable.
    Verified,
    /// Level 1: user-authored content, mutable.
    Editable,
}

impl Level {
    /// Decode the numeric level carried on the wire. Anything above 0 is editable.
    pub fn from_wire(level: u8) -> Self {
        if level == 0 {
            Self::Verified
        } else {
            Self::Editable
        }
    }

    pub fn as_wire(self) -> u8 {
        match self {
            Self::Verified => 0,
            Self::Editable => 1,
        }
    }
}

/// Visual discriminator assigned to every entity from its source's merge slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OriginColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl OriginColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `#rrggbb` form for renderers that take CSS-like colors.
    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Parsed node property bag.
///
/// `label` and `position` are lifted out of the JSON object; every other key
/// is preserved verbatim in `metadata` so a round-trip never loses data.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeProps {
    pub label: String,
    pub position: Option<Point2D<f32>>,
    pub metadata: Map<String, Value>,
}

impl Default for NodeProps {
    fn default() -> Self {
        Self {
            label: String::new(),
            position: None,
            metadata: Map::new(),
        }
    }
}

impl NodeProps {
    pub fn labeled(label: impl Into<String>, position: Point2D<f32>) -> Self {
        Self {
            label: label.into(),
            position: Some(position),
            metadata: Map::new(),
        }
    }

    /// Parse a wire property string. Returns `None` when the payload is not a
    /// JSON object; callers substitute defaults in that case.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Some(Self::default());
        }
        let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(trimmed) else {
            return None;
        };
        let label = match object.remove("label") {
            Some(Value::String(label)) => label,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let position = object.remove("position").and_then(|value| {
            let x = value.get("x")?.as_f64()?;
            let y = value.get("y")?.as_f64()?;
            Some(Point2D::new(x as f32, y as f32))
        });
        Some(Self {
            label,
            position,
            metadata: object,
        })
    }

    /// Parse a wire property string, falling back to defaults on malformed input.
    pub fn parse_or_default(raw: &str, entity_id: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|| {
            log::debug!("graph: malformed props on {entity_id}, using defaults");
            Self::default()
        })
    }

    pub fn to_value(&self) -> Value {
        let mut object = self.metadata.clone();
        object.insert("label".to_string(), Value::String(self.label.clone()));
        if let Some(position) = self.position {
            object.insert(
                "position".to_string(),
                serde_json::json!({ "x": position.x, "y": position.y }),
            );
        }
        Value::Object(object)
    }

    /// Serialize back to the wire string form.
    pub fn to_json_string(&self) -> String {
        self.to_value().to_string()
    }
}

/// Parsed edge property bag.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EdgeProps {
    pub label: String,
    pub metadata: Map<String, Value>,
}

impl EdgeProps {
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            metadata: Map::new(),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Some(Self::default());
        }
        let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(trimmed) else {
            return None;
        };
        let label = match object.remove("label") {
            Some(Value::String(label)) => label,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        Some(Self {
            label,
            metadata: object,
        })
    }

    pub fn parse_or_default(raw: &str, entity_id: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|| {
            log::debug!("graph: malformed props on edge {entity_id}, using defaults");
            Self::default()
        })
    }

    pub fn to_json_string(&self) -> String {
        let mut object = self.metadata.clone();
        object.insert("label".to_string(), Value::String(self.label.clone()));
        Value::Object(object).to_string()
    }
}

/// Clamp a confidence weight into `[0, 1]`; NaN becomes 0.
pub fn clamp_weight(weight: f32) -> f32 {
    if weight.is_nan() {
        0.0
    } else {
        weight.clamp(0.0, 1.0)
    }
}

/// A knowledge node in the merged graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Globally unique identity.
    pub id: EntityId,

    /// Source graph this node was merged from (or created into).
    pub origin: GraphId,

    /// Provenance tier; `Verified` nodes are locked.
    pub level: Level,

    /// Confidence weight in `[0, 1]`.
    pub weight: f32,

    pub props: NodeProps,

    /// Visual discriminator of `origin`.
    pub origin_color: OriginColor,
}

impl Node {
    /// Derived lock flag (`locked ⇔ level = Verified`).
    pub fn locked(&self) -> bool {
        self.level == Level::Verified
    }

    pub fn position(&self) -> Point2D<f32> {
        self.props.position.unwrap_or_else(Point2D::origin)
    }
}

/// A directed relation between two nodes in the merged graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EntityId,
    pub origin: GraphId,
    pub level: Level,
    pub weight: f32,
    /// Source node identity.
    pub from: EntityId,
    /// Target node identity.
    pub to: EntityId,
    pub props: EdgeProps,
    pub origin_color: OriginColor,
}

impl Edge {
    /// An edge's lock flag depends on its own level only, never its endpoints'.
    pub fn locked(&self) -> bool {
        self.level == Level::Verified
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.from == node_id || self.to == node_id
    }
}

/// Outcome of inserting a node by identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeInsert {
    Inserted(NodeKey),
    /// An entity with the same identity existed and was overwritten in place.
    Replaced(NodeKey),
}

/// Merged node/edge collection backed by petgraph::StableGraph.
///
/// Identity is the entity id string; petgraph keys are an internal detail
/// and are not stable across snapshot restores.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    inner: StableGraph<Node, Edge, Directed>,

    /// Stable node identity to key mapping.
    id_to_node: HashMap<EntityId, NodeKey>,

    /// Stable edge identity to key mapping.
    id_to_edge: HashMap<EntityId, EdgeKey>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from flat collections. Edges with a missing endpoint are skipped.
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut graph = Self::new();
        for node in nodes {
            graph.insert_node(node);
        }
        for edge in edges {
            if graph.insert_edge(edge).is_none() {
                log::debug!("graph: skipping dangling edge while rebuilding");
            }
        }
        graph
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.node_count() == 0 && self.edge_count() == 0
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.id_to_node.contains_key(id)
    }

    pub fn contains_edge(&self, id: &str) -> bool {
        self.id_to_edge.contains_key(id)
    }

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        let key = self.id_to_node.get(id)?;
        self.inner.node_weight(*key)
    }

    pub fn get_edge(&self, id: &str) -> Option<&Edge> {
        let key = self.id_to_edge.get(id)?;
        self.inner.edge_weight(*key)
    }

    pub(crate) fn get_node_mut(&mut self, id: &str) -> Option<&mut Node> {
        let key = self.id_to_node.get(id)?;
        self.inner.node_weight_mut(*key)
    }

    pub(crate) fn get_edge_mut(&mut self, id: &str) -> Option<&mut Edge> {
        let key = self.id_to_edge.get(id)?;
        self.inner.edge_weight_mut(*key)
    }

    /// Iterate nodes in stable insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.inner.node_indices().filter_map(|key| self.inner.node_weight(key))
    }

    /// Iterate edges in stable insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.inner.edge_indices().filter_map(|key| self.inner.edge_weight(key))
    }

    /// Edges incident to a node (either direction).
    pub fn incident_edges(&self, node_id: &str) -> Vec<&Edge> {
        let Some(&key) = self.id_to_node.get(node_id) else {
            return Vec::new();
        };
        let outgoing = self.inner.edges_directed(key, petgraph::Direction::Outgoing);
        let incoming = self.inner.edges_directed(key, petgraph::Direction::Incoming);
        outgoing
            .chain(incoming)
            .map(|edge_ref| edge_ref.weight())
            .collect()
    }

    /// Insert a node; an existing node with the same id is overwritten in
    /// place so its edges stay attached (last write wins).
    pub(crate) fn insert_node(&mut self, node: Node) -> NodeInsert {
        if let Some(&key) = self.id_to_node.get(&node.id)
            && let Some(existing) = self.inner.node_weight_mut(key)
        {
            *existing = node;
            return NodeInsert::Replaced(key);
        }
        let id = node.id.clone();
        let key = self.inner.add_node(node);
        self.id_to_node.insert(id, key);
        NodeInsert::Inserted(key)
    }

    /// Insert an edge. Returns `None` (and inserts nothing) when either
    /// endpoint is absent. An existing edge with the same id is replaced.
    pub(crate) fn insert_edge(&mut self, edge: Edge) -> Option<EdgeKey> {
        let from = *self.id_to_node.get(&edge.from)?;
        let to = *self.id_to_node.get(&edge.to)?;
        if let Some(old_key) = self.id_to_edge.remove(&edge.id) {
            self.inner.remove_edge(old_key);
        }
        let id = edge.id.clone();
        let key = self.inner.add_edge(from, to, edge);
        self.id_to_edge.insert(id, key);
        Some(key)
    }

    /// Remove a node and cascade-remove every edge touching it.
    /// Returns the removed node and the cascaded edges.
    pub(crate) fn remove_node(&mut self, id: &str) -> Option<(Node, Vec<Edge>)> {
        let key = self.id_to_node.remove(id)?;
        let incident: Vec<EdgeKey> = self
            .inner
            .edges_directed(key, petgraph::Direction::Outgoing)
            .chain(self.inner.edges_directed(key, petgraph::Direction::Incoming))
            .map(|edge_ref| edge_ref.id())
            .collect();
        let mut cascaded = Vec::with_capacity(incident.len());
        for edge_key in incident {
            if let Some(edge) = self.inner.remove_edge(edge_key) {
                self.id_to_edge.remove(&edge.id);
                cascaded.push(edge);
            }
        }
        let node = self.inner.remove_node(key)?;
        Some((node, cascaded))
    }

    pub(crate) fn remove_edge(&mut self, id: &str) -> Option<Edge> {
        let key = self.id_to_edge.remove(id)?;
        self.inner.remove_edge(key)
    }

    /// Move a node. Returns `false` if the node does not exist.
    pub(crate) fn set_node_position(&mut self, id: &str, position: Point2D<f32>) -> bool {
        match self.get_node_mut(id) {
            Some(node) => {
                node.props.position = Some(position);
                true
            },
            None => false,
        }
    }

    /// Flat owned copies of all nodes and edges.
    pub fn to_parts(&self) -> (Vec<Node>, Vec<Edge>) {
        (self.nodes().cloned().collect(), self.edges().cloned().collect())
    }

    /// Current position of every node, keyed by id.
    pub fn positions(&self) -> HashMap<EntityId, Point2D<f32>> {
        self.nodes()
            .map(|node| (node.id.clone(), node.position()))
            .collect()
    }
}

/// Structural equality by identity and content, ignoring petgraph keys.
impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        if self.node_count() != other.node_count() || self.edge_count() != other.edge_count() {
            return false;
        }
        self.nodes()
            .all(|node| other.get_node(&node.id).is_some_and(|theirs| theirs == node))
            && self
                .edges()
                .all(|edge| other.get_edge(&edge.id).is_some_and(|theirs| theirs == edge))
    }
}
