/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Session-local clipboard and duplication geometry.
//!
//! Copies are taken by value, so later edits or deletions of the originals
//! never change what a paste produces. Nothing here allocates identities:
//! pastes and duplicates are planned here and created through the transport.

use euclid::default::{Point2D, Vector2D};

use crate::graph::{EdgeProps, EntityId, Graph, Node, NodeProps};

/// Default offset applied to a duplicate, on both axes.
pub const DUPLICATE_OFFSET: f32 = 50.0;

/// A copied node. Weight is not carried: the create call takes a property
/// bag only, so a pasted copy starts at the server's default weight.
#[derive(Debug, Clone, PartialEq)]
pub struct CopiedNode {
    /// Identity of the original, used to rewire copied edges.
    pub source_id: EntityId,
    pub props: NodeProps,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CopiedEdge {
    pub source_id: EntityId,
    pub from: EntityId,
    pub to: EntityId,
    pub props: EdgeProps,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clipboard {
    nodes: Vec<CopiedNode>,
    edges: Vec<CopiedEdge>,
}

/// Nodes and edges a paste will create, positioned but not yet identified.
#[derive(Debug, Clone, PartialEq)]
pub struct PastePlan {
    pub nodes: Vec<CopiedNode>,
    /// Edges keep the *source* ids of their endpoints; the caller maps them
    /// to the identities the server assigns.
    pub edges: Vec<CopiedEdge>,
}

impl Clipboard {
    /// Capture `node_ids` (unknown ids are skipped). With `include_edges`,
    /// edges whose endpoints are both in the copied set come along.
    pub fn copy(graph: &Graph, node_ids: &[EntityId], include_edges: bool) -> Self {
        let nodes: Vec<CopiedNode> = node_ids
            .iter()
            .filter_map(|id| graph.get_node(id))
            .map(|node| CopiedNode {
                source_id: node.id.clone(),
                props: node.props.clone(),
            })
            .collect();

        let edges = if include_edges {
            let contains = |id: &str| nodes.iter().any(|node| node.source_id == id);
            graph
                .edges()
                .filter(|edge| contains(&edge.from) && contains(&edge.to))
                .map(|edge| CopiedEdge {
                    source_id: edge.id.clone(),
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    props: edge.props.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };

        log::debug!(
            "clipboard: copied {} node(s), {} edge(s)",
            nodes.len(),
            edges.len()
        );
        Self { nodes, edges }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[CopiedNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[CopiedEdge] {
        &self.edges
    }

    /// Mean position of the copied nodes.
    pub fn centroid(&self) -> Option<Point2D<f32>> {
        if self.nodes.is_empty() {
            return None;
        }
        let sum = self
            .nodes
            .iter()
            .map(|node| node.props.position.unwrap_or_else(Point2D::origin).to_vector())
            .fold(Vector2D::zero(), |acc, v| acc + v);
        Some((sum / self.nodes.len() as f32).to_point())
    }

    /// Plan a paste centered at `at`. Relative offsets from the centroid are
    /// kept and scaled by `spread`.
    pub fn paste_plan(&self, at: Point2D<f32>, spread: f32) -> Option<PastePlan> {
        let centroid = self.centroid()?;
        let nodes = self
            .nodes
            .iter()
            .map(|node| {
                let relative = node.props.position.unwrap_or(centroid) - centroid;
                let mut props = node.props.clone();
                props.position = Some(at + relative * spread);
                CopiedNode {
                    source_id: node.source_id.clone(),
                    props,
                }
            })
            .collect();
        Some(PastePlan {
            nodes,
            edges: self.edges.clone(),
        })
    }
}

/// Property bag of a duplicate of `source`: same content, shifted by
/// `offset` on both axes.
pub fn duplicate_props(source: &Node, offset: f32) -> NodeProps {
    let mut props = source.props.clone();
    props.position = Some(source.position() + Vector2D::new(offset, offset));
    props
}
