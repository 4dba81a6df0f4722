/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Overlay store: merges independently fetched source graphs into one
//! [`Graph`].
//!
//! Every source owns a slot whose position in the configured list decides
//! its origin color and whether it can become the primary writable graph.
//! Sources may arrive in any order; identities colliding across sources are
//! resolved by merge order (the source merged last wins).

use euclid::default::Point2D;
use rand::Rng;

use super::{
    Edge, EdgeProps, Graph, GraphId, Level, Node, NodeInsert, NodeProps, OriginColor,
    clamp_weight,
};
use crate::error::ConfigError;
use crate::services::transport::types::{EdgeRecord, NodeRecord, RawGraph};

/// Hard cap on the number of simultaneously merged sources.
pub const MAX_MERGED_GRAPHS: usize = 5;

/// Extent of the random placement used for nodes without a stored position.
pub const RANDOM_PLACEMENT_EXTENT: (f32, f32) = (800.0, 600.0);

const ORIGIN_PALETTE: [OriginColor; MAX_MERGED_GRAPHS] = [
    OriginColor::new(0x3b, 0x82, 0xf6),
    OriginColor::new(0x10, 0xb9, 0x81),
    OriginColor::new(0xf5, 0x9e, 0x0b),
    OriginColor::new(0xef, 0x44, 0x44),
    OriginColor::new(0x8b, 0x5c, 0xf6),
];

/// Origin color of the source at `slot` in merge order.
pub fn origin_color_for_slot(slot: usize) -> OriginColor {
    ORIGIN_PALETTE[slot % ORIGIN_PALETTE.len()]
}

/// Diagnostics collected while merging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Edge ids dropped because an endpoint was not in the merged node set.
    pub dangling_edges: Vec<String>,
    /// Entity ids that overwrote an entity from an earlier source.
    pub overridden: Vec<String>,
    /// Source ids refused because the cap was reached.
    pub skipped_sources: Vec<GraphId>,
    /// Entity ids whose property bag could not be parsed.
    pub malformed_props: Vec<String>,
}

impl MergeReport {
    fn absorb(&mut self, other: MergeReport) {
        self.dangling_edges.extend(other.dangling_edges);
        self.overridden.extend(other.overridden);
        self.skipped_sources.extend(other.skipped_sources);
        self.malformed_props.extend(other.malformed_props);
    }
}

/// Result of [`merge_sources`].
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub graph: Graph,
    pub primary_writable: Option<GraphId>,
    pub report: MergeReport,
}

#[derive(Debug, Clone)]
struct SourceSlot {
    graph_id: GraphId,
    name: String,
    /// `None` until the source has been merged.
    level: Option<Level>,
}

/// Ordered source slots plus the derived primary writable graph.
#[derive(Debug, Clone, Default)]
pub struct OverlayStore {
    slots: Vec<SourceSlot>,
}

impl OverlayStore {
    /// Pre-register the configured source order so colors are stable even
    /// when sources load out of order.
    pub fn with_graph_ids(graph_ids: &[GraphId]) -> Result<Self, ConfigError> {
        if graph_ids.len() > MAX_MERGED_GRAPHS {
            return Err(ConfigError::TooManyGraphs {
                count: graph_ids.len(),
                max: MAX_MERGED_GRAPHS,
            });
        }
        let mut store = Self::default();
        for graph_id in graph_ids {
            if graph_id.is_empty() {
                return Err(ConfigError::EmptyGraphId);
            }
            if store.slot_of(graph_id).is_some() {
                return Err(ConfigError::DuplicateGraphId(graph_id.clone()));
            }
            store.slots.push(SourceSlot {
                graph_id: graph_id.clone(),
                name: String::new(),
                level: None,
            });
        }
        Ok(store)
    }

    pub fn graph_ids(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.graph_id.as_str())
    }

    pub fn source_name(&self, graph_id: &str) -> Option<&str> {
        self.slot_of(graph_id)
            .map(|slot| self.slots[slot].name.as_str())
    }

    pub fn is_loaded(&self, graph_id: &str) -> bool {
        self.slot_of(graph_id)
            .is_some_and(|slot| self.slots[slot].level.is_some())
    }

    fn slot_of(&self, graph_id: &str) -> Option<usize> {
        self.slots.iter().position(|slot| slot.graph_id == graph_id)
    }

    /// Origin color for a known source.
    pub fn origin_color(&self, graph_id: &str) -> Option<OriginColor> {
        self.slot_of(graph_id).map(origin_color_for_slot)
    }

    /// First editable source in slot order; `None` disables creation.
    pub fn primary_writable(&self) -> Option<&str> {
        self.slots
            .iter()
            .find(|slot| slot.level == Some(Level::Editable))
            .map(|slot| slot.graph_id.as_str())
    }

    /// Merge one fetched source into `graph`, placing unpositioned nodes at
    /// random within [`RANDOM_PLACEMENT_EXTENT`].
    pub fn ingest(&mut self, graph: &mut Graph, raw: RawGraph) -> MergeReport {
        self.ingest_with_rng(graph, raw, &mut rand::thread_rng())
    }

    pub fn ingest_with_rng<R: Rng + ?Sized>(
        &mut self,
        graph: &mut Graph,
        raw: RawGraph,
        rng: &mut R,
    ) -> MergeReport {
        let mut report = MergeReport::default();
        let slot = match self.slot_of(&raw.id) {
            Some(slot) => slot,
            None if self.slots.len() >= MAX_MERGED_GRAPHS => {
                log::warn!(
                    "overlay: refusing source {} (cap of {MAX_MERGED_GRAPHS} reached)",
                    raw.id
                );
                report.skipped_sources.push(raw.id);
                return report;
            },
            None => {
                self.slots.push(SourceSlot {
                    graph_id: raw.id.clone(),
                    name: String::new(),
                    level: None,
                });
                self.slots.len() - 1
            },
        };

        let color = origin_color_for_slot(slot);
        let level = source_level(&raw);
        self.slots[slot].level = Some(level);
        self.slots[slot].name = raw.name.clone();

        for record in &raw.nodes {
            let (node, malformed) = node_from_record(record, &raw.id, color, rng);
            if malformed {
                report.malformed_props.push(record.id.clone());
            }
            if let NodeInsert::Replaced(_) = graph.insert_node(node) {
                report.overridden.push(record.id.clone());
            }
        }

        for record in &raw.edges {
            let (edge, malformed) = edge_from_record(record, &raw.id, color);
            if malformed {
                report.malformed_props.push(record.id.clone());
            }
            let replaced = graph.contains_edge(&record.id);
            if graph.insert_edge(edge).is_none() {
                log::warn!(
                    "overlay: dropping dangling edge {} ({} -> {}) from {}",
                    record.id,
                    record.from.id,
                    record.to.id,
                    raw.id
                );
                report.dangling_edges.push(record.id.clone());
            } else if replaced {
                report.overridden.push(record.id.clone());
            }
        }

        log::debug!(
            "overlay: merged {} into slot {slot} ({:?}, {} nodes, {} edges)",
            raw.id,
            level,
            raw.nodes.len(),
            raw.edges.len()
        );
        report
    }
}

/// Provenance of a whole source: the explicit graph level when present,
/// otherwise verified only if it has nodes and all of them are verified.
fn source_level(raw: &RawGraph) -> Level {
    if let Some(level) = raw.level {
        return Level::from_wire(level);
    }
    let all_verified =
        !raw.nodes.is_empty() && raw.nodes.iter().all(|node| node.level == 0);
    if all_verified {
        Level::Verified
    } else {
        Level::Editable
    }
}

fn random_position<R: Rng + ?Sized>(rng: &mut R) -> Point2D<f32> {
    let (width, height) = RANDOM_PLACEMENT_EXTENT;
    Point2D::new(rng.gen_range(0.0..width), rng.gen_range(0.0..height))
}

/// Convert a wire node record into a merged node. Returns `true` in the
/// second slot when the property bag was malformed and replaced by defaults.
pub(crate) fn node_from_record<R: Rng + ?Sized>(
    record: &NodeRecord,
    origin: &str,
    color: OriginColor,
    rng: &mut R,
) -> (Node, bool) {
    let parsed = NodeProps::parse(&record.props);
    let malformed = parsed.is_none();
    let mut props = parsed.unwrap_or_else(|| {
        log::debug!("overlay: malformed props on node {}, using defaults", record.id);
        NodeProps::default()
    });
    if props.position.is_none() {
        props.position = Some(random_position(rng));
    }
    let node = Node {
        id: record.id.clone(),
        origin: record.graph_id.clone().unwrap_or_else(|| origin.to_string()),
        level: Level::from_wire(record.level),
        weight: clamp_weight(record.weight),
        props,
        origin_color: color,
    };
    (node, malformed)
}

pub(crate) fn edge_from_record(record: &EdgeRecord, origin: &str, color: OriginColor) -> (Edge, bool) {
    let parsed = EdgeProps::parse(&record.props);
    let malformed = parsed.is_none();
    let edge = Edge {
        id: record.id.clone(),
        origin: record.graph_id.clone().unwrap_or_else(|| origin.to_string()),
        level: Level::from_wire(record.level),
        weight: clamp_weight(record.weight),
        from: record.from.id.clone(),
        to: record.to.id.clone(),
        props: parsed.unwrap_or_default(),
        origin_color: color,
    };
    (edge, malformed)
}

/// Merge an ordered list of sources in one pass.
///
/// Origin colors and the primary writable graph depend only on each
/// source's position in `sources`. Sources past [`MAX_MERGED_GRAPHS`] are
/// skipped and reported.
pub fn merge_sources(sources: Vec<RawGraph>) -> MergeOutcome {
    merge_sources_with_rng(sources, &mut rand::thread_rng())
}

pub fn merge_sources_with_rng<R: Rng + ?Sized>(sources: Vec<RawGraph>, rng: &mut R) -> MergeOutcome {
    let mut store = OverlayStore::default();
    let mut graph = Graph::new();
    let mut report = MergeReport::default();
    for raw in sources {
        report.absorb(store.ingest_with_rng(&mut graph, raw, rng));
    }
    MergeOutcome {
        graph,
        primary_writable: store.primary_writable().map(str::to_string),
        report,
    }
}
