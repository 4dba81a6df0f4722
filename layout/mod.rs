/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Layout transitions.
//!
//! A [`LayoutAlgorithm`] is a pure function from the merged node/edge set to
//! target positions. The [`LayoutController`] interpolates live positions
//! toward those targets frame by frame; it never writes the graph itself.
//! The session applies each frame as a transient update and commits only
//! the finished transition.

use std::collections::HashMap;
use std::f32::consts::TAU;
use std::time::{Duration, Instant};

use euclid::default::Point2D;
use serde::{Deserialize, Serialize};

use crate::graph::{Edge, EntityId, Graph, Node};

pub mod easing;

pub type LayoutPositions = HashMap<EntityId, Point2D<f32>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    pub animated: bool,
    pub animation_duration_ms: u64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            animated: true,
            animation_duration_ms: 500,
        }
    }
}

impl LayoutConfig {
    pub fn immediate() -> Self {
        Self {
            animated: false,
            ..Self::default()
        }
    }

    pub fn animation_duration(&self) -> Duration {
        Duration::from_millis(self.animation_duration_ms)
    }
}

/// External layout function. Must be pure: same input, same output.
pub trait LayoutAlgorithm: Send + Sync {
    fn compute(&self, nodes: &[&Node], edges: &[&Edge]) -> LayoutPositions;
}

impl<F> LayoutAlgorithm for F
where
    F: Fn(&[&Node], &[&Edge]) -> LayoutPositions + Send + Sync,
{
    fn compute(&self, nodes: &[&Node], edges: &[&Edge]) -> LayoutPositions {
        self(nodes, edges)
    }
}

/// Places nodes evenly on a circle, in the order given.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularLayout {
    pub center: Point2D<f32>,
    pub min_radius: f32,
    /// Arc length reserved per node; grows the radius for large graphs.
    pub spacing: f32,
}

impl Default for CircularLayout {
    fn default() -> Self {
        Self {
            center: Point2D::new(400.0, 300.0),
            min_radius: 100.0,
            spacing: 80.0,
        }
    }
}

impl LayoutAlgorithm for CircularLayout {
    fn compute(&self, nodes: &[&Node], _edges: &[&Edge]) -> LayoutPositions {
        let count = nodes.len();
        if count == 0 {
            return LayoutPositions::new();
        }
        let radius = (count as f32 * self.spacing / TAU).max(self.min_radius);
        nodes
            .iter()
            .enumerate()
            .map(|(index, node)| {
                let angle = TAU * index as f32 / count as f32;
                let position = Point2D::new(
                    self.center.x + radius * angle.cos(),
                    self.center.y + radius * angle.sin(),
                );
                (node.id.clone(), position)
            })
            .collect()
    }
}

/// Run `algorithm` over the whole graph and keep only targets the session
/// may apply: known, unlocked nodes with finite coordinates.
pub fn plan_targets(graph: &Graph, algorithm: &dyn LayoutAlgorithm) -> LayoutPositions {
    let nodes: Vec<&Node> = graph.nodes().collect();
    let edges: Vec<&Edge> = graph.edges().collect();
    let mut targets = algorithm.compute(&nodes, &edges);
    targets.retain(|id, position| {
        position.x.is_finite()
            && position.y.is_finite()
            && graph.get_node(id).is_some_and(|node| !node.locked())
    });
    targets
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionId(u64);

#[derive(Debug, Clone)]
struct Transition {
    id: TransitionId,
    from: LayoutPositions,
    to: LayoutPositions,
    duration: Duration,
    /// Set by the first frame, so a transition starts when it is first drawn.
    started_at: Option<Instant>,
}

/// One interpolation step, sorted by node id.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutFrame {
    pub id: TransitionId,
    pub positions: Vec<(EntityId, Point2D<f32>)>,
    /// The last frame carries the exact targets.
    pub finished: bool,
}

#[derive(Debug, Default)]
pub struct LayoutController {
    next_id: u64,
    active: Option<Transition>,
}

impl LayoutController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a transition, superseding any in-flight one. Nodes missing from
    /// `from` start at their target.
    pub fn begin(
        &mut self,
        from: LayoutPositions,
        to: LayoutPositions,
        duration: Duration,
    ) -> TransitionId {
        if let Some(previous) = self.cancel() {
            log::debug!("layout: transition {previous:?} superseded");
        }
        self.next_id += 1;
        let id = TransitionId(self.next_id);
        log::debug!(
            "layout: transition {id:?} begins ({} nodes over {duration:?})",
            to.len()
        );
        self.active = Some(Transition {
            id,
            from,
            to,
            duration,
            started_at: None,
        });
        id
    }

    pub fn advance(&mut self, now: Instant) -> Option<LayoutFrame> {
        let transition = self.active.as_mut()?;
        let started_at = *transition.started_at.get_or_insert(now);
        let progress = if transition.duration.is_zero() {
            1.0
        } else {
            now.saturating_duration_since(started_at).as_secs_f32()
                / transition.duration.as_secs_f32()
        };
        let finished = progress >= 1.0;
        let eased = easing::ease_in_out_cubic(progress);

        let mut positions: Vec<(EntityId, Point2D<f32>)> = transition
            .to
            .iter()
            .map(|(id, &target)| {
                let position = if finished {
                    target
                } else {
                    let start = transition.from.get(id).copied().unwrap_or(target);
                    easing::lerp(start, target, eased)
                };
                (id.clone(), position)
            })
            .collect();
        positions.sort_by(|a, b| a.0.cmp(&b.0));

        let id = transition.id;
        if finished {
            self.active = None;
            log::debug!("layout: transition {id:?} finished");
        }
        Some(LayoutFrame {
            id,
            positions,
            finished,
        })
    }

    /// Drop the in-flight transition without a final frame.
    pub fn cancel(&mut self) -> Option<TransitionId> {
        self.active.take().map(|transition| transition.id)
    }

    pub fn is_animating(&self) -> bool {
        self.active.is_some()
    }

    /// Positions the running transition started from. Frames are transient,
    /// so these are the last committed positions of the animated nodes.
    pub fn start_positions(&self) -> Option<&LayoutPositions> {
        self.active.as_ref().map(|transition| &transition.from)
    }

    /// Stop animating `id`; later frames leave it where it is. Returns
    /// whether the node was part of the running transition.
    pub fn release(&mut self, id: &str) -> bool {
        let Some(transition) = self.active.as_mut() else {
            return false;
        };
        transition.from.remove(id);
        transition.to.remove(id).is_some()
    }

    pub fn active_id(&self) -> Option<TransitionId> {
        self.active.as_ref().map(|transition| transition.id)
    }
}
