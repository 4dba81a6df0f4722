/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! ActionRegistry: action catalogue for the context menu.
//!
//! [`list_actions_for_context`] returns the actions for one menu target with
//! enabled/disabled state resolved through the lock rules, so the menu and
//! the dispatcher agree on what may run.

use crate::graph::lock::{can_connect, can_create, can_duplicate, can_mutate};
use crate::graph::{Edge, Node};

/// Logical grouping of actions, used for separators and ordering.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ActionCategory {
    Node,
    Edge,
    Canvas,
    History,
}

impl ActionCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::Node => "Node",
            Self::Edge => "Edge",
            Self::Canvas => "Canvas",
            Self::History => "History",
        }
    }
}

/// Stable identifier for a registered action.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum ActionId {
    // Node actions
    NodeCopy,
    NodeDuplicate,
    NodeConnectFromSelection,
    NodeDelete,
    // Edge actions
    EdgeSelect,
    EdgeDelete,
    // Canvas actions
    CanvasCreateNode,
    CanvasPaste,
    CanvasSelectAll,
    CanvasApplyLayout,
    CanvasFitView,
    // History actions
    HistoryUndo,
    HistoryRedo,
}

impl ActionId {
    pub fn label(self) -> &'static str {
        match self {
            Self::NodeCopy => "Copy",
            Self::NodeDuplicate => "Duplicate",
            Self::NodeConnectFromSelection => "Connect from Selected",
            Self::NodeDelete => "Delete Node",
            Self::EdgeSelect => "Select Edge",
            Self::EdgeDelete => "Delete Edge",
            Self::CanvasCreateNode => "Create Node Here",
            Self::CanvasPaste => "Paste Here",
            Self::CanvasSelectAll => "Select All",
            Self::CanvasApplyLayout => "Auto Layout",
            Self::CanvasFitView => "Fit to View",
            Self::HistoryUndo => "Undo",
            Self::HistoryRedo => "Redo",
        }
    }

    pub fn category(self) -> ActionCategory {
        match self {
            Self::NodeCopy
            | Self::NodeDuplicate
            | Self::NodeConnectFromSelection
            | Self::NodeDelete => ActionCategory::Node,
            Self::EdgeSelect | Self::EdgeDelete => ActionCategory::Edge,
            Self::CanvasCreateNode
            | Self::CanvasPaste
            | Self::CanvasSelectAll
            | Self::CanvasApplyLayout
            | Self::CanvasFitView => ActionCategory::Canvas,
            Self::HistoryUndo | Self::HistoryRedo => ActionCategory::History,
        }
    }
}

/// Entity a menu was opened on, resolved against the live graph.
#[derive(Clone, Copy, Debug)]
pub enum ActionTarget<'a> {
    Node(&'a Node),
    Edge(&'a Edge),
    Canvas,
}

/// Session state that decides enablement.
#[derive(Clone, Copy, Debug)]
pub struct ActionContext<'a> {
    /// `None` when the target no longer exists; every action is then omitted.
    pub target: Option<ActionTarget<'a>>,
    /// Primary selected node, the source of "connect from selected".
    pub connect_source: Option<&'a Node>,
    /// The node target has a locked incident edge, so it cannot be deleted.
    pub pinned_by_edge: bool,
    pub read_only: bool,
    pub writable_graph: Option<&'a str>,
    pub clipboard_filled: bool,
    pub can_undo: bool,
    pub can_redo: bool,
}

/// A single resolved action entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionEntry {
    pub id: ActionId,
    pub enabled: bool,
}

/// Actions for the context's target, enabled state pre-resolved. Disabled
/// actions are included so the menu can show them greyed out.
pub fn list_actions_for_context(context: &ActionContext<'_>) -> Vec<ActionEntry> {
    use ActionId::*;

    let creatable = can_create(context.read_only, context.writable_graph);
    let all: Vec<(ActionId, bool)> = match context.target {
        None => Vec::new(),
        Some(ActionTarget::Node(node)) => {
            let connectable = creatable
                && context
                    .connect_source
                    .is_some_and(|source| source.id != node.id && can_connect(source, node));
            vec![
                (NodeCopy, true),
                (
                    NodeDuplicate,
                    can_duplicate(node, context.read_only, context.writable_graph),
                ),
                (NodeConnectFromSelection, connectable),
                (NodeDelete, can_mutate(node, context.read_only) && !context.pinned_by_edge),
            ]
        },
        Some(ActionTarget::Edge(edge)) => vec![
            (EdgeSelect, true),
            (EdgeDelete, can_mutate(edge, context.read_only)),
        ],
        Some(ActionTarget::Canvas) => vec![
            (CanvasCreateNode, creatable),
            (CanvasPaste, creatable && context.clipboard_filled),
            (CanvasSelectAll, true),
            (CanvasApplyLayout, !context.read_only),
            (CanvasFitView, true),
            (HistoryUndo, !context.read_only && context.can_undo),
            (HistoryRedo, !context.read_only && context.can_redo),
        ],
    };

    all.into_iter()
        .map(|(id, enabled)| ActionEntry { id, enabled })
        .collect()
}

/// Whether `action` is listed and enabled for `context`.
pub fn is_action_enabled(context: &ActionContext<'_>, action: ActionId) -> bool {
    list_actions_for_context(context)
        .iter()
        .any(|entry| entry.id == action && entry.enabled)
}
