/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Context-menu state machine: `Idle -> Open -> Idle`.
//!
//! Opening captures the target and pointer coordinates. Dispatch and
//! cancellation both return to `Idle`; only dispatch produces intents.

use euclid::default::Point2D;

use super::action_registry::ActionId;
use crate::app::GraphIntent;
use crate::graph::{EdgeProps, EntityId, NodeProps};
use crate::layout::LayoutConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuTarget {
    Node(EntityId),
    Edge(EntityId),
    Canvas,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenMenu {
    pub target: MenuTarget,
    /// Pointer position in screen space, for placing the menu.
    pub screen: Point2D<f32>,
    /// Pointer position in graph space, for create and paste.
    pub canvas: Point2D<f32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ContextMenuState {
    #[default]
    Idle,
    Open(OpenMenu),
}

#[derive(Debug, Clone, Default)]
pub struct ContextMenu {
    state: ContextMenuState,
}

impl ContextMenu {
    pub fn state(&self) -> &ContextMenuState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, ContextMenuState::Open(_))
    }

    pub fn open_menu(&self) -> Option<&OpenMenu> {
        match &self.state {
            ContextMenuState::Open(menu) => Some(menu),
            ContextMenuState::Idle => None,
        }
    }

    /// Secondary activation. Opening over an open menu retargets it.
    pub fn open(&mut self, target: MenuTarget, screen: Point2D<f32>, canvas: Point2D<f32>) {
        self.state = ContextMenuState::Open(OpenMenu {
            target,
            screen,
            canvas,
        });
    }

    /// Outside click or escape. Returns whether a menu was open.
    pub fn close(&mut self) -> bool {
        matches!(
            std::mem::take(&mut self.state),
            ContextMenuState::Open(_)
        )
    }

    /// Leave `Open` for dispatch. The menu is `Idle` afterwards whatever the
    /// caller does with the returned target.
    pub fn take_for_dispatch(&mut self) -> Option<OpenMenu> {
        match std::mem::take(&mut self.state) {
            ContextMenuState::Open(menu) => Some(menu),
            ContextMenuState::Idle => None,
        }
    }
}

/// Intents an accepted action expands to.
pub fn intents_for_action(
    action: ActionId,
    menu: &OpenMenu,
    connect_source: Option<&str>,
    layout: LayoutConfig,
) -> Vec<GraphIntent> {
    let target_id = match &menu.target {
        MenuTarget::Node(id) | MenuTarget::Edge(id) => Some(id.clone()),
        MenuTarget::Canvas => None,
    };
    match (action, target_id) {
        (ActionId::NodeCopy, Some(id)) => vec![
            GraphIntent::SelectNode { id, extend: false },
            GraphIntent::CopySelection,
        ],
        (ActionId::NodeDuplicate, Some(id)) => vec![GraphIntent::DuplicateNode { id }],
        (ActionId::NodeConnectFromSelection, Some(id)) => connect_source
            .map(|from| GraphIntent::CreateEdge {
                from: from.to_string(),
                to: id,
                props: EdgeProps::default(),
            })
            .into_iter()
            .collect(),
        (ActionId::NodeDelete, Some(id)) => vec![GraphIntent::DeleteNode { id }],
        (ActionId::EdgeSelect, Some(id)) => vec![GraphIntent::SelectEdge { id, extend: false }],
        (ActionId::EdgeDelete, Some(id)) => vec![GraphIntent::DeleteEdge { id }],
        (ActionId::CanvasCreateNode, _) => vec![GraphIntent::CreateNode {
            position: menu.canvas,
            props: NodeProps::default(),
        }],
        (ActionId::CanvasPaste, _) => vec![GraphIntent::Paste { at: menu.canvas }],
        (ActionId::CanvasSelectAll, _) => vec![GraphIntent::SelectAll],
        (ActionId::CanvasApplyLayout, _) => vec![GraphIntent::ApplyLayout(layout)],
        (ActionId::CanvasFitView, _) => vec![GraphIntent::RequestFitToView],
        (ActionId::HistoryUndo, _) => vec![GraphIntent::Undo],
        (ActionId::HistoryRedo, _) => vec![GraphIntent::Redo],
        (action, None) => {
            log::debug!("context_menu: {action:?} needs an entity target");
            Vec::new()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_on(target: MenuTarget) -> OpenMenu {
        OpenMenu {
            target,
            screen: Point2D::new(10.0, 20.0),
            canvas: Point2D::new(300.0, 200.0),
        }
    }

    #[test]
    fn open_then_dispatch_returns_to_idle() {
        let mut menu = ContextMenu::default();
        menu.open(MenuTarget::Node("a".into()), Point2D::new(1.0, 2.0), Point2D::new(3.0, 4.0));
        assert!(menu.is_open());
        let taken = menu.take_for_dispatch().unwrap();
        assert_eq!(taken.target, MenuTarget::Node("a".into()));
        assert_eq!(menu.state(), &ContextMenuState::Idle);
        assert!(menu.take_for_dispatch().is_none());
    }

    #[test]
    fn close_reports_whether_menu_was_open() {
        let mut menu = ContextMenu::default();
        assert!(!menu.close());
        menu.open(MenuTarget::Canvas, Point2D::origin(), Point2D::origin());
        assert!(menu.close());
        assert!(!menu.is_open());
    }

    #[test]
    fn reopening_retargets() {
        let mut menu = ContextMenu::default();
        menu.open(MenuTarget::Canvas, Point2D::origin(), Point2D::origin());
        menu.open(MenuTarget::Edge("e".into()), Point2D::origin(), Point2D::origin());
        assert_eq!(menu.open_menu().unwrap().target, MenuTarget::Edge("e".into()));
    }

    #[test]
    fn canvas_actions_use_graph_space_pointer() {
        let menu = open_on(MenuTarget::Canvas);
        let intents = intents_for_action(ActionId::CanvasPaste, &menu, None, LayoutConfig::default());
        assert_eq!(intents, vec![GraphIntent::Paste { at: Point2D::new(300.0, 200.0) }]);
    }

    #[test]
    fn connect_without_source_yields_nothing() {
        let menu = open_on(MenuTarget::Node("t".into()));
        assert!(
            intents_for_action(ActionId::NodeConnectFromSelection, &menu, None, LayoutConfig::default())
                .is_empty()
        );
        let intents = intents_for_action(
            ActionId::NodeConnectFromSelection,
            &menu,
            Some("s"),
            LayoutConfig::default(),
        );
        assert!(matches!(
            &intents[..],
            [GraphIntent::CreateEdge { from, to, .. }] if from == "s" && to == "t"
        ));
    }

    #[test]
    fn entity_actions_on_canvas_are_ignored() {
        let menu = open_on(MenuTarget::Canvas);
        assert!(intents_for_action(ActionId::NodeDelete, &menu, None, LayoutConfig::default()).is_empty());
    }
}
