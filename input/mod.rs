/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Keyboard shortcuts for the editor.
//!
//! Pointer interaction (drag, right-click) arrives as intents from the host
//! renderer; only chords are mapped here.

use euclid::default::Point2D;
use keyboard_types::{Key, KeyState, KeyboardEvent, Modifiers, NamedKey};

use crate::app::GraphIntent;

/// Keyboard actions collected from a batch of key events.
///
/// This struct decouples input detection from action application (pure
/// state mutation), making actions testable.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeyboardActions {
    pub undo: bool,
    pub redo: bool,
    pub copy: bool,
    pub paste: bool,
    pub duplicate: bool,
    pub delete_selected: bool,
    pub select_all: bool,
    pub close_menu: bool,
}

/// Ctrl on most platforms, Cmd on macOS.
fn shortcut_held(modifiers: Modifiers) -> bool {
    modifiers.contains(Modifiers::CONTROL) || modifiers.contains(Modifiers::META)
}

fn is_char(key: &Key, expected: &str) -> bool {
    matches!(key, Key::Character(text) if text.eq_ignore_ascii_case(expected))
}

/// Collect keyboard actions from key-down events. Mutating chords are
/// ignored while `read_only` is set.
pub fn collect_actions(events: &[KeyboardEvent], read_only: bool) -> KeyboardActions {
    let mut actions = KeyboardActions::default();

    for event in events.iter().filter(|event| event.state == KeyState::Down) {
        let key = &event.key;
        let shortcut = shortcut_held(event.modifiers);
        let shift = event.modifiers.contains(Modifiers::SHIFT);

        // Escape always works.
        if matches!(key, Key::Named(NamedKey::Escape)) {
            actions.close_menu = true;
            continue;
        }

        if shortcut && is_char(key, "c") {
            actions.copy = true;
        }
        if shortcut && is_char(key, "a") {
            actions.select_all = true;
        }

        if read_only {
            continue;
        }

        if shortcut && is_char(key, "z") {
            if shift {
                actions.redo = true;
            } else {
                actions.undo = true;
            }
        }
        if shortcut && is_char(key, "y") {
            actions.redo = true;
        }
        if shortcut && is_char(key, "v") {
            actions.paste = true;
        }
        if shortcut && is_char(key, "d") {
            actions.duplicate = true;
        }
        if !shortcut && matches!(key, Key::Named(NamedKey::Delete | NamedKey::Backspace)) {
            actions.delete_selected = true;
        }
    }

    actions
}

/// Convert keyboard actions to graph intents without applying them.
///
/// `pointer` is the graph-space pointer position used as the paste anchor;
/// `primary_node` is the node a duplicate applies to.
pub fn intents_from_actions(
    actions: &KeyboardActions,
    pointer: Point2D<f32>,
    primary_node: Option<&str>,
) -> Vec<GraphIntent> {
    let mut intents = Vec::new();
    if actions.close_menu {
        intents.push(GraphIntent::CloseContextMenu);
    }
    if actions.select_all {
        intents.push(GraphIntent::SelectAll);
    }
    if actions.copy {
        intents.push(GraphIntent::CopySelection);
    }
    if actions.paste {
        intents.push(GraphIntent::Paste { at: pointer });
    }
    if actions.duplicate
        && let Some(id) = primary_node
    {
        intents.push(GraphIntent::DuplicateNode { id: id.to_string() });
    }
    if actions.delete_selected {
        intents.push(GraphIntent::DeleteSelection);
    }
    if actions.undo {
        intents.push(GraphIntent::Undo);
    }
    if actions.redo {
        intents.push(GraphIntent::Redo);
    }
    intents
}
