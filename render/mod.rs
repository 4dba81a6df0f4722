/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Renderer-facing command surfaces. Drawing itself belongs to the host.

pub mod action_registry;
pub mod context_menu;

pub use action_registry::{ActionCategory, ActionEntry, ActionId};
pub use context_menu::{ContextMenu, ContextMenuState, MenuTarget, OpenMenu};
