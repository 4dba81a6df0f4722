/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Off-frame machinery driven by the session tick: the async transport
//! bridge and the save debouncer.

pub(crate) mod control_panel;
pub mod save_debounce;
