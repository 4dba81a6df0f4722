/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Overlay editor engine for layered knowledge graphs.
//!
//! Several source graphs are merged into one working graph with per-entity
//! provenance. Verified entities are locked; new work lands in the first
//! editable source. Local edits apply immediately and are persisted through
//! a [`GraphTransport`]; remote changes arrive over subscriptions and are
//! reconciled into the same graph. [`EditorSession`] is the entry point.

pub mod app;
pub mod config;
pub mod error;
pub mod graph;
pub mod history;
pub mod input;
pub mod layout;
pub mod render;
pub mod runtime;
pub mod services;

pub use app::{DragPhase, EditorNotification, EditorSession, GraphIntent, SelectionState, SessionState};
pub use config::EditorConfig;
pub use error::{ConfigError, EditorError, TransportError};
pub use graph::overlay::{MAX_MERGED_GRAPHS, MergeOutcome, MergeReport, merge_sources};
pub use graph::{Edge, EdgeProps, EntityId, Graph, GraphId, Level, Node, NodeProps, OriginColor};
pub use history::EditHistory;
pub use layout::{CircularLayout, LayoutAlgorithm, LayoutConfig, LayoutPositions};
pub use services::transport::memory::InMemoryTransport;
pub use services::transport::{
    EdgeRecord, GraphTransport, MutationRequest, NodeRecord, RawGraph, RecordRef, RemoteEvent,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
