/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Error taxonomy for the editor engine.
//!
//! Only transport failures and source-load failures ever leave the session
//! (through [`crate::app::EditorNotification::Error`]). Malformed property
//! bags, writes against locked entities and dangling edge references are
//! recovered locally and only logged.

use thiserror::Error;

use crate::graph::GraphId;

/// Failure reported by the transport collaborator for a single round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("entity not found: {0}")]
    NotFound(String),

    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Invalid editor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{count} graphs requested, at most {max} can be merged")]
    TooManyGraphs { count: usize, max: usize },

    #[error("graph id {0:?} is listed more than once")]
    DuplicateGraphId(GraphId),

    #[error("graph ids must not be empty")]
    EmptyGraphId,

    #[error("history limit must be at least 1")]
    InvalidHistoryLimit,

    #[error("failed to parse editor config: {0}")]
    Parse(String),
}

/// Errors surfaced through the session's `onError` channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("{operation} failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("failed to load graph {graph_id}: {source}")]
    SourceLoad {
        graph_id: GraphId,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
