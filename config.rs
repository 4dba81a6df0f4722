/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Editor configuration surface.
//!
//! Loadable from TOML; every field has a default so hosts only write what
//! they change.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::graph::GraphId;
use crate::graph::overlay::MAX_MERGED_GRAPHS;
use crate::history::MAX_HISTORY_DEPTH;
use crate::layout::LayoutConfig;
use crate::runtime::save_debounce::DEFAULT_SAVE_DEBOUNCE;
use crate::services::clipboard::DUPLICATE_OFFSET;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    /// Session-wide write lock. Selection, copy and camera actions still work.
    pub read_only: bool,
    /// Ordered source graphs; position decides origin color and the
    /// primary writable graph.
    pub graph_ids: Vec<GraphId>,
    /// Opaque passthrough for the host.
    pub methodology_id: Option<String>,
    pub show_minimap: bool,
    pub show_controls: bool,
    pub show_background: bool,
    pub history_limit: usize,
    pub save_debounce_ms: u64,
    pub duplicate_offset: f32,
    /// Scale applied to relative offsets of pasted nodes.
    pub paste_spread: f32,
    pub layout: LayoutConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            read_only: false,
            graph_ids: Vec::new(),
            methodology_id: None,
            show_minimap: true,
            show_controls: true,
            show_background: true,
            history_limit: MAX_HISTORY_DEPTH,
            save_debounce_ms: DEFAULT_SAVE_DEBOUNCE.as_millis() as u64,
            duplicate_offset: DUPLICATE_OFFSET,
            paste_spread: 1.0,
            layout: LayoutConfig::default(),
        }
    }
}

impl EditorConfig {
    pub fn with_graph_ids<I, S>(graph_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<GraphId>,
    {
        Self {
            graph_ids: graph_ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|error| ConfigError::Parse(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.graph_ids.len() > MAX_MERGED_GRAPHS {
            return Err(ConfigError::TooManyGraphs {
                count: self.graph_ids.len(),
                max: MAX_MERGED_GRAPHS,
            });
        }
        let mut seen = HashSet::new();
        for graph_id in &self.graph_ids {
            if graph_id.is_empty() {
                return Err(ConfigError::EmptyGraphId);
            }
            if !seen.insert(graph_id.as_str()) {
                return Err(ConfigError::DuplicateGraphId(graph_id.clone()));
            }
        }
        if self.history_limit == 0 {
            return Err(ConfigError::InvalidHistoryLimit);
        }
        Ok(())
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = EditorConfig::from_toml_str("").unwrap();
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.save_debounce(), Duration::from_millis(500));
    }

    #[test]
    fn toml_overrides_and_nested_layout() {
        let config = EditorConfig::from_toml_str(
            r#"
            read_only = true
            graph_ids = ["g0", "g1"]
            methodology_id = "scientific"

            [layout]
            animated = false
            "#,
        )
        .unwrap();
        assert!(config.read_only);
        assert_eq!(config.graph_ids, vec!["g0".to_string(), "g1".to_string()]);
        assert!(!config.layout.animated);
        assert_eq!(config.layout.animation_duration_ms, 500);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = EditorConfig::from_toml_str("colour = \"red\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn graph_id_list_is_validated() {
        let too_many = EditorConfig::with_graph_ids(["a", "b", "c", "d", "e", "f"]);
        assert_eq!(
            too_many.validate(),
            Err(ConfigError::TooManyGraphs { count: 6, max: 5 })
        );
        let duplicated = EditorConfig::with_graph_ids(["a", "a"]);
        assert_eq!(
            duplicated.validate(),
            Err(ConfigError::DuplicateGraphId("a".into()))
        );
        let zero_history = EditorConfig {
            history_limit: 0,
            ..EditorConfig::default()
        };
        assert_eq!(zero_history.validate(), Err(ConfigError::InvalidHistoryLimit));
    }
}
