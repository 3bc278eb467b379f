//! Configuration for diff and merge passes.

use serde::{Deserialize, Serialize};

use crate::error::{CurationError, Result};
use crate::model::{AnnotatorId, LayerKind, Schema, TextWindow};

/// Default identity of the curator's set.
pub const DEFAULT_CURATOR: &str = "CURATION_USER";

/// Which layers to compare and over which part of the text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Explicit allow-list of layers to diff.
    pub layers: Vec<String>,

    /// Text window; records must lie entirely inside it.
    #[serde(default)]
    pub window: TextWindow,
}

impl DiffConfig {
    /// Create a config with no layers over the whole document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer to the allow-list.
    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layers.push(layer.into());
        self
    }

    /// Set the allow-list.
    pub fn with_layers<I, S>(mut self, layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layers = layers.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict the pass to a window.
    pub fn with_window(mut self, window: TextWindow) -> Self {
        self.window = window;
        self
    }

    /// Check if a layer is on the allow-list.
    pub fn includes(&self, layer: &str) -> bool {
        self.layers.iter().any(|l| l == layer)
    }

    /// Check the allow-list against a schema.
    ///
    /// Unknown layers and chain layers are rejected.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        for name in &self.layers {
            let layer = schema.require(name)?;
            if layer.kind == LayerKind::Chain {
                return Err(CurationError::UnsupportedLayer {
                    layer: name.clone(),
                    kind: layer.kind.label().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Behavior of the merge engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Delete curator records at positions no annotator contributes to.
    pub prune_unmatched: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            prune_unmatched: true,
        }
    }
}

impl MergeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether curator-only records are pruned.
    pub fn with_prune_unmatched(mut self, prune: bool) -> Self {
        self.prune_unmatched = prune;
        self
    }
}

/// Configuration for a curation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurationConfig {
    /// Which set is curator-owned. Every other set is a contributor.
    pub curator: AnnotatorId,

    /// Diff configuration.
    pub diff: DiffConfig,

    /// Merge configuration.
    #[serde(default)]
    pub merge: MergeConfig,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            curator: AnnotatorId::from(DEFAULT_CURATOR),
            diff: DiffConfig::default(),
            merge: MergeConfig::default(),
        }
    }
}

impl CurationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the curator identity.
    pub fn with_curator(mut self, curator: impl Into<AnnotatorId>) -> Self {
        self.curator = curator.into();
        self
    }

    /// Set the diff configuration.
    pub fn with_diff(mut self, diff: DiffConfig) -> Self {
        self.diff = diff;
        self
    }

    /// Set the merge configuration.
    pub fn with_merge(mut self, merge: MergeConfig) -> Self {
        self.merge = merge;
        self
    }
}
