//! Configuration structures for the extraction engine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::builtins::extractors::LabelHintExtractor;
use crate::builtins::register_builtins;
use crate::error::{HybrexError, Result};
use crate::registry::{Registry, RegistryBuilder};

/// Main configuration for hybrex.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybrexConfig {
    /// Rule set configuration.
    pub rules: RulesConfig,

    /// Output formatting.
    pub output: OutputConfig,

    /// Batch processing.
    pub batch: BatchConfig,

    /// Extractor and validator registration.
    pub plugins: PluginConfig,
}

/// Rule set configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Rule file used when none is given on the command line.
    pub path: Option<PathBuf>,
}

/// Output formatting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Attach the per-rule trace under `__debug__`.
    pub debug: bool,

    /// Emit `<field>_confidence` keys next to fields that carry a confidence.
    pub confidence_keys: bool,

    /// Pretty-print JSON output.
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            debug: false,
            confidence_keys: true,
            pretty: true,
        }
    }
}

/// Batch processing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of documents evaluated concurrently.
    pub jobs: usize,

    /// Keep going when a document cannot be loaded or written.
    pub continue_on_error: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            jobs: 4,
            continue_on_error: false,
        }
    }
}

/// Extractor and validator registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Register the built-in extractors and validators.
    pub builtins: bool,

    /// Extra extractors: registry name to the layout label whose tokens it
    /// joins.
    pub label_hints: BTreeMap<String, String>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            builtins: true,
            label_hints: BTreeMap::new(),
        }
    }
}

impl HybrexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| HybrexError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Build the registry described by the `plugins` section.
    pub fn registry(&self) -> Result<Registry> {
        let mut builder = RegistryBuilder::new();
        if self.plugins.builtins {
            register_builtins(&mut builder)?;
        }
        for (name, label) in &self.plugins.label_hints {
            builder.register_extractor(name.clone(), LabelHintExtractor::new(label.clone()))?;
        }
        Ok(builder.build())
    }
}
