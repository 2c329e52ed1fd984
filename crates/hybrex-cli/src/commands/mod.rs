//! Subcommands and the loading helpers they share.

pub mod batch;
pub mod config;
pub mod extract;
pub mod rules;

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use hybrex_core::{Document, HybrexConfig, Registry, RuleSet};

/// Load the configuration from `-c`, else the default location, else defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<HybrexConfig> {
    if let Some(path) = config_path {
        return Ok(HybrexConfig::from_file(Path::new(path))?);
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        debug!("Using config from {}", default_path.display());
        Ok(HybrexConfig::from_file(&default_path)?)
    } else {
        Ok(HybrexConfig::default())
    }
}

/// Load the rule set named on the command line or in the config, and the
/// registry the config describes. Unresolved plugin and validator names are
/// logged, not fatal.
pub fn load_engine(
    rules_path: Option<&Path>,
    config: &HybrexConfig,
) -> anyhow::Result<(RuleSet, Registry)> {
    let rules_path = rules_path
        .or(config.rules.path.as_deref())
        .ok_or_else(|| anyhow::anyhow!("No rule file given. Use --rules or set rules.path in the config."))?;

    let rules = RuleSet::from_file(rules_path)?;
    let registry = config.registry()?;

    for issue in registry.check(&rules) {
        warn!("Rule #{} ({}): {}", issue.index, issue.rule, issue.error);
    }

    Ok((rules, registry))
}

/// Read an input document. `.json` files are parsed as documents; anything
/// else is read as plain text. The file stem becomes the document id when the
/// document has none.
pub fn load_document(path: &Path) -> anyhow::Result<Document> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let doc = if is_json {
        Document::from_file(path)?
    } else {
        Document::from_text(fs::read_to_string(path)?)
    };

    match (&doc.doc_id, path.file_stem().and_then(|s| s.to_str())) {
        (None, Some(stem)) => Ok(doc.with_id(stem)),
        _ => Ok(doc),
    }
}

pub fn to_json_string(value: &serde_json::Value, pretty: bool) -> anyhow::Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

/// Create the parent directory of an output file if needed.
pub fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
