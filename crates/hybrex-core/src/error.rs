//! Error types for the hybrex-core library.

use serde::Serialize;
use thiserror::Error;

/// Main error type for the hybrex library.
#[derive(Error, Debug)]
pub enum HybrexError {
    /// The rule set could not be loaded.
    #[error("rule set error: {0}")]
    Rules(#[from] MalformedRuleError),

    /// Plugin or validator registration failed.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document or output (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Load-time errors. Any of these rejects the whole rule set.
///
/// `index` is the zero-based position of the offending rule in the source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedRuleError {
    /// The source is not valid YAML.
    #[error("failed to parse rule set: {0}")]
    Syntax(String),

    /// The top level of the source is not a sequence.
    #[error("rule set must be a sequence of rules")]
    NotASequence,

    /// A rule has no `name`, `pattern` or `plugin` and cannot be identified.
    #[error("rule #{index}: has no name, pattern or plugin")]
    Unidentifiable { index: usize },

    /// `group` is not a non-negative integer.
    #[error("rule #{index} ({name}): group must be a non-negative integer, got {value}")]
    InvalidGroup {
        index: usize,
        name: String,
        value: String,
    },

    /// `confidence` is not a number in [0, 1].
    #[error("rule #{index} ({name}): confidence must be a number in [0, 1], got {value}")]
    InvalidConfidence {
        index: usize,
        name: String,
        value: String,
    },

    /// `flags` contains a modifier the matcher does not know.
    #[error("rule #{index} ({name}): unrecognized flag {flag:?}")]
    UnknownFlag {
        index: usize,
        name: String,
        flag: String,
    },

    /// The pattern does not compile.
    #[error("rule #{index} ({name}): invalid pattern: {reason}")]
    InvalidPattern {
        index: usize,
        name: String,
        reason: String,
    },

    /// The rule item is not a mapping, or a known key has the wrong type.
    #[error("rule #{index}: {reason}")]
    InvalidDefinition { index: usize, reason: String },
}

/// Errors raised while populating a [`RegistryBuilder`](crate::registry::RegistryBuilder).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// An extractor with this name is already registered.
    #[error("extractor already registered: {0}")]
    DuplicateExtractor(String),

    /// A validator with this name is already registered.
    #[error("validator already registered: {0}")]
    DuplicateValidator(String),
}

/// Evaluation-time errors. Each is scoped to a single rule and recorded in
/// its trace entry; none of them aborts the pass.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvalError {
    /// The rule names a plugin that is not registered.
    #[error("unknown plugin: {name}")]
    UnknownPlugin { name: String },

    /// The rule names a validator that is not registered.
    #[error("unknown validator: {name}")]
    UnknownValidator { name: String },

    /// The extractor returned an error or panicked.
    #[error("extractor {plugin} failed: {message}")]
    ExtractorRuntime { plugin: String, message: String },

    /// The validator returned an error or panicked.
    #[error("validator {validator} failed: {message}")]
    ValidatorRuntime { validator: String, message: String },
}

/// Error returned by extractor and validator callables.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct PluginError(pub String);

impl PluginError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result type for the hybrex library.
pub type Result<T> = std::result::Result<T, HybrexError>;
