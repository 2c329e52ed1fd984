//! Core library for hybrid rule-based field extraction.
//!
//! This crate provides:
//! - Declarative YAML rule sets (regex patterns and named plugin rules)
//! - A registry of procedural extractors and validators
//! - An ordered rule runner with per-rule debug trace
//! - Last-writer-wins merging of rule emissions into a field map
//! - Built-in validators (NIP, REGON, IBAN, dates, amounts) and MRZ extractors

pub mod builtins;
pub mod config;
pub mod document;
pub mod error;
pub mod merge;
pub mod registry;
pub mod rules;
pub mod runner;

pub use builtins::register_builtins;
pub use config::HybrexConfig;
pub use document::{Document, Token};
pub use error::{EvalError, HybrexError, MalformedRuleError, PluginError, RegistryError, Result};
pub use merge::{Emission, FieldMap};
pub use registry::{Candidate, Extractor, Registry, RegistryBuilder, RuleIssue, Validator};
pub use rules::{MatchFlags, Rule, RuleKind, RuleSet};
pub use runner::{Evaluation, Extraction, RuleRunner, TraceEntry, ValidatorOutcome};
