//! Name-keyed extractor and validator registry.
//!
//! Callables are registered on a [`RegistryBuilder`] at startup. `build()`
//! consumes the builder and returns a [`Registry`] that has no mutation API,
//! so nothing can be registered once evaluation has begun. A `Registry` is
//! `Send + Sync` and can be shared across worker threads behind an `Arc`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::document::Document;
use crate::error::{EvalError, PluginError, RegistryError};
use crate::rules::RuleSet;

/// A value produced by an extractor, pending validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub value: String,
    /// Extractor-assigned confidence. Overrides the rule's declared confidence.
    pub confidence: Option<f64>,
}

impl Candidate {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Procedural extractor invoked by plugin rules.
///
/// Returning `Ok(None)` means "no candidate" and is treated exactly like a
/// pattern that did not match.
pub trait Extractor: Send + Sync {
    fn extract(&self, doc: &Document) -> Result<Option<Candidate>, PluginError>;
}

impl<F> Extractor for F
where
    F: Fn(&Document) -> Result<Option<Candidate>, PluginError> + Send + Sync,
{
    fn extract(&self, doc: &Document) -> Result<Option<Candidate>, PluginError> {
        self(doc)
    }
}

/// Accept/reject predicate over a candidate value.
pub trait Validator: Send + Sync {
    fn validate(&self, value: &str, doc: &Document) -> Result<bool, PluginError>;
}

impl<F> Validator for F
where
    F: Fn(&str, &Document) -> Result<bool, PluginError> + Send + Sync,
{
    fn validate(&self, value: &str, doc: &Document) -> Result<bool, PluginError> {
        self(value, doc)
    }
}

/// Mutable registration phase of a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    extractors: BTreeMap<String, Arc<dyn Extractor>>,
    validators: BTreeMap<String, Arc<dyn Validator>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extractor. Names are append-only: re-registering fails.
    pub fn register_extractor(
        &mut self,
        name: impl Into<String>,
        extractor: impl Extractor + 'static,
    ) -> Result<&mut Self, RegistryError> {
        let name = name.into();
        if self.extractors.contains_key(&name) {
            return Err(RegistryError::DuplicateExtractor(name));
        }
        self.extractors.insert(name, Arc::new(extractor));
        Ok(self)
    }

    /// Register a validator. Names are append-only: re-registering fails.
    pub fn register_validator(
        &mut self,
        name: impl Into<String>,
        validator: impl Validator + 'static,
    ) -> Result<&mut Self, RegistryError> {
        let name = name.into();
        if self.validators.contains_key(&name) {
            return Err(RegistryError::DuplicateValidator(name));
        }
        self.validators.insert(name, Arc::new(validator));
        Ok(self)
    }

    /// Freeze the registry.
    pub fn build(self) -> Registry {
        Registry {
            extractors: self.extractors,
            validators: self.validators,
        }
    }
}

/// Immutable extractor/validator lookup.
#[derive(Default, Clone)]
pub struct Registry {
    extractors: BTreeMap<String, Arc<dyn Extractor>>,
    validators: BTreeMap<String, Arc<dyn Validator>>,
}

impl Registry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn extractor(&self, name: &str) -> Result<&dyn Extractor, EvalError> {
        self.extractors
            .get(name)
            .map(|e| e.as_ref())
            .ok_or_else(|| EvalError::UnknownPlugin {
                name: name.to_string(),
            })
    }

    pub fn validator(&self, name: &str) -> Result<&dyn Validator, EvalError> {
        self.validators
            .get(name)
            .map(|v| v.as_ref())
            .ok_or_else(|| EvalError::UnknownValidator {
                name: name.to_string(),
            })
    }

    pub fn extractor_names(&self) -> impl Iterator<Item = &str> {
        self.extractors.keys().map(String::as_str)
    }

    pub fn validator_names(&self) -> impl Iterator<Item = &str> {
        self.validators.keys().map(String::as_str)
    }

    /// List rules whose plugin or validators are not registered.
    ///
    /// These rules still load; at evaluation time they are skipped with a
    /// resolution error in their trace entry.
    pub fn check(&self, rules: &RuleSet) -> Vec<RuleIssue> {
        let mut issues = Vec::new();

        for (index, rule) in rules.iter().enumerate() {
            if let Some(plugin) = rule.plugin_name() {
                if let Err(error) = self.extractor(plugin) {
                    issues.push(RuleIssue {
                        index,
                        rule: rule.name.clone(),
                        error,
                    });
                }
            }
            for name in &rule.validators {
                if let Err(error) = self.validator(name) {
                    issues.push(RuleIssue {
                        index,
                        rule: rule.name.clone(),
                        error,
                    });
                }
            }
        }

        issues
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("extractors", &self.extractors.keys().collect::<Vec<_>>())
            .field("validators", &self.validators.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A rule that references an unregistered callable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleIssue {
    pub index: usize,
    pub rule: String,
    pub error: EvalError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn always(_: &str, _: &Document) -> Result<bool, PluginError> {
        Ok(true)
    }

    #[test]
    fn test_register_and_resolve() {
        let mut builder = Registry::builder();
        builder
            .register_extractor("len", |doc: &Document| -> Result<Option<Candidate>, PluginError> {
                Ok(Some(Candidate::new(doc.text.len().to_string())))
            })
            .unwrap()
            .register_validator("always", always)
            .unwrap();
        let registry = builder.build();

        let doc = Document::from_text("hello");
        let candidate = registry.extractor("len").unwrap().extract(&doc).unwrap();
        assert_eq!(candidate, Some(Candidate::new("5")));
        assert!(registry.validator("always").unwrap().validate("x", &doc).unwrap());

        assert_eq!(registry.extractor_names().collect::<Vec<_>>(), vec!["len"]);
        assert_eq!(registry.validator_names().collect::<Vec<_>>(), vec!["always"]);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.register_validator("v", always).unwrap();
        let err = builder.register_validator("v", always).err();
        assert_eq!(err, Some(RegistryError::DuplicateValidator("v".to_string())));
    }

    #[test]
    fn test_unknown_names() {
        let registry = Registry::empty();
        assert_eq!(
            registry.extractor("missing").err(),
            Some(EvalError::UnknownPlugin {
                name: "missing".to_string()
            })
        );
        assert_eq!(
            registry.validator("missing").err(),
            Some(EvalError::UnknownValidator {
                name: "missing".to_string()
            })
        );
    }

    #[test]
    fn test_check_reports_unresolved_names() {
        let rules = RuleSet::from_yaml_str(
            "- {name: a, plugin: ghost}\n- {name: b, pattern: x, validators: [always, nope]}\n",
        )
        .unwrap();

        let mut builder = RegistryBuilder::new();
        builder.register_validator("always", always).unwrap();
        let issues = builder.build().check(&rules);

        assert_eq!(
            issues,
            vec![
                RuleIssue {
                    index: 0,
                    rule: "a".to_string(),
                    error: EvalError::UnknownPlugin {
                        name: "ghost".to_string()
                    },
                },
                RuleIssue {
                    index: 1,
                    rule: "b".to_string(),
                    error: EvalError::UnknownValidator {
                        name: "nope".to_string()
                    },
                },
            ]
        );
    }
}
