//! Rule runner: evaluates an ordered rule set against one document.
//!
//! Every rule sees the same read-only [`Document`]; no rule can observe
//! another rule's output. Rules are evaluated strictly in definition order and
//! each produces exactly one [`TraceEntry`], whatever the outcome.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::document::Document;
use crate::error::{EvalError, PluginError};
use crate::merge::{Emission, FieldMap};
use crate::registry::{Candidate, Extractor, Registry, Validator};
use crate::rules::{Rule, RuleKind, RuleSet};

/// Outcome of one validator call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatorOutcome {
    pub name: String,
    pub passed: bool,
}

/// Audit record for one rule in one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub rule_name: String,
    pub output_field: String,
    /// A pattern matched, or an extractor returned a candidate.
    pub matched: bool,
    /// Byte span of the match; pattern rules only.
    pub raw_match_span: Option<(usize, usize)>,
    pub candidate_value: Option<String>,
    pub confidence: Option<f64>,
    /// Validators attempted, in order, up to and including the first rejection.
    pub validators_applied: Vec<ValidatorOutcome>,
    pub final_accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EvalError>,
}

impl TraceEntry {
    fn new(rule: &Rule) -> Self {
        Self {
            rule_name: rule.name.clone(),
            output_field: rule.output_field().to_string(),
            matched: false,
            raw_match_span: None,
            candidate_value: None,
            confidence: None,
            validators_applied: Vec::new(),
            final_accepted: false,
            error: None,
        }
    }
}

/// Raw result of a pass: accepted emissions and the full trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evaluation {
    pub emissions: Vec<Emission>,
    pub trace: Vec<TraceEntry>,
}

/// Final per-document output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    pub fields: FieldMap,
    /// Present only when the runner was asked for debug output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<TraceEntry>>,
}

impl Extraction {
    /// Flat JSON: field values, optional `<field>_confidence` keys, and the
    /// trace under `__debug__` when present.
    pub fn to_json(&self, confidence_keys: bool) -> Value {
        let mut flat = self.fields.to_flat(confidence_keys);
        if let Some(trace) = &self.trace {
            let trace = serde_json::to_value(trace).unwrap_or(Value::Null);
            flat.insert("__debug__".to_string(), trace);
        }
        Value::Object(flat)
    }
}

/// Evaluates a rule set with callables from a registry.
///
/// Borrowing both lets many runners share one rule set and one registry
/// across threads.
pub struct RuleRunner<'a> {
    rules: &'a RuleSet,
    registry: &'a Registry,
    debug: bool,
}

impl<'a> RuleRunner<'a> {
    pub fn new(rules: &'a RuleSet, registry: &'a Registry) -> Self {
        Self {
            rules,
            registry,
            debug: false,
        }
    }

    /// Include the trace in [`Extraction`] output.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Evaluate and merge.
    pub fn run(&self, doc: &Document) -> Extraction {
        let evaluation = self.evaluate(doc);
        let fields = FieldMap::merge(&evaluation.emissions);

        Extraction {
            doc_id: doc.doc_id.clone(),
            fields,
            trace: self.debug.then_some(evaluation.trace),
        }
    }

    /// Evaluate every rule in order.
    pub fn evaluate(&self, doc: &Document) -> Evaluation {
        let start = Instant::now();
        info!(
            "Evaluating {} rules over {} characters, {} tokens",
            self.rules.len(),
            doc.text.len(),
            doc.tokens.len()
        );

        let mut evaluation = Evaluation::default();
        for rule in self.rules {
            let (entry, emission) = self.evaluate_rule(rule, doc);
            debug!(
                "Rule {}: matched={} accepted={} candidate={:?}",
                entry.rule_name, entry.matched, entry.final_accepted, entry.candidate_value
            );
            evaluation.trace.push(entry);
            evaluation.emissions.extend(emission);
        }

        debug!(
            "Evaluated {} rules, {} emissions in {:?}",
            evaluation.trace.len(),
            evaluation.emissions.len(),
            start.elapsed()
        );
        evaluation
    }

    fn evaluate_rule(&self, rule: &Rule, doc: &Document) -> (TraceEntry, Option<Emission>) {
        let mut entry = TraceEntry::new(rule);

        let (extractor, validators) = match self.resolve(rule) {
            Ok(resolved) => resolved,
            Err(error) => {
                warn!("Skipping rule {}: {}", rule.name, error);
                entry.error = Some(error);
                return (entry, None);
            }
        };

        let candidate = match (&rule.kind, extractor) {
            (Some(RuleKind::Pattern(pattern)), _) => {
                let Some(found) = pattern.find(&doc.text) else {
                    return (entry, None);
                };
                entry.matched = true;
                entry.raw_match_span = Some(found.span);
                found.value.map(|value| Candidate {
                    value,
                    confidence: rule.confidence,
                })
            }
            (Some(RuleKind::Plugin(plugin)), Some(extractor)) => {
                match guarded(|| extractor.extract(doc)) {
                    Ok(None) => return (entry, None),
                    Ok(Some(candidate)) => {
                        entry.matched = true;
                        Some(Candidate {
                            confidence: candidate.confidence.or(rule.confidence),
                            ..candidate
                        })
                    }
                    Err(message) => {
                        warn!("Extractor {} failed in rule {}: {}", plugin.plugin, rule.name, message);
                        entry.error = Some(EvalError::ExtractorRuntime {
                            plugin: plugin.plugin.clone(),
                            message,
                        });
                        return (entry, None);
                    }
                }
            }
            _ => return (entry, None),
        };

        let Some(candidate) = candidate else {
            return (entry, None);
        };
        entry.candidate_value = Some(candidate.value.clone());

        for (name, validator) in validators {
            let passed = match guarded(|| validator.validate(&candidate.value, doc)) {
                Ok(passed) => passed,
                Err(message) => {
                    warn!("Validator {} failed in rule {}: {}", name, rule.name, message);
                    entry.error = Some(EvalError::ValidatorRuntime {
                        validator: name.to_string(),
                        message,
                    });
                    false
                }
            };

            entry.validators_applied.push(ValidatorOutcome {
                name: name.to_string(),
                passed,
            });
            if !passed {
                return (entry, None);
            }
        }

        entry.final_accepted = true;
        entry.confidence = candidate.confidence;

        let emission = Emission {
            output_field: rule.output_field().to_string(),
            value: candidate.value,
            confidence: candidate.confidence,
            source_rule: rule.name.clone(),
        };
        (entry, Some(emission))
    }

    /// Look up the rule's plugin and validators before doing any work.
    #[allow(clippy::type_complexity)]
    fn resolve<'r>(
        &self,
        rule: &'r Rule,
    ) -> Result<(Option<&'a dyn Extractor>, Vec<(&'r str, &'a dyn Validator)>), EvalError> {
        let extractor = match rule.plugin_name() {
            Some(name) => Some(self.registry.extractor(name)?),
            None => None,
        };

        let validators = rule
            .validators
            .iter()
            .map(|name| self.registry.validator(name).map(|v| (name.as_str(), v)))
            .collect::<Result<Vec<_>, EvalError>>()?;

        Ok((extractor, validators))
    }
}

/// Run a plugin callable, turning both returned errors and panics into a
/// message.
fn guarded<T>(call: impl FnOnce() -> Result<T, PluginError>) -> Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(panic_message(&*payload)),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
