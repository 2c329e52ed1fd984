//! Folding rule emissions into the canonical per-document field map.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// One accepted rule result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Emission {
    pub output_field: String,
    pub value: String,
    pub confidence: Option<f64>,
    pub source_rule: String,
}

/// Canonical field map of one document.
///
/// Keys are kept sorted so that serialized output does not depend on hash
/// order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldMap {
    values: BTreeMap<String, String>,
    confidence: BTreeMap<String, f64>,
    sources: BTreeMap<String, String>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge emissions in evaluation order.
    pub fn merge<'a, I>(emissions: I) -> Self
    where
        I: IntoIterator<Item = &'a Emission>,
    {
        let mut map = Self::new();
        for emission in emissions {
            map.apply(emission);
        }
        map
    }

    /// Apply one emission. A later emission for the same field overwrites the
    /// value and replaces the confidence; an emission without confidence
    /// clears the previous one.
    pub fn apply(&mut self, emission: &Emission) {
        let field = &emission.output_field;
        self.values.insert(field.clone(), emission.value.clone());
        self.sources
            .insert(field.clone(), emission.source_rule.clone());

        match emission.confidence {
            Some(confidence) => {
                self.confidence.insert(field.clone(), confidence);
            }
            None => {
                self.confidence.remove(field);
            }
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    pub fn confidence(&self, field: &str) -> Option<f64> {
        self.confidence.get(field).copied()
    }

    /// Name of the rule whose emission currently holds the field.
    pub fn source(&self, field: &str) -> Option<&str> {
        self.sources.get(field).map(String::as_str)
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn confidences(&self) -> &BTreeMap<String, f64> {
        &self.confidence
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Flatten to a single JSON object.
    ///
    /// With `confidence_keys`, each field with a confidence also gets a
    /// `<field>_confidence` key, unless a field of that name was extracted.
    pub fn to_flat(&self, confidence_keys: bool) -> Map<String, Value> {
        let mut flat: Map<String, Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        if confidence_keys {
            for (field, confidence) in &self.confidence {
                let key = format!("{field}_confidence");
                if !self.values.contains_key(&key) {
                    flat.insert(key, Value::from(*confidence));
                }
            }
        }

        flat
    }
}
