//! Rule definitions and rule-set loading.
//!
//! A rule set is a YAML sequence of rule mappings. Evaluation order is the
//! order of that sequence, so loading never reorders or deduplicates.
//!
//! ```yaml
//! - name: invoice_number
//!   pattern: 'invoice\s*#\s*(\d+)'
//!   flags: i
//!   group: 1
//!   confidence: 0.9
//!   validators: [non_empty]
//! - name: passport_number
//!   plugin: mrz_parser
//! ```

use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde_yaml::{Mapping, Value};
use tracing::{info, warn};

use crate::error::MalformedRuleError;

type LoadResult<T> = std::result::Result<T, MalformedRuleError>;

/// Matching-mode modifiers for a pattern rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchFlags {
    /// `i` / `ignorecase`
    pub case_insensitive: bool,
    /// `m` / `multiline`: `^` and `$` match at line boundaries.
    pub multi_line: bool,
    /// `s` / `dotall`: `.` matches `\n`.
    pub dot_matches_new_line: bool,
    /// `x` / `verbose`: whitespace and `#` comments in the pattern are ignored.
    pub verbose: bool,
}

impl MatchFlags {
    /// Apply a single modifier token. Returns `false` if the token is unknown.
    ///
    /// A token is either a long name (`multiline`) or a run of single-letter
    /// modifiers (`ims`), case-insensitively.
    fn apply(&mut self, token: &str) -> bool {
        match token.to_ascii_lowercase().as_str() {
            "ignorecase" | "case_insensitive" => self.case_insensitive = true,
            "multiline" | "multi_line" => self.multi_line = true,
            "dotall" | "dot_matches_new_line" => self.dot_matches_new_line = true,
            "verbose" => self.verbose = true,
            letters => {
                let mut next = *self;
                for ch in letters.chars() {
                    match ch {
                        'i' => next.case_insensitive = true,
                        'm' => next.multi_line = true,
                        's' => next.dot_matches_new_line = true,
                        'x' => next.verbose = true,
                        _ => return false,
                    }
                }
                *self = next;
            }
        }
        true
    }

    /// Parse a whole flags string such as `"IM"`, `"i, s"` or `"multiline"`.
    pub fn parse(source: &str) -> std::result::Result<Self, String> {
        let mut flags = Self::default();
        for token in source
            .split(|c: char| c == ',' || c == '|' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            if !flags.apply(token) {
                return Err(token.to_string());
            }
        }
        Ok(flags)
    }
}

/// Result of running a pattern rule over a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// Byte span of the requested group, or of the whole match when the group
    /// is absent.
    pub span: (usize, usize),
    /// Text of the requested group; `None` if the group does not exist or did
    /// not participate in the match.
    pub value: Option<String>,
}

/// Body of a pattern rule.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub pattern: String,
    pub group: usize,
    pub flags: MatchFlags,
    regex: Regex,
}

impl PatternRule {
    /// Compile a pattern with the given flags.
    pub fn new(
        pattern: impl Into<String>,
        group: usize,
        flags: MatchFlags,
    ) -> std::result::Result<Self, regex::Error> {
        let pattern = pattern.into();
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(flags.case_insensitive)
            .multi_line(flags.multi_line)
            .dot_matches_new_line(flags.dot_matches_new_line)
            .ignore_whitespace(flags.verbose)
            .build()?;

        Ok(Self {
            pattern,
            group,
            flags,
            regex,
        })
    }

    /// Find the first match in `text`, scanning left to right.
    pub fn find(&self, text: &str) -> Option<PatternMatch> {
        let caps = self.regex.captures(text)?;
        let whole = caps.get(0)?;

        Some(match caps.get(self.group) {
            Some(group) => PatternMatch {
                span: (group.start(), group.end()),
                value: Some(group.as_str().to_string()),
            },
            None => PatternMatch {
                span: (whole.start(), whole.end()),
                value: None,
            },
        })
    }
}

/// Body of a plugin rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRule {
    /// Registered extractor name.
    pub plugin: String,
}

/// What a rule does when evaluated.
#[derive(Debug, Clone)]
pub enum RuleKind {
    Pattern(PatternRule),
    Plugin(PluginRule),
}

/// One declarative extraction rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    /// `None` for an inert rule, which never matches.
    pub kind: Option<RuleKind>,
    pub output_field: Option<String>,
    pub confidence: Option<f64>,
    /// Validator names, applied in order.
    pub validators: Vec<String>,
}

impl Rule {
    /// Create a rule with neither a pattern nor a plugin.
    pub fn inert(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            output_field: None,
            confidence: None,
            validators: Vec::new(),
        }
    }

    pub fn pattern(name: impl Into<String>, pattern: PatternRule) -> Self {
        Self {
            kind: Some(RuleKind::Pattern(pattern)),
            ..Self::inert(name)
        }
    }

    pub fn plugin(name: impl Into<String>, plugin: impl Into<String>) -> Self {
        Self {
            kind: Some(RuleKind::Plugin(PluginRule {
                plugin: plugin.into(),
            })),
            ..Self::inert(name)
        }
    }

    pub fn with_output_field(mut self, field: impl Into<String>) -> Self {
        self.output_field = Some(field.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_validators<I, S>(mut self, validators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.validators = validators.into_iter().map(Into::into).collect();
        self
    }

    /// Destination field: `output_field`, falling back to the rule name.
    pub fn output_field(&self) -> &str {
        self.output_field.as_deref().unwrap_or(&self.name)
    }

    pub fn is_inert(&self) -> bool {
        self.kind.is_none()
    }

    /// Name of the plugin this rule dispatches to, if any.
    pub fn plugin_name(&self) -> Option<&str> {
        match &self.kind {
            Some(RuleKind::Plugin(p)) => Some(&p.plugin),
            _ => None,
        }
    }
}

/// An ordered collection of rules loaded from one source.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Parse a rule set from YAML.
    ///
    /// An empty or null document is an empty rule set. Any malformed rule
    /// rejects the whole set.
    pub fn from_yaml_str(source: &str) -> LoadResult<Self> {
        let root: Value = serde_yaml::from_str(source)
            .map_err(|e| MalformedRuleError::Syntax(e.to_string()))?;

        let items = match root {
            Value::Null => return Ok(Self::default()),
            Value::Sequence(items) => items,
            _ => return Err(MalformedRuleError::NotASequence),
        };

        let rules = items
            .iter()
            .enumerate()
            .map(|(index, item)| parse_rule(index, item))
            .collect::<LoadResult<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// Load a rule set from a YAML file.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let rule_set = Self::from_yaml_str(&content)?;
        info!("Loaded {} rules from {}", rule_set.len(), path.display());
        Ok(rule_set)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

fn parse_rule(index: usize, item: &Value) -> LoadResult<Rule> {
    let map = item
        .as_mapping()
        .ok_or_else(|| MalformedRuleError::InvalidDefinition {
            index,
            reason: format!("rule must be a mapping, got {}", describe(item)),
        })?;

    let pattern = opt_string(map, "pattern", index)?.filter(|p| !p.is_empty());
    let plugin = opt_string(map, "plugin", index)?.filter(|p| !p.is_empty());
    let name = match opt_string(map, "name", index)? {
        Some(name) => name,
        None if pattern.is_none() && plugin.is_none() => {
            return Err(MalformedRuleError::Unidentifiable { index });
        }
        None => format!("rule_{index}"),
    };

    let group = match map.get("group") {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) if n.as_u64().is_some() => {
            usize::try_from(n.as_u64().unwrap_or_default()).map_err(|_| {
                MalformedRuleError::InvalidGroup {
                    index,
                    name: name.clone(),
                    value: n.to_string(),
                }
            })?
        }
        Some(other) => {
            return Err(MalformedRuleError::InvalidGroup {
                index,
                name,
                value: describe(other),
            });
        }
    };

    let confidence = match map.get("confidence") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n))
            if n.as_f64().is_some_and(|c| (0.0..=1.0).contains(&c)) =>
        {
            n.as_f64()
        }
        Some(other) => {
            return Err(MalformedRuleError::InvalidConfidence {
                index,
                name,
                value: describe(other),
            });
        }
    };

    let flags = parse_flags(map.get("flags"), index, &name)?;
    let validators = parse_validators(map.get("validators"), index)?;
    let output_field = opt_string(map, "output_field", index)?.filter(|f| !f.is_empty());

    let kind = match (pattern, plugin) {
        (pattern, Some(plugin)) => {
            if pattern.is_some() {
                warn!(
                    "Rule {} declares both a pattern and a plugin; using plugin {}",
                    name, plugin
                );
            }
            Some(RuleKind::Plugin(PluginRule { plugin }))
        }
        (Some(pattern), None) => {
            let compiled = PatternRule::new(pattern, group, flags).map_err(|e| {
                MalformedRuleError::InvalidPattern {
                    index,
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            Some(RuleKind::Pattern(compiled))
        }
        (None, None) => None,
    };

    Ok(Rule {
        name,
        kind,
        output_field,
        confidence,
        validators,
    })
}

fn opt_string(map: &Mapping, key: &str, index: usize) -> LoadResult<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(MalformedRuleError::InvalidDefinition {
            index,
            reason: format!("{key} must be a string, got {}", describe(other)),
        }),
    }
}

fn parse_flags(value: Option<&Value>, index: usize, name: &str) -> LoadResult<MatchFlags> {
    let unknown = |flag: String| MalformedRuleError::UnknownFlag {
        index,
        name: name.to_string(),
        flag,
    };

    match value {
        None | Some(Value::Null) => Ok(MatchFlags::default()),
        Some(Value::String(s)) => MatchFlags::parse(s).map_err(unknown),
        Some(Value::Sequence(items)) => {
            let mut flags = MatchFlags::default();
            for item in items {
                let token = item.as_str().ok_or_else(|| unknown(describe(item)))?;
                if !flags.apply(token) {
                    return Err(unknown(token.to_string()));
                }
            }
            Ok(flags)
        }
        Some(other) => Err(unknown(describe(other))),
    }
}

fn parse_validators(value: Option<&Value>, index: usize) -> LoadResult<Vec<String>> {
    let invalid = |got: &Value| MalformedRuleError::InvalidDefinition {
        index,
        reason: format!("validators must be a list of names, got {}", describe(got)),
    };

    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(|| invalid(item)))
            .collect(),
        Some(other) => Err(invalid(other)),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("{s:?}"),
        Value::Sequence(_) => "a sequence".to_string(),
        Value::Mapping(_) => "a mapping".to_string(),
        Value::Tagged(_) => "a tagged value".to_string(),
    }
}
