//! Built-in extractors that do not need a machine readable zone.

use lazy_static::lazy_static;
use regex::Regex;

use crate::document::Document;
use crate::error::PluginError;
use crate::registry::{Candidate, Extractor};

/// Confidence given to keyword classification.
const KEYWORD_CONFIDENCE: f64 = 0.5;

/// Canonical document classes and the keywords that signal them, in
/// priority order.
pub const CANONICAL_DOCS: &[(&str, &[&str])] = &[
    ("passport", &["passport", "pass", "reiseausweis", "reisepass", "passeport", "passnummer"]),
    ("id_card", &["id card", "personalausweis", "ausweis"]),
    ("diploma", &["diploma", "degree", "zeugnis", "urkunde", "abschluss", "hochschule", "universität"]),
    ("transcript", &["transcript", "marksheet", "course list", "leistungsnachweis"]),
    ("license", &["license", "registration", "approbation", "zulassung"]),
    ("birth_certificate", &["birth", "geburtsurkunde"]),
    ("cv", &["cv", "lebenslauf", "curriculum vitae"]),
    ("language_b2", &["b2", "sprachzertifikat"]),
    ("language_b2_pflege", &["b2 pflege", "pflege b2"]),
    ("good_standing", &["good standing", "gsc"]),
    ("apostille", &["apostille", "legalization", "legalisation"]),
    ("certified_translation", &["translation", "übersetzung", "uebersetzung", "beglaubigt"]),
];

lazy_static! {
    static ref DOC_KEYWORDS: Vec<(&'static str, Regex)> = CANONICAL_DOCS
        .iter()
        .map(|(class, keywords)| {
            let alternatives: Vec<String> = keywords.iter().map(|k| regex::escape(k)).collect();
            let pattern = format!(r"(?i)\b(?:{})\b", alternatives.join("|"));
            (*class, Regex::new(&pattern).unwrap())
        })
        .collect();
}

/// Every canonical class whose keywords occur in the text, in table order.
pub fn doc_types(text: &str) -> Vec<&'static str> {
    DOC_KEYWORDS
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(class, _)| *class)
        .collect()
}

/// Highest-priority canonical class present in the text.
pub fn doc_type(text: &str) -> Option<&'static str> {
    DOC_KEYWORDS
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(class, _)| *class)
}

/// Emits the character count of the document text.
pub fn text_length(doc: &Document) -> Result<Option<Candidate>, PluginError> {
    Ok(Some(Candidate::new(doc.text.chars().count().to_string())))
}

/// Emits the keyword-based document class.
pub fn classify_document(doc: &Document) -> Result<Option<Candidate>, PluginError> {
    Ok(doc_type(&doc.text).map(|class| Candidate::new(class).with_confidence(KEYWORD_CONFIDENCE)))
}

/// Emits the text of all tokens carrying a layout label, joined in reading
/// order.
///
/// The candidate's confidence is the mean label score when every labeled
/// token has one.
#[derive(Debug, Clone)]
pub struct LabelHintExtractor {
    label: String,
}

impl LabelHintExtractor {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Extractor for LabelHintExtractor {
    fn extract(&self, doc: &Document) -> Result<Option<Candidate>, PluginError> {
        let tokens = doc.labeled(&self.label);
        if tokens.is_empty() {
            return Ok(None);
        }

        let value = tokens
            .iter()
            .map(|t| t.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if value.is_empty() {
            return Ok(None);
        }

        let scores: Option<Vec<f64>> = tokens.iter().map(|t| t.label_score).collect();
        let candidate = match scores {
            Some(scores) => {
                let mean = scores.iter().sum::<f64>() / scores.len() as f64;
                Candidate::new(value).with_confidence(mean)
            }
            None => Candidate::new(value),
        };

        Ok(Some(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Token;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_doc_type_priority() {
        assert_eq!(doc_type("Reisepass und Lebenslauf"), Some("passport"));
        assert_eq!(doc_type("Curriculum Vitae"), Some("cv"));
        assert_eq!(doc_type("Invoice 4821"), None);
    }

    #[test]
    fn test_doc_type_word_boundaries() {
        // "pass" must not match inside "compass"
        assert_eq!(doc_type("compass bearing"), None);
        assert_eq!(doc_types("Beglaubigte Übersetzung, Apostille"), vec!["apostille", "certified_translation"]);
    }

    #[test]
    fn test_classify_document_candidate() {
        let doc = Document::from_text("UNIVERSITÄT WIEN - Diploma");
        assert_eq!(
            classify_document(&doc).unwrap(),
            Some(Candidate::new("diploma").with_confidence(0.5))
        );
    }

    #[test]
    fn test_text_length_counts_chars() {
        let doc = Document::from_text("zł 10");
        assert_eq!(text_length(&doc).unwrap(), Some(Candidate::new("5")));
    }

    #[test]
    fn test_label_hint_extractor() {
        let tokens = vec![
            Token::new("Doe", 0, [60.0, 10.0, 90.0, 22.0]).with_label("NAME", Some(0.5)),
            Token::new("John", 0, [10.0, 10.0, 50.0, 22.0]).with_label("NAME", Some(1.0)),
            Token::new("Passport", 0, [10.0, 50.0, 80.0, 62.0]),
        ];
        let doc = Document::from_tokens(tokens);

        let candidate = LabelHintExtractor::new("NAME").extract(&doc).unwrap();
        assert_eq!(candidate, Some(Candidate::new("John Doe").with_confidence(0.75)));

        assert_eq!(LabelHintExtractor::new("DATE").extract(&doc).unwrap(), None);
    }

    #[test]
    fn test_label_hint_without_scores() {
        let tokens = vec![
            Token::new("12.01.2024", 0, [10.0, 10.0, 80.0, 22.0]).with_label("DATE", Some(0.9)),
            Token::new("r.", 0, [90.0, 10.0, 100.0, 22.0]).with_label("DATE", None),
        ];
        let doc = Document::from_tokens(tokens);

        let candidate = LabelHintExtractor::new("DATE").extract(&doc).unwrap();
        assert_eq!(candidate, Some(Candidate::new("12.01.2024 r.")));
    }
}
