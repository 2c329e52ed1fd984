//! Document model consumed by the rule engine: full text plus positioned tokens.

use std::cmp::Ordering;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A positioned text token produced by OCR or a layout model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Recognized text content.
    pub text: String,

    /// Zero-based page index.
    #[serde(default)]
    pub page: u32,

    /// Axis-aligned bounding box (x0, y0, x1, y1) in page pixels.
    #[serde(default)]
    pub bbox: [f32; 4],

    /// OCR recognition confidence (0.0 - 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conf: Option<f64>,

    /// Label hint assigned by a layout model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Score of the label hint (0.0 - 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_score: Option<f64>,
}

impl Token {
    pub fn new(text: impl Into<String>, page: u32, bbox: [f32; 4]) -> Self {
        Self {
            text: text.into(),
            page,
            bbox,
            conf: None,
            label: None,
            label_score: None,
        }
    }

    /// Attach a layout-model label hint.
    pub fn with_label(mut self, label: impl Into<String>, score: Option<f64>) -> Self {
        self.label = Some(label.into());
        self.label_score = score;
        self
    }

    /// Get the center point of the bounding box.
    pub fn center(&self) -> (f32, f32) {
        (
            (self.bbox[0] + self.bbox[2]) / 2.0,
            (self.bbox[1] + self.bbox[3]) / 2.0,
        )
    }

    pub fn height(&self) -> f32 {
        (self.bbox[3] - self.bbox[1]).abs()
    }
}

/// The evaluation context for one rule-set pass.
///
/// Rules only ever read from a `Document`; nothing in the engine writes to it
/// while a pass is running.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Caller-supplied identifier, carried through to outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,

    /// Full text of the document (or of the current page).
    #[serde(default)]
    pub text: String,

    /// Tokens in the order the OCR stage produced them.
    #[serde(default)]
    pub tokens: Vec<Token>,
}

impl Document {
    /// Create a document with text only.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            doc_id: None,
            text: text.into(),
            tokens: Vec::new(),
        }
    }

    /// Create a document from tokens, rebuilding the text in reading order.
    ///
    /// Tokens on the same visual line are joined with a space, lines with a
    /// newline, pages with a blank line.
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        let text = lines_to_text(&group_lines(&tokens));
        Self {
            doc_id: None,
            text,
            tokens,
        }
    }

    pub fn with_id(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }

    /// Parse a document from its JSON representation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a document from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Tokens on the given page, in source order.
    pub fn tokens_on_page(&self, page: u32) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(move |t| t.page == page)
    }

    /// Tokens in reading order: page, then line top to bottom, then left to right.
    pub fn reading_order(&self) -> Vec<&Token> {
        group_lines(&self.tokens).into_iter().flatten().collect()
    }

    /// Tokens carrying the given label hint, in reading order.
    pub fn labeled(&self, label: &str) -> Vec<&Token> {
        self.reading_order()
            .into_iter()
            .filter(|t| t.label.as_deref() == Some(label))
            .collect()
    }
}

/// Group tokens into visual lines.
///
/// A token joins the current line when its vertical center lies within half
/// the line's first-token height of that token's center.
fn group_lines(tokens: &[Token]) -> Vec<Vec<&Token>> {
    let mut sorted: Vec<&Token> = tokens.iter().collect();
    sorted.sort_by(|a, b| {
        a.page
            .cmp(&b.page)
            .then_with(|| cmp_f32(a.center().1, b.center().1))
            .then_with(|| cmp_f32(a.bbox[0], b.bbox[0]))
    });

    let mut lines: Vec<Vec<&Token>> = Vec::new();
    let mut anchor: Option<&Token> = None;

    for token in sorted {
        let same_line = anchor.is_some_and(|a| {
            a.page == token.page
                && (token.center().1 - a.center().1).abs() <= (a.height() / 2.0).max(1.0)
        });

        if same_line {
            if let Some(line) = lines.last_mut() {
                line.push(token);
            }
        } else {
            lines.push(vec![token]);
            anchor = Some(token);
        }
    }

    for line in &mut lines {
        line.sort_by(|a, b| cmp_f32(a.bbox[0], b.bbox[0]));
    }

    lines
}

fn lines_to_text(lines: &[Vec<&Token>]) -> String {
    let mut text = String::new();
    let mut current_page = None;

    for line in lines {
        let Some(first) = line.first() else { continue };
        match current_page {
            Some(page) if page != first.page => text.push_str("\n\n"),
            Some(_) => text.push('\n'),
            None => {}
        }
        current_page = Some(first.page);

        let joined: Vec<&str> = line.iter().map(|t| t.text.as_str()).collect();
        text.push_str(&joined.join(" "));
    }

    text
}

fn cmp_f32(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tok(text: &str, page: u32, x: f32, y: f32) -> Token {
        Token::new(text, page, [x, y, x + 40.0, y + 12.0])
    }

    #[test]
    fn test_from_tokens_reading_order() {
        let tokens = vec![
            tok("#", 0, 60.0, 10.0),
            tok("4821", 0, 80.0, 11.0),
            tok("Invoice", 0, 10.0, 10.0),
            tok("Total", 0, 10.0, 40.0),
            tok("Page2", 1, 10.0, 5.0),
        ];

        let doc = Document::from_tokens(tokens);
        assert_eq!(doc.text, "Invoice # 4821\nTotal\n\nPage2");
    }

    #[test]
    fn test_labeled_tokens() {
        let tokens = vec![
            tok("Doe", 0, 60.0, 10.0).with_label("NAME", Some(0.8)),
            tok("John", 0, 10.0, 10.0).with_label("NAME", Some(0.9)),
            tok("Passport", 0, 10.0, 50.0).with_label("TITLE", None),
        ];
        let doc = Document::from_tokens(tokens);

        let names: Vec<&str> = doc.labeled("NAME").iter().map(|t| t.text.as_str()).collect();
        assert_eq!(names, vec!["John", "Doe"]);
        assert!(doc.labeled("DATE").is_empty());
    }

    #[test]
    fn test_document_json_defaults() {
        let doc = Document::from_json_str(r#"{"text": "hello", "tokens": [{"text": "hello"}]}"#)
            .unwrap();

        assert_eq!(doc.doc_id, None);
        assert_eq!(doc.tokens[0].page, 0);
        assert_eq!(doc.tokens[0].bbox, [0.0; 4]);
        assert_eq!(doc.tokens_on_page(0).count(), 1);
    }
}
