//! Parsed, queryable form of a fetched document.

use scraper::{Html, Selector};

/// Everything a node inspector captures from one selector resolution.
///
/// `text` concatenates the text of every matching element (a selector that
/// matches several nodes yields their combined text); `html` is the inner
/// HTML of the first match only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCapture {
    pub text: String,
    pub html: String,
}

/// One fetched document: the raw body plus a parsed tree.
///
/// Built fresh on every watch tick and replaced, never mutated. Inspection
/// is synchronous, so a document never needs to live across an await point.
pub struct WebDocument {
    body: String,
    tree: Html,
}

impl WebDocument {
    pub fn parse(body: impl Into<String>) -> Self {
        let body = body.into();
        let tree = Html::parse_document(&body);
        Self { body, tree }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Resolve a selector. `None` when nothing matches.
    pub fn capture(&self, selector: &Selector) -> Option<NodeCapture> {
        let mut elements = self.tree.select(selector);
        let first = elements.next()?;
        let html = first.inner_html();
        let mut text: String = first.text().collect();
        for element in elements {
            text.extend(element.text());
        }
        Some(NodeCapture { text, html })
    }
}
