//! Formatting retrieved documents into prompt context.

use crate::search::RetrievedDocument;

/// Marker between the user's question and the retrieved sources.
pub const SOURCES_MARKER: &str = "\n\nSources:\n";

/// Sources selected for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledContext {
    /// One `"<sourcepage>: <text>"` line per document
    pub sources: Vec<String>,
}

impl AssembledContext {
    /// Format documents, citing captions when `use_captions` is set and
    /// a document has them.
    pub fn from_documents(documents: &[RetrievedDocument], use_captions: bool) -> Self {
        let sources = documents
            .iter()
            .map(|doc| {
                format!(
                    "{}: {}",
                    no_newlines(&doc.sourcepage),
                    no_newlines(&doc.citation_text(use_captions))
                )
            })
            .collect();
        Self { sources }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Sources joined with newlines.
    pub fn content(&self) -> String {
        self.sources.join("\n")
    }
}

/// User turn: the query, followed by the sources block when there is any
/// content.
pub fn user_turn(query: &str, content: &str) -> String {
    if content.is_empty() {
        query.to_string()
    } else {
        format!("{}{}{}", query, SOURCES_MARKER, content)
    }
}

fn no_newlines(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}
