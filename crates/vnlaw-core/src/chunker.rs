//! Paragraph-preserving chunking of long legal articles.
//!
//! Documents that fit in `max_chars` pass through untouched. Longer ones are
//! split on blank lines and paragraphs are packed greedily into units of at
//! most `max_chars` characters. A paragraph that is longer than the limit on
//! its own is emitted whole: a legal clause is never cut mid-sentence.

use crate::config::ChunkingSettings;
use crate::types::{Document, RetrievableUnit};

const PARAGRAPH_SEPARATOR: &str = "\n\n";
const SEPARATOR_CHARS: usize = 2;

#[derive(Debug, Clone)]
pub struct Chunker {
    max_chars: usize,
    part_label: String,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::from_settings(&ChunkingSettings::default())
    }
}

impl Chunker {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars, part_label: ChunkingSettings::default().part_label }
    }

    pub fn from_settings(settings: &ChunkingSettings) -> Self {
        Self { max_chars: settings.max_chunk_chars, part_label: settings.part_label.clone() }
    }

    /// Label inserted in split titles, e.g. `"Phần"` gives `"Điều 5 (Phần 2)"`.
    pub fn with_part_label(mut self, label: impl Into<String>) -> Self {
        self.part_label = label.into();
        self
    }

    pub fn max_chars(&self) -> usize { self.max_chars }

    /// Split one document into retrievable units. Empty bodies yield nothing.
    pub fn chunk(&self, document: &Document) -> Vec<RetrievableUnit> {
        if document.body.trim().is_empty() {
            return Vec::new();
        }
        if char_len(&document.body) <= self.max_chars {
            return vec![sole_unit(document, document.body.clone())];
        }

        let mut bodies = pack_paragraphs(&document.body, self.max_chars);
        if bodies.len() == 1 {
            // one oversized paragraph (plus blank lines): keep the parent identity
            return bodies.pop().map(|body| sole_unit(document, body)).into_iter().collect();
        }

        bodies
            .into_iter()
            .enumerate()
            .map(|(i, body)| {
                let part = i + 1;
                RetrievableUnit {
                    id: format!("{}-p{}", document.id, part),
                    title: format!("{} ({} {})", document.title, self.part_label, part),
                    body,
                    parent_document_id: document.id.clone(),
                    order_index: i,
                    metadata: document.metadata.clone(),
                }
            })
            .collect()
    }

    pub fn chunk_all(&self, documents: &[Document]) -> Vec<RetrievableUnit> {
        documents.iter().flat_map(|d| self.chunk(d)).collect()
    }
}

/// Free-function form of [`Chunker::chunk`] with the default part label.
pub fn chunk(document: &Document, max_length: usize) -> Vec<RetrievableUnit> {
    Chunker::new(max_length).chunk(document)
}

fn sole_unit(document: &Document, body: String) -> RetrievableUnit {
    RetrievableUnit {
        id: document.id.clone(),
        title: document.title.clone(),
        body,
        parent_document_id: document.id.clone(),
        order_index: 0,
        metadata: document.metadata.clone(),
    }
}

fn pack_paragraphs(body: &str, max_chars: usize) -> Vec<String> {
    let mut bodies = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0usize;

    for paragraph in body.split(PARAGRAPH_SEPARATOR) {
        if paragraph.trim().is_empty() {
            continue;
        }
        let paragraph_chars = char_len(paragraph);
        if buffer.is_empty() {
            buffer.push_str(paragraph);
            buffer_chars = paragraph_chars;
        } else if buffer_chars + SEPARATOR_CHARS + paragraph_chars > max_chars {
            bodies.push(std::mem::take(&mut buffer));
            buffer.push_str(paragraph);
            buffer_chars = paragraph_chars;
        } else {
            buffer.push_str(PARAGRAPH_SEPARATOR);
            buffer.push_str(paragraph);
            buffer_chars += SEPARATOR_CHARS + paragraph_chars;
        }
    }
    if !buffer.is_empty() {
        bodies.push(buffer);
    }
    bodies
}

pub(crate) fn char_len(s: &str) -> usize { s.chars().count() }

/// Summary of a chunking run, for ingestion logs and the CLI.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ChunkStats {
    pub documents: usize,
    pub units: usize,
    pub split_documents: usize,
    pub oversized_units: usize,
    pub average_chars: usize,
}

impl ChunkStats {
    pub fn collect(documents: usize, units: &[RetrievableUnit], max_chars: usize) -> Self {
        let total_chars: usize = units.iter().map(|u| char_len(&u.body)).sum();
        Self {
            documents,
            units: units.len(),
            split_documents: units.iter().filter(|u| u.order_index == 0 && u.id != u.parent_document_id).count(),
            oversized_units: units.iter().filter(|u| char_len(&u.body) > max_chars).count(),
            average_chars: if units.is_empty() { 0 } else { total_chars / units.len() },
        }
    }
}
