//! Turns an ordered result list into the prompt context block and the
//! citation list shown next to the answer.

use serde::{Deserialize, Serialize};

use crate::config::ContextSettings;
use crate::types::SearchResult;

const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    pub title: String,
    pub body_preview: String,
    pub score: Option<f32>,
}

/// Context block plus citations. `context` is empty (never absent) when no
/// unit was consumed; callers decide how to prompt in that case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    pub context: String,
    pub citations: Vec<Citation>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool { self.citations.is_empty() }
}

#[derive(Debug, Clone)]
pub struct ContextAssembler {
    preview_chars: Option<usize>,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::from_settings(&ContextSettings::default())
    }
}

impl ContextAssembler {
    /// `None` keeps whole bodies.
    pub fn new(preview_chars: Option<usize>) -> Self { Self { preview_chars } }

    pub fn from_settings(settings: &ContextSettings) -> Self { Self::new(settings.preview_chars) }

    pub fn assemble(&self, results: &[SearchResult], max_units: usize) -> AssembledContext {
        let mut parts = Vec::new();
        let mut citations = Vec::new();
        for (i, result) in results.iter().take(max_units).enumerate() {
            let preview = self.preview(&result.unit.body);
            parts.push(format!("{}. {}", i + 1, preview));
            citations.push(Citation {
                id: result.unit.id.clone(),
                title: result.unit.title.clone(),
                body_preview: preview,
                score: result.score,
            });
        }
        AssembledContext { context: parts.join("\n\n"), citations }
    }

    fn preview(&self, body: &str) -> String {
        match self.preview_chars {
            Some(limit) => truncate_chars(body, limit),
            None => body.to_string(),
        }
    }
}

/// Cuts `text` to at most `limit` characters on a char boundary and marks the
/// cut with `...`.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], ELLIPSIS),
        None => text.to_string(),
    }
}
