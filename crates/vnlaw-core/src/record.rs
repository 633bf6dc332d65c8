//! Legal article records as they come out of the article store or a JSON
//! export, and their normalization into [`Document`]s.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{Document, LegalMetadata};

/// Parent law document info, either joined into the row or flattened on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LawDocumentInfo {
    #[serde(alias = "name", deserialize_with = "lenient_string")]
    pub ten: String,
    #[serde(alias = "number", deserialize_with = "lenient_string")]
    pub so_hieu: String,
    #[serde(alias = "type", alias = "loai_van_ban", deserialize_with = "lenient_string")]
    pub loai: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegalArticle {
    #[serde(deserialize_with = "lenient_string")]
    pub mapc: String,
    #[serde(alias = "title", deserialize_with = "lenient_string")]
    pub ten: String,
    #[serde(alias = "noidung", alias = "body", alias = "content", deserialize_with = "lenient_string")]
    pub noi_dung: String,
    #[serde(deserialize_with = "lenient_string")]
    pub document_id: String,
    pub chuong: Option<String>,
    pub muc: Option<String>,
    #[serde(deserialize_with = "lenient_i64")]
    pub thu_tu: i64,
    #[serde(alias = "document")]
    pub documents: Option<LawDocumentInfo>,
    pub document_name: Option<String>,
    pub document_number: Option<String>,
    pub document_type: Option<String>,
}

impl LegalArticle {
    pub fn body_chars(&self) -> usize { self.noi_dung.trim().chars().count() }

    fn law_document(&self) -> LawDocumentInfo {
        let joined = self.documents.clone().unwrap_or_default();
        LawDocumentInfo {
            ten: pick(&self.document_name, joined.ten),
            so_hieu: pick(&self.document_number, joined.so_hieu),
            loai: pick(&self.document_type, joined.loai),
        }
    }

    /// Builds the chunker input. When the parent document name is known the
    /// body is prefixed with it so the embedding sees which law it belongs to.
    /// `fallback_index` names records that arrive without an id.
    pub fn into_document(self, fallback_index: usize) -> Document {
        let law = self.law_document();
        let id = if self.mapc.trim().is_empty() {
            format!("article-{}", fallback_index)
        } else {
            self.mapc.trim().to_string()
        };
        let title = if self.ten.trim().is_empty() { id.clone() } else { self.ten.trim().to_string() };
        let body = if law.ten.is_empty() {
            self.noi_dung.clone()
        } else {
            format!("Văn bản: {}\n{}\n\n{}", law.ten, title, self.noi_dung)
        };
        let metadata = LegalMetadata {
            law_document_id: self.document_id,
            document_name: law.ten,
            document_number: law.so_hieu,
            document_type: law.loai,
            chapter: self.chuong.unwrap_or_default(),
            section: self.muc.unwrap_or_default(),
            article_order: self.thu_tu,
        };
        Document { id, title, body, metadata }
    }
}

fn pick(flat: &Option<String>, joined: String) -> String {
    match flat {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => joined.trim().to_string(),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// Parses a JSON export: a bare array of rows, an object with an
/// `articles` (or `data`) array, or a single row.
pub fn parse_articles(json: &str) -> Result<Vec<LegalArticle>> {
    let value: Value = serde_json::from_str(json).map_err(|e| Error::InvalidInput(format!("invalid JSON: {}", e)))?;
    let rows = match value {
        Value::Array(rows) => rows,
        Value::Object(mut map) => match map.remove("articles").or_else(|| map.remove("data")) {
            Some(Value::Array(rows)) => rows,
            Some(_) => return Err(Error::InvalidInput("`articles` must be an array".into())),
            None => vec![Value::Object(map)],
        },
        _ => return Err(Error::InvalidInput("expected an array or an object of articles".into())),
    };
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(|e| Error::InvalidInput(format!("invalid article: {}", e))))
        .collect()
}

/// Reads articles from a JSON file, or from every `*.json` file under a
/// directory in path order.
pub fn load_articles(path: &Path) -> Result<Vec<LegalArticle>> {
    let files = if path.is_dir() { list_json_files(path) } else { vec![path.to_path_buf()] };
    let mut articles = Vec::new();
    for file in files {
        let text = fs::read_to_string(&file)
            .map_err(|e| Error::InvalidInput(format!("cannot read {}: {}", file.display(), e)))?;
        let parsed = parse_articles(&text)?;
        tracing::debug!(file = %file.display(), count = parsed.len(), "loaded articles");
        articles.extend(parsed);
    }
    Ok(articles)
}

fn list_json_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    files.sort();
    files
}

/// Result of normalizing a batch: kept documents and how many rows were
/// dropped for carrying too little text.
#[derive(Debug, Default)]
pub struct Normalized {
    pub documents: Vec<Document>,
    pub skipped: usize,
}

pub fn normalize_articles(articles: Vec<LegalArticle>, min_body_chars: usize) -> Normalized {
    let mut out = Normalized::default();
    for (i, article) in articles.into_iter().enumerate() {
        if article.body_chars() < min_body_chars {
            tracing::debug!(id = %article.mapc, "skipping article with short body");
            out.skipped += 1;
            continue;
        }
        out.documents.push(article.into_document(i));
    }
    out
}
