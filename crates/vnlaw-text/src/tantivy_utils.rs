//! Schema and analyzer shared by the Tantivy backend.
//!
//! Title and body are indexed as lowercased character n-grams (1 to 3
//! chars, whitespace and punctuation included), so any substring needle can
//! be narrowed to the documents holding all of its trigrams. Diacritics are
//! kept: grams are cut on char boundaries, never inside a code point.
use tantivy::schema::{Schema, TextFieldIndexing, TextOptions, IndexRecordOption, FAST, INDEXED, STRING, STORED};
use tantivy::tokenizer::{TextAnalyzer, NgramTokenizer, LowerCaser, TokenStream};
use tantivy::Index;

pub const ANALYZER: &str = "vn_ngram";
pub const SEQ_FIELD: &str = "seq";
pub const MAX_GRAM: usize = 3;

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field("id", STRING | STORED);
	schema_builder.add_text_field("parent_id", STRING | STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(ANALYZER).set_index_option(IndexRecordOption::Basic);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing).set_stored();
	schema_builder.add_text_field("title", text_options.clone());
	schema_builder.add_text_field("body", text_options);
	schema_builder.add_u64_field("order_index", STORED);
	schema_builder.add_u64_field(SEQ_FIELD, INDEXED | FAST | STORED);
	schema_builder.add_text_field("metadata", STORED);
	schema_builder.build()
}

pub fn build_analyzer() -> tantivy::Result<TextAnalyzer> {
	let grams = NgramTokenizer::new(1, MAX_GRAM, false)?;
	Ok(TextAnalyzer::builder(grams).filter(LowerCaser).build())
}

pub fn register_tokenizer(index: &Index) -> tantivy::Result<()> {
	index.tokenizers().register(ANALYZER, build_analyzer()?);
	Ok(())
}

/// Terms the index would store for `text`.
pub fn analyze(text: &str) -> tantivy::Result<Vec<String>> {
	let mut analyzer = build_analyzer()?;
	let mut stream = analyzer.token_stream(text);
	let mut terms = Vec::new();
	while stream.advance() { terms.push(stream.token().text.clone()); }
	Ok(terms)
}

/// Terms every document containing `needle` must hold: its distinct
/// trigrams, or the whole needle when it is shorter than a trigram.
pub fn needle_terms(needle: &str) -> tantivy::Result<Vec<String>> {
	let len = needle.chars().count();
	let want = len.min(MAX_GRAM);
	let mut terms: Vec<String> = Vec::new();
	for t in analyze(needle)? {
		if t.chars().count() == want && !terms.contains(&t) { terms.push(t); }
	}
	Ok(terms)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn analyze_emits_lowercase_char_grams() {
		assert_eq!(analyze("ĐÂn").unwrap(), vec!["đ", "đâ", "đân", "â", "ân", "n"]);
	}

	#[test]
	fn needle_terms_are_distinct_trigrams() {
		assert_eq!(needle_terms("ân sự").unwrap(), vec!["ân ", "n s", " sự"]);
		assert_eq!(needle_terms("aaaa").unwrap(), vec!["aaa"]);
		assert_eq!(needle_terms("QH").unwrap(), vec!["qh"]);
	}
}
