use arrow_schema::{Schema, Field, DataType};
use std::sync::Arc;

/// Row layout of the unit table: unit fields, legal metadata as a JSON
/// string, and a fixed-size embedding column.
pub fn build_arrow_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("parent_id", DataType::Utf8, false),
		Field::new("title", DataType::Utf8, false),
		Field::new("body", DataType::Utf8, false),
		Field::new("order_index", DataType::Int64, false),
		Field::new("metadata", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

/// Embedding width declared by a table schema, if it has a vector column.
pub fn vector_dim(schema: &Schema) -> Option<usize> {
	match schema.field_with_name("vector").ok()?.data_type() {
		DataType::FixedSizeList(_, n) => Some(*n as usize),
		_ => None,
	}
}
