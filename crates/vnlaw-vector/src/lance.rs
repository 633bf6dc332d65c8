//! LanceDB-backed [`VectorIndex`].
//!
//! LanceDB is async; the index owns a tokio runtime and blocks on it so the
//! retrieval path stays synchronous. Every call is bounded by the configured
//! timeout, and a timeout surfaces as [`Error::Timeout`].
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use arrow_array::{Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use tokio::runtime::Runtime;

use vnlaw_core::error::{Error, Result};
use vnlaw_core::traits::VectorIndex;
use vnlaw_core::types::{LegalMetadata, RetrievableUnit, VectorEntry, VectorMatch};

use crate::schema::{build_arrow_schema, vector_dim};

pub struct LanceVectorIndex {
	runtime: Runtime,
	db: Connection,
	table_name: String,
	dim: usize,
	timeout: Duration,
}

impl LanceVectorIndex {
	/// Connects to the database at `db_path` and makes sure `table_name`
	/// exists with a `dim`-wide vector column.
	pub fn open(db_path: &Path, table_name: &str, dim: usize, timeout: Duration) -> Result<Self> {
		let runtime = Runtime::new().map_err(|e| Error::Operation(format!("tokio runtime: {}", e)))?;
		let uri = db_path.to_string_lossy().to_string();
		let db = block(&runtime, timeout, async move { connect(&uri).execute().await })?;
		let index = Self { runtime, db, table_name: table_name.to_string(), dim, timeout };
		index.ensure_table()?;
		Ok(index)
	}

	fn run<T, E, F>(&self, fut: F) -> Result<T>
	where
		E: std::fmt::Display,
		F: Future<Output = std::result::Result<T, E>>,
	{
		block(&self.runtime, self.timeout, fut)
	}

	fn ensure_table(&self) -> Result<()> {
		let names = self.run(self.db.table_names().execute())?;
		if names.contains(&self.table_name) {
			let table = self.table()?;
			let schema = self.run(table.schema())?;
			match vector_dim(&schema) {
				Some(d) if d == self.dim => return Ok(()),
				found => {
					return Err(Error::InvalidConfig(format!(
						"table '{}' stores vectors of width {:?}, embedder produces {}",
						self.table_name, found, self.dim
					)))
				}
			}
		}
		let schema = build_arrow_schema(self.dim as i32);
		let empty = RecordBatchIterator::new(vec![].into_iter(), schema);
		self.run(self.db.create_table(&self.table_name, Box::new(empty)).execute())?;
		tracing::info!(table = %self.table_name, dim = self.dim, "created vector table");
		Ok(())
	}

	fn table(&self) -> Result<Table> {
		self.run(self.db.open_table(&self.table_name).execute())
	}

	pub fn count(&self) -> Result<usize> {
		let table = self.table()?;
		self.run(table.count_rows(None))
	}

	fn to_record_batch(&self, entries: &[VectorEntry]) -> Result<RecordBatch> {
		let mut ids = Vec::new(); let mut parents = Vec::new(); let mut titles = Vec::new(); let mut bodies = Vec::new();
		let mut orders = Vec::new(); let mut metadata = Vec::new(); let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
		for e in entries {
			if e.vector.len() != self.dim {
				return Err(Error::InvalidInput(format!("vector for '{}' has {} values, expected {}", e.unit.id, e.vector.len(), self.dim)));
			}
			ids.push(e.unit.id.clone());
			parents.push(e.unit.parent_document_id.clone());
			titles.push(e.unit.title.clone());
			bodies.push(e.unit.body.clone());
			orders.push(e.unit.order_index as i64);
			metadata.push(serde_json::to_string(&e.unit.metadata).map_err(|e| Error::Operation(e.to_string()))?);
			vectors.push(Some(e.vector.iter().map(|&x| Some(x)).collect()));
		}
		RecordBatch::try_new(build_arrow_schema(self.dim as i32), vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(parents)),
			Arc::new(StringArray::from(titles)),
			Arc::new(StringArray::from(bodies)),
			Arc::new(Int64Array::from(orders)),
			Arc::new(StringArray::from(metadata)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), self.dim as i32)),
		])
		.map_err(|e| Error::Operation(e.to_string()))
	}
}

fn block<T, E, F>(runtime: &Runtime, timeout: Duration, fut: F) -> Result<T>
where
	E: std::fmt::Display,
	F: Future<Output = std::result::Result<T, E>>,
{
	match runtime.block_on(async { tokio::time::timeout(timeout, fut).await }) {
		Ok(Ok(v)) => Ok(v),
		Ok(Err(e)) => Err(Error::backend(e)),
		Err(_) => Err(Error::Timeout(timeout)),
	}
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| Error::backend(format!("column '{}' missing from search result", name)))
}

fn rows_to_matches(batch: &RecordBatch) -> Result<Vec<VectorMatch>> {
	let ids = string_col(batch, "id")?;
	let parents = string_col(batch, "parent_id")?;
	let titles = string_col(batch, "title")?;
	let bodies = string_col(batch, "body")?;
	let metadata = string_col(batch, "metadata")?;
	let orders = batch.column_by_name("order_index").and_then(|c| c.as_any().downcast_ref::<Int64Array>());
	let distances = batch
		.column_by_name("_distance")
		.and_then(|c| c.as_any().downcast_ref::<Float32Array>())
		.ok_or_else(|| Error::backend("search result has no _distance column"))?;

	let mut out = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let unit = RetrievableUnit {
			id: ids.value(i).to_string(),
			title: titles.value(i).to_string(),
			body: bodies.value(i).to_string(),
			parent_document_id: parents.value(i).to_string(),
			order_index: orders.map(|o| o.value(i).max(0) as usize).unwrap_or(0),
			metadata: serde_json::from_str::<LegalMetadata>(metadata.value(i)).unwrap_or_default(),
		};
		// cosine distance = 1 - cosine similarity
		let score = if distances.is_null(i) { 0.0 } else { 1.0 - distances.value(i) };
		out.push(VectorMatch { unit, score });
	}
	Ok(out)
}

impl VectorIndex for LanceVectorIndex {
	fn dim(&self) -> usize { self.dim }

	fn upsert(&self, entries: &[VectorEntry]) -> Result<()> {
		if entries.is_empty() { return Ok(()); }
		let batch = self.to_record_batch(entries)?;
		let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		let table = self.table()?;
		let mut mi = table.merge_insert(&["id"]);
		mi.when_matched_update_all(None).when_not_matched_insert_all();
		self.run(mi.execute(reader))?;
		tracing::debug!(count = entries.len(), table = %self.table_name, "upserted vectors");
		Ok(())
	}

	fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
		if top_k == 0 { return Ok(Vec::new()); }
		let table = self.table()?;
		let query = table.vector_search(vector.to_vec()).map_err(Error::backend)?.distance_type(DistanceType::Cosine).limit(top_k);
		let batches: Vec<RecordBatch> = self.run(async move {
			let stream = query.execute().await.map_err(|e| e.to_string())?;
			stream.try_collect::<Vec<_>>().await.map_err(|e| e.to_string())
		})?;
		let mut matches = Vec::new();
		for batch in &batches { matches.extend(rows_to_matches(batch)?); }
		Ok(matches)
	}
}
