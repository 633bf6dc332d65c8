use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::{AllQuery, BooleanQuery, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{doc, DocAddress, Index, IndexReader, IndexWriter, Order, ReloadPolicy, Searcher, TantivyDocument, Term};

use vnlaw_core::error::{Error, Result};
use vnlaw_core::traits::TextBackend;
use vnlaw_core::types::{LegalMetadata, RetrievableUnit};

use crate::tantivy_utils::{build_schema, needle_terms, register_tokenizer, SEQ_FIELD};

const WRITER_HEAP: usize = 50_000_000;

struct Fields {
	id: Field,
	parent_id: Field,
	title: Field,
	body: Field,
	order_index: Field,
	seq: Field,
	metadata: Field,
}

/// Tantivy-backed [`TextBackend`]. Every indexed unit gets a monotonically
/// increasing `seq`, which is what "most recent" and "first" sort on.
pub struct TantivyBackend {
	reader: IndexReader,
	writer: Mutex<IndexWriter>,
	fields: Fields,
	next_seq: AtomicU64,
}

impl TantivyBackend {
	/// Opens the index under `dir`, creating it when missing.
	pub fn open(dir: &Path) -> Result<Self> {
		std::fs::create_dir_all(dir).map_err(Error::backend)?;
		let directory = MmapDirectory::open(dir).map_err(Error::backend)?;
		let index = Index::open_or_create(directory, build_schema()).map_err(Error::backend)?;
		Self::from_index(index)
	}

	/// Wipes `dir` and starts an empty index there.
	pub fn recreate(dir: &Path) -> Result<Self> {
		if dir.exists() { std::fs::remove_dir_all(dir).map_err(Error::backend)?; }
		Self::open(dir)
	}

	pub fn in_memory() -> Result<Self> {
		Self::from_index(Index::create_in_ram(build_schema()))
	}

	fn from_index(index: Index) -> Result<Self> {
		register_tokenizer(&index).map_err(Error::backend)?;
		let schema = index.schema();
		let field = |name: &str| schema.get_field(name).map_err(Error::backend);
		let fields = Fields {
			id: field("id")?,
			parent_id: field("parent_id")?,
			title: field("title")?,
			body: field("body")?,
			order_index: field("order_index")?,
			seq: field(SEQ_FIELD)?,
			metadata: field("metadata")?,
		};
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(Error::backend)?;
		let writer = index.writer(WRITER_HEAP).map_err(Error::backend)?;
		let backend = Self { reader, writer: Mutex::new(writer), fields, next_seq: AtomicU64::new(0) };
		let last = backend.by_seq(1, Order::Desc)?.into_iter().next().map(|(seq, _)| seq + 1).unwrap_or(0);
		backend.next_seq.store(last, Ordering::SeqCst);
		Ok(backend)
	}

	pub fn num_units(&self) -> u64 { self.reader.searcher().num_docs() }

	fn by_seq(&self, limit: usize, order: Order) -> Result<Vec<(u64, DocAddress)>> {
		if limit == 0 { return Ok(Vec::new()); }
		let searcher = self.reader.searcher();
		let collector = TopDocs::with_limit(limit).order_by_u64_field(SEQ_FIELD, order);
		searcher.search(&AllQuery, &collector).map_err(Error::backend)
	}

	fn load(&self, searcher: &Searcher, addr: DocAddress) -> Result<RetrievableUnit> {
		let doc: TantivyDocument = searcher.doc(addr).map_err(Error::backend)?;
		let text = |f: Field| doc.get_first(f).and_then(|v| v.as_str()).unwrap_or("").to_string();
		let metadata = doc
			.get_first(self.fields.metadata)
			.and_then(|v| v.as_str())
			.and_then(|s| serde_json::from_str::<LegalMetadata>(s).ok())
			.unwrap_or_default();
		Ok(RetrievableUnit {
			id: text(self.fields.id),
			title: text(self.fields.title),
			body: text(self.fields.body),
			parent_document_id: text(self.fields.parent_id),
			order_index: doc.get_first(self.fields.order_index).and_then(|v| v.as_u64()).unwrap_or(0) as usize,
			metadata,
		})
	}

	fn load_ordered(&self, hits: Vec<(u64, DocAddress)>) -> Result<Vec<RetrievableUnit>> {
		let searcher = self.reader.searcher();
		hits.into_iter().map(|(_, addr)| self.load(&searcher, addr)).collect()
	}

	// documents holding every gram of the needle in `field`
	fn field_query(&self, field: Field, terms: &[String]) -> Box<dyn Query> {
		let mut clauses: Vec<Box<dyn Query>> = terms
			.iter()
			.map(|t| Box::new(TermQuery::new(Term::from_field_text(field, t), IndexRecordOption::Basic)) as Box<dyn Query>)
			.collect();
		if clauses.len() == 1 {
			clauses.remove(0)
		} else {
			Box::new(BooleanQuery::intersection(clauses))
		}
	}

	fn stage(&self, writer: &mut IndexWriter, units: &[RetrievableUnit], first_seq: u64) -> Result<()> {
		for (i, u) in units.iter().enumerate() {
			let metadata = serde_json::to_string(&u.metadata).map_err(|e| Error::Operation(e.to_string()))?;
			writer.delete_term(Term::from_field_text(self.fields.id, &u.id));
			writer.add_document(doc!(
				self.fields.id => u.id.clone(),
				self.fields.parent_id => u.parent_document_id.clone(),
				self.fields.title => u.title.clone(),
				self.fields.body => u.body.clone(),
				self.fields.order_index => u.order_index as u64,
				self.fields.seq => first_seq + i as u64,
				self.fields.metadata => metadata,
			)).map_err(Error::backend)?;
		}
		Ok(())
	}
}

impl TextBackend for TantivyBackend {
	fn index(&self, units: &[RetrievableUnit]) -> Result<()> {
		let mut writer = self.writer.lock().map_err(|_| Error::Operation("index writer lock poisoned".into()))?;
		let first_seq = self.next_seq.load(Ordering::SeqCst);
		let staged = self
			.stage(&mut writer, units, first_seq)
			.and_then(|()| writer.commit().map(|_| ()).map_err(Error::backend));
		if let Err(e) = staged {
			// a failed batch must not leak into the next commit
			if let Err(rb) = writer.rollback() {
				tracing::warn!(error = %rb, "tantivy rollback failed");
			}
			return Err(e);
		}
		self.next_seq.store(first_seq + units.len() as u64, Ordering::SeqCst);
		self.reader.reload().map_err(Error::backend)?;
		tracing::debug!(count = units.len(), "indexed units into tantivy");
		Ok(())
	}

	/// Case-insensitive substring match over title and body. The n-gram index
	/// narrows candidates to documents holding every trigram of the needle,
	/// the stored text is then checked for the actual substring. Hits come
	/// back in insertion order.
	fn contains(&self, needle: &str, limit: usize) -> Result<Vec<RetrievableUnit>> {
		let needle_lower = needle.trim().to_lowercase();
		if needle_lower.is_empty() || limit == 0 { return Ok(Vec::new()); }
		let terms = needle_terms(&needle_lower).map_err(Error::backend)?;
		let query: Box<dyn Query> = if terms.is_empty() {
			Box::new(AllQuery)
		} else {
			Box::new(BooleanQuery::union(vec![
				self.field_query(self.fields.title, &terms),
				self.field_query(self.fields.body, &terms),
			]))
		};

		let searcher = self.reader.searcher();
		let candidates = (searcher.num_docs() as usize).max(1);
		let hits = searcher
			.search(&query, &TopDocs::with_limit(candidates).order_by_u64_field(SEQ_FIELD, Order::Asc))
			.map_err(Error::backend)?;
		let mut out = Vec::new();
		for (_, addr) in hits {
			let unit = self.load(&searcher, addr)?;
			if unit.contains_folded(&needle_lower) {
				out.push(unit);
				if out.len() >= limit { break; }
			}
		}
		Ok(out)
	}

	fn most_recent(&self, limit: usize) -> Result<Vec<RetrievableUnit>> {
		self.load_ordered(self.by_seq(limit, Order::Desc)?)
	}

	fn first(&self, limit: usize) -> Result<Vec<RetrievableUnit>> {
		self.load_ordered(self.by_seq(limit, Order::Asc)?)
	}
}
