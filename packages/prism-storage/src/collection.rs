use std::{future::Future, pin::Pin};

use serde::{Deserialize, Serialize};

use prism_domain::DocumentMetadata;

use crate::Result;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Metadata stored next to every record, flat enough to filter on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
	pub parent_document_id: String,
	pub parent_passage_id: Option<String>,
	pub index: u32,
	pub document: DocumentMetadata,
}

/// A record ready to be written: raw document text plus the vector of its enriched form.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRecord {
	pub id: String,
	pub document: String,
	pub metadata: RecordMetadata,
	pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
	pub id: String,
	pub document: String,
	pub metadata: RecordMetadata,
}

/// One nearest-neighbor result. `distance` is cosine distance, `0.0` for an identical direction.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
	pub record: StoredRecord,
	pub distance: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
	Ids(Vec<String>),
	/// Every record whose `parent_passage_id` is in the list.
	ParentPassages(Vec<String>),
}
impl Selector {
	pub fn is_empty(&self) -> bool {
		match self {
			Self::Ids(ids) | Self::ParentPassages(ids) => ids.is_empty(),
		}
	}

	pub fn matches(&self, record: &StoredRecord) -> bool {
		match self {
			Self::Ids(ids) => ids.iter().any(|id| id == &record.id),
			Self::ParentPassages(ids) => record
				.metadata
				.parent_passage_id
				.as_ref()
				.is_some_and(|parent| ids.iter().any(|id| id == parent)),
		}
	}
}

/// One named cosine similarity index.
pub trait VectorCollection
where
	Self: Send + Sync,
{
	fn name(&self) -> &str;

	/// Creates the collection when missing. Existing collections are left untouched.
	fn ensure(&self, dimension: u32) -> BoxFuture<'_, Result<()>>;

	/// Drops the collection. A missing collection is not an error.
	fn drop_collection(&self) -> BoxFuture<'_, Result<()>>;

	fn upsert<'a>(&'a self, records: &'a [CollectionRecord]) -> BoxFuture<'a, Result<()>>;

	/// Removes matching records. Unknown ids are ignored.
	fn delete<'a>(&'a self, selector: &'a Selector) -> BoxFuture<'a, Result<()>>;

	/// Nearest neighbors ordered by ascending distance.
	fn query<'a>(&'a self, vector: &'a [f32], top_k: u32)
	-> BoxFuture<'a, Result<Vec<QueryHit>>>;

	fn get<'a>(&'a self, selector: &'a Selector) -> BoxFuture<'a, Result<Vec<StoredRecord>>>;
}
