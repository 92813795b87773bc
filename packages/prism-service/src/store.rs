use std::sync::{
	Arc,
	atomic::{AtomicBool, Ordering},
};

use prism_domain::{CollectionKind, DocumentMetadata, Segment};
use prism_storage::{
	CollectionRecord, QueryHit, RecordMetadata, Selector, StoredRecord, VectorCollection,
};

use crate::{Embedder, Error, Result};

/// A nearest-neighbor hit with its similarity score, `1 - distance`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreHit {
	pub record: StoredRecord,
	pub score: f32,
	pub distance: f32,
}
impl From<QueryHit> for StoreHit {
	fn from(hit: QueryHit) -> Self {
		Self { score: 1.0 - hit.distance, distance: hit.distance, record: hit.record }
	}
}

/// Binds one vector collection to the shared embedder.
pub struct SingleCollectionStore {
	kind: CollectionKind,
	collection: Arc<dyn VectorCollection>,
	embedder: Arc<dyn Embedder>,
	initialized: AtomicBool,
}
impl SingleCollectionStore {
	pub fn new(
		kind: CollectionKind,
		collection: Arc<dyn VectorCollection>,
		embedder: Arc<dyn Embedder>,
	) -> Self {
		Self { kind, collection, embedder, initialized: AtomicBool::new(false) }
	}

	pub fn kind(&self) -> CollectionKind {
		self.kind
	}

	pub fn collection_name(&self) -> &str {
		self.collection.name()
	}

	pub fn is_initialized(&self) -> bool {
		self.initialized.load(Ordering::Acquire)
	}

	/// Creates the backing collection when missing. Safe to call repeatedly.
	pub async fn initialize(&self) -> Result<()> {
		self.collection.ensure(self.embedder.dimension()).await?;
		self.initialized.store(true, Ordering::Release);

		tracing::info!(
			kind = self.kind.as_str(),
			collection = self.collection.name(),
			"Collection store initialized."
		);

		Ok(())
	}

	/// Embeds metadata-enriched texts in one batch and upserts the raw texts.
	///
	/// Re-adding an existing id overwrites it; callers that change ids must delete first.
	pub async fn add_segments(
		&self,
		segments: &[Segment],
		metadata: &DocumentMetadata,
	) -> Result<()> {
		self.ensure_initialized()?;

		if segments.is_empty() {
			return Ok(());
		}

		let texts = segments
			.iter()
			.map(|segment| metadata.embedding_text(&segment.text))
			.collect::<Vec<_>>();
		let vectors = self.embedder.embed_batch(&texts).await?;

		if vectors.len() != segments.len() {
			return Err(prism_providers::Error::InvalidResponse {
				message: format!(
					"Embedding provider returned {} vectors for {} texts.",
					vectors.len(),
					segments.len()
				),
			}
			.into());
		}

		let mut records = Vec::with_capacity(segments.len());

		for (segment, vector) in segments.iter().zip(vectors) {
			self.check_dimension(&vector)?;

			records.push(CollectionRecord {
				id: segment.id.clone(),
				document: segment.text.clone(),
				metadata: RecordMetadata {
					parent_document_id: segment.parent_document_id.clone(),
					parent_passage_id: segment.parent_passage_id.clone(),
					index: segment.index,
					document: metadata.clone(),
				},
				vector,
			});
		}

		self.collection.upsert(&records).await?;

		tracing::debug!(
			kind = self.kind.as_str(),
			count = records.len(),
			"Segments written."
		);

		Ok(())
	}

	pub async fn delete(&self, ids: &[String]) -> Result<()> {
		self.delete_where(&Selector::Ids(ids.to_vec())).await
	}

	pub async fn delete_where(&self, selector: &Selector) -> Result<()> {
		self.ensure_initialized()?;

		if selector.is_empty() {
			return Ok(());
		}

		self.collection.delete(selector).await?;

		Ok(())
	}

	/// Embeds `query` and returns up to `top_k` hits by descending score.
	pub async fn search(&self, query: &str, top_k: u32) -> Result<Vec<StoreHit>> {
		self.ensure_initialized()?;

		if top_k == 0 {
			return Ok(Vec::new());
		}

		let vector = self.embedder.embed(query).await?;

		self.check_dimension(&vector)?;

		let mut hits = self
			.collection
			.query(&vector, top_k)
			.await?
			.into_iter()
			.map(StoreHit::from)
			.collect::<Vec<_>>();

		hits.sort_by(|a, b| b.score.total_cmp(&a.score));

		Ok(hits)
	}

	pub async fn get(&self, selector: &Selector) -> Result<Vec<StoredRecord>> {
		self.ensure_initialized()?;

		if selector.is_empty() {
			return Ok(Vec::new());
		}

		Ok(self.collection.get(selector).await?)
	}

	/// Drops and recreates the backing collection.
	pub async fn clear(&self) -> Result<()> {
		self.ensure_initialized()?;
		self.collection.drop_collection().await?;
		self.collection.ensure(self.embedder.dimension()).await?;

		tracing::info!(
			kind = self.kind.as_str(),
			collection = self.collection.name(),
			"Collection cleared."
		);

		Ok(())
	}

	fn ensure_initialized(&self) -> Result<()> {
		if self.is_initialized() {
			return Ok(());
		}

		Err(Error::Configuration {
			message: format!(
				"The {} store for collection {} is not initialized.",
				self.kind,
				self.collection.name()
			),
		})
	}

	fn check_dimension(&self, vector: &[f32]) -> Result<()> {
		let expected = self.embedder.dimension() as usize;

		if vector.len() == expected {
			return Ok(());
		}

		Err(prism_providers::Error::InvalidResponse {
			message: format!(
				"Embedding dimension mismatch: expected {expected}, got {}.",
				vector.len()
			),
		}
		.into())
	}
}
