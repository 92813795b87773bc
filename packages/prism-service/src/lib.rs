pub mod allocation;
pub mod ingest;
pub mod search;
pub mod store;
pub mod time_serde;
pub mod topics;

mod error;

pub use allocation::{
	Allocation, Ranked, TopicCandidates, TopicSatisfaction, allocate, allocate_quotas,
};
pub use error::{Error, Result};
pub use prism_storage::BoxFuture;
pub use search::{
	Candidate, CollectionSearchConfig, PerCollectionConfig, RerankOptions, RetrievalSources,
	SearchRequest, SearchResponse,
};
pub use store::{SingleCollectionStore, StoreHit};
pub use topics::{Topic, TopicSearchRequest, TopicSearchResponse};

use std::sync::Arc;

use prism_config::{Config, EmbeddingProviderConfig, RerankProviderConfig};
use prism_domain::CollectionKind;
use prism_providers::{
	embedding,
	rerank::{self, RerankResponse},
};
use prism_storage::{
	VectorCollection,
	qdrant::{self, QdrantCollection},
};

/// Text to fixed-dimension vector.
pub trait Embedder
where
	Self: Send + Sync,
{
	fn dimension(&self) -> u32;

	/// Order-preserving batch embedding.
	fn embed_batch<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, prism_providers::Result<Vec<Vec<f32>>>>;

	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, prism_providers::Result<Vec<f32>>> {
		Box::pin(async move {
			let texts = vec![text.to_string()];
			let mut vectors = self.embed_batch(&texts).await?;

			vectors.pop().ok_or_else(|| prism_providers::Error::InvalidResponse {
				message: "Embedding provider returned no vector.".to_string(),
			})
		})
	}
}

pub trait Reranker
where
	Self: Send + Sync,
{
	/// `index` in every result refers to the position in `docs`.
	fn rerank<'a>(
		&'a self,
		query: &'a str,
		docs: &'a [String],
		top_n: usize,
	) -> BoxFuture<'a, prism_providers::Result<RerankResponse>>;
}

pub struct HttpEmbedder {
	cfg: EmbeddingProviderConfig,
}
impl HttpEmbedder {
	pub fn new(cfg: EmbeddingProviderConfig) -> Self {
		Self { cfg }
	}
}

impl Embedder for HttpEmbedder {
	fn dimension(&self) -> u32 {
		self.cfg.dimensions
	}

	fn embed_batch<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, prism_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(&self.cfg, texts))
	}
}

pub struct HttpReranker {
	cfg: RerankProviderConfig,
}
impl HttpReranker {
	/// `None` when no API key is configured.
	pub fn from_config(cfg: &RerankProviderConfig) -> Option<Self> {
		cfg.api_key.as_ref().map(|_| Self { cfg: cfg.clone() })
	}
}

impl Reranker for HttpReranker {
	fn rerank<'a>(
		&'a self,
		query: &'a str,
		docs: &'a [String],
		top_n: usize,
	) -> BoxFuture<'a, prism_providers::Result<RerankResponse>> {
		Box::pin(rerank::rerank(&self.cfg, query, docs, top_n))
	}
}

/// Owns the passage, summary, and fact stores plus the optional reranker.
pub struct MultiCollectionRetriever {
	passages: SingleCollectionStore,
	summaries: SingleCollectionStore,
	facts: SingleCollectionStore,
	reranker: Option<Arc<dyn Reranker>>,
}
impl MultiCollectionRetriever {
	pub fn new(
		collections: [Arc<dyn VectorCollection>; 3],
		embedder: Arc<dyn Embedder>,
		reranker: Option<Arc<dyn Reranker>>,
	) -> Self {
		let [passages, summaries, facts] = collections;

		Self {
			passages: SingleCollectionStore::new(
				CollectionKind::Passage,
				passages,
				embedder.clone(),
			),
			summaries: SingleCollectionStore::new(
				CollectionKind::Summary,
				summaries,
				embedder.clone(),
			),
			facts: SingleCollectionStore::new(CollectionKind::Fact, facts, embedder),
			reranker,
		}
	}

	/// Wires Qdrant collections and HTTP providers from configuration. Nothing is contacted
	/// until `initialize` runs.
	pub fn from_config(cfg: &Config) -> Result<Self> {
		let client = qdrant::connect(&cfg.storage.qdrant)?;
		let names = &cfg.storage.qdrant.collections;
		let collections: [Arc<dyn VectorCollection>; 3] = [
			Arc::new(QdrantCollection::new(client.clone(), names.passages.clone())),
			Arc::new(QdrantCollection::new(client.clone(), names.summaries.clone())),
			Arc::new(QdrantCollection::new(client, names.facts.clone())),
		];
		let embedder = Arc::new(HttpEmbedder::new(cfg.providers.embedding.clone()));
		let reranker = HttpReranker::from_config(&cfg.providers.rerank)
			.map(|reranker| Arc::new(reranker) as Arc<dyn Reranker>);

		Ok(Self::new(collections, embedder, reranker))
	}

	pub fn store(&self, kind: CollectionKind) -> &SingleCollectionStore {
		match kind {
			CollectionKind::Passage => &self.passages,
			CollectionKind::Summary => &self.summaries,
			CollectionKind::Fact => &self.facts,
		}
	}

	pub fn has_reranker(&self) -> bool {
		self.reranker.is_some()
	}
}
