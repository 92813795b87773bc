use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub rerank: Rerank,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub vector_dim: u32,
	pub collections: Collections,
}

/// Names of the three backing collections. They share one metadata namespace.
#[derive(Debug, Clone, Deserialize)]
pub struct Collections {
	pub passages: String,
	pub summaries: String,
	pub facts: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: RerankProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RerankProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	/// Optional. Reranking stays unavailable while this is unset.
	pub api_key: Option<String>,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub n_results_target: u32,
	pub passage: CollectionSearch,
	pub summary: CollectionSearch,
	pub fact: CollectionSearch,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			n_results_target: 10,
			passage: CollectionSearch::default(),
			summary: CollectionSearch::default(),
			fact: CollectionSearch::default(),
		}
	}
}

/// Per-collection overrides. Unset fields fall back to the retriever's per-kind defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CollectionSearch {
	pub top_k: Option<u32>,
	pub min_similarity: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Rerank {
	pub enabled: bool,
	pub price_per_thousand_units: f64,
}
impl Default for Rerank {
	fn default() -> Self {
		Self { enabled: false, price_per_thousand_units: 2.0 }
	}
}
