use std::sync::{
	Mutex,
	atomic::{AtomicUsize, Ordering},
};

use prism_providers::{
	Error as ProviderError, Result as ProviderResult,
	rerank::{RerankResponse, RerankResult},
};
use prism_service::{BoxFuture, Embedder, Reranker};

/// Bag-of-words embedder: one dimension per vocabulary term, case-insensitive.
///
/// Words outside the vocabulary are ignored, so unrelated texts embed to the zero vector.
#[derive(Debug)]
pub struct KeywordEmbedder {
	vocabulary: Vec<String>,
	calls: AtomicUsize,
}
impl KeywordEmbedder {
	pub fn new(vocabulary: &[&str]) -> Self {
		Self {
			vocabulary: vocabulary.iter().map(|term| term.to_lowercase()).collect(),
			calls: AtomicUsize::new(0),
		}
	}

	/// Number of embedding requests served, batches counted once.
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn vector(&self, text: &str) -> Vec<f32> {
		let mut vector = vec![0.0; self.vocabulary.len()];

		for word in text.split(|ch: char| !ch.is_alphanumeric()).filter(|word| !word.is_empty()) {
			let word = word.to_lowercase();

			if let Some(position) = self.vocabulary.iter().position(|term| *term == word) {
				vector[position] += 1.0;
			}
		}

		vector
	}
}

impl Embedder for KeywordEmbedder {
	fn dimension(&self) -> u32 {
		self.vocabulary.len() as u32
	}

	fn embed_batch<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<Vec<f32>>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Ok(texts.iter().map(|text| self.vector(text)).collect())
		})
	}
}

/// Embedder that fails every request.
#[derive(Debug)]
pub struct FailingEmbedder {
	dimension: u32,
}
impl FailingEmbedder {
	pub fn new(dimension: u32) -> Self {
		Self { dimension }
	}
}

impl Embedder for FailingEmbedder {
	fn dimension(&self) -> u32 {
		self.dimension
	}

	fn embed_batch<'a>(
		&'a self,
		_texts: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<Vec<f32>>>> {
		Box::pin(async {
			Err(ProviderError::InvalidResponse {
				message: "Embedding provider unavailable.".to_string(),
			})
		})
	}
}

type ScoreFn = Box<dyn Fn(&str, &str) -> f32 + Send + Sync>;

enum Script {
	Scores(ScoreFn),
	Fixed(Vec<RerankResult>),
	Failing,
}

/// Reranker with scripted answers that records how it was called.
pub struct ScriptedReranker {
	script: Script,
	billed_units: u64,
	calls: AtomicUsize,
	top_n: Mutex<Vec<usize>>,
	documents: Mutex<Vec<Vec<String>>>,
}
impl ScriptedReranker {
	/// Scores each document with `score(query, document)`, returning the best `top_n`.
	pub fn scoring<F>(score: F) -> Self
	where
		F: Fn(&str, &str) -> f32 + Send + Sync + 'static,
	{
		Self::with_script(Script::Scores(Box::new(score)))
	}

	/// Returns `results` verbatim, however malformed.
	pub fn fixed(results: Vec<RerankResult>) -> Self {
		Self::with_script(Script::Fixed(results))
	}

	pub fn failing() -> Self {
		Self::with_script(Script::Failing)
	}

	pub fn with_billed_units(mut self, billed_units: u64) -> Self {
		self.billed_units = billed_units;

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	/// `top_n` of every call, in call order.
	pub fn top_n_history(&self) -> Vec<usize> {
		self.top_n.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	/// Documents of every call, in call order.
	pub fn document_history(&self) -> Vec<Vec<String>> {
		self.documents.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	fn with_script(script: Script) -> Self {
		Self {
			script,
			billed_units: 1,
			calls: AtomicUsize::new(0),
			top_n: Mutex::new(Vec::new()),
			documents: Mutex::new(Vec::new()),
		}
	}

	fn respond(
		&self,
		query: &str,
		docs: &[String],
		top_n: usize,
	) -> ProviderResult<RerankResponse> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.top_n.lock().unwrap_or_else(|err| err.into_inner()).push(top_n);
		self.documents.lock().unwrap_or_else(|err| err.into_inner()).push(docs.to_vec());

		let results = match &self.script {
			Script::Scores(score) => {
				let mut results = docs
					.iter()
					.enumerate()
					.map(|(index, doc)| RerankResult { index, relevance_score: score(query, doc) })
					.collect::<Vec<_>>();

				results.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
				results.truncate(top_n);

				results
			},
			Script::Fixed(results) => results.clone(),
			Script::Failing =>
				return Err(ProviderError::InvalidResponse {
					message: "Rerank provider unavailable.".to_string(),
				}),
		};

		Ok(RerankResponse { results, billed_units: self.billed_units })
	}
}

impl Reranker for ScriptedReranker {
	fn rerank<'a>(
		&'a self,
		query: &'a str,
		docs: &'a [String],
		top_n: usize,
	) -> BoxFuture<'a, ProviderResult<RerankResponse>> {
		Box::pin(async move { self.respond(query, docs, top_n) })
	}
}
