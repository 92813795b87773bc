mod merge;
mod reconstruct;
mod rerank;

pub(crate) use merge::{Merger, Resolved};
pub(crate) use reconstruct::into_candidates;
pub(crate) use rerank::rerank_candidates;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use prism_config::{CollectionSearch, Config, Retrieval};
use prism_domain::{CollectionKind, EnrichedPassage};

use crate::{Error, MultiCollectionRetriever, Result, StoreHit};

pub const DEFAULT_N_RESULTS_TARGET: u32 = 10;

/// Resolved search settings for one collection kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollectionSearchConfig {
	pub top_k: u32,
	pub min_similarity: f32,
}
impl CollectionSearchConfig {
	pub const fn defaults(kind: CollectionKind) -> Self {
		match kind {
			CollectionKind::Passage => Self { top_k: 8, min_similarity: 0.3 },
			CollectionKind::Summary => Self { top_k: 8, min_similarity: 0.3 },
			CollectionKind::Fact => Self { top_k: 10, min_similarity: 0.5 },
		}
	}

	pub fn resolve(kind: CollectionKind, overrides: CollectionSearch) -> Self {
		let defaults = Self::defaults(kind);

		Self {
			top_k: overrides.top_k.unwrap_or(defaults.top_k),
			min_similarity: overrides.min_similarity.unwrap_or(defaults.min_similarity),
		}
	}
}

/// Optional per-kind overrides; unset fields use [`CollectionSearchConfig::defaults`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerCollectionConfig {
	pub passage: CollectionSearch,
	pub summary: CollectionSearch,
	pub fact: CollectionSearch,
}
impl PerCollectionConfig {
	pub fn overrides(&self, kind: CollectionKind) -> CollectionSearch {
		match kind {
			CollectionKind::Passage => self.passage,
			CollectionKind::Summary => self.summary,
			CollectionKind::Fact => self.fact,
		}
	}

	pub fn resolve(&self, kind: CollectionKind) -> CollectionSearchConfig {
		CollectionSearchConfig::resolve(kind, self.overrides(kind))
	}
}
impl From<&Retrieval> for PerCollectionConfig {
	fn from(retrieval: &Retrieval) -> Self {
		Self { passage: retrieval.passage, summary: retrieval.summary, fact: retrieval.fact }
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankOptions {
	pub enabled: bool,
	pub price_per_thousand_units: f64,
}
impl RerankOptions {
	pub fn cost(&self, billed_units: u64) -> f64 {
		billed_units as f64 / 1_000.0 * self.price_per_thousand_units
	}
}
impl From<&prism_config::Rerank> for RerankOptions {
	fn from(rerank: &prism_config::Rerank) -> Self {
		Self { enabled: rerank.enabled, price_per_thousand_units: rerank.price_per_thousand_units }
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
	pub query: String,
	pub collections: Vec<CollectionKind>,
	pub per_collection: PerCollectionConfig,
	pub rerank: Option<RerankOptions>,
	pub n_results_target: u32,
}
impl SearchRequest {
	/// All three collections, default thresholds, no reranking.
	pub fn new(query: impl Into<String>) -> Self {
		Self {
			query: query.into(),
			collections: CollectionKind::ALL.to_vec(),
			per_collection: PerCollectionConfig::default(),
			rerank: None,
			n_results_target: DEFAULT_N_RESULTS_TARGET,
		}
	}

	pub fn from_config(query: impl Into<String>, cfg: &Config) -> Self {
		Self {
			per_collection: PerCollectionConfig::from(&cfg.retrieval),
			rerank: Some(RerankOptions::from(&cfg.rerank)),
			n_results_target: cfg.retrieval.n_results_target,
			..Self::new(query)
		}
	}
}

/// One retrieved passage with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
	pub passage: EnrichedPassage,
	pub vector_score: f32,
	pub distance: f32,
	pub found_via: CollectionKind,
	pub rerank_score: Option<f32>,
	/// Literal fact text when the best hit came from the fact collection.
	pub matched_fact_text: Option<String>,
}
impl Candidate {
	pub fn passage_id(&self) -> &str {
		&self.passage.passage.id
	}

	/// Rerank score when present, vector score otherwise.
	pub fn rank_score(&self) -> f32 {
		self.rerank_score.unwrap_or(self.vector_score)
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalSources {
	pub from_passages: u32,
	pub from_summaries: u32,
	pub from_facts: u32,
}
impl RetrievalSources {
	pub fn count(candidates: &[Candidate]) -> Self {
		let mut sources = Self::default();

		for candidate in candidates {
			match candidate.found_via {
				CollectionKind::Passage => sources.from_passages += 1,
				CollectionKind::Summary => sources.from_summaries += 1,
				CollectionKind::Fact => sources.from_facts += 1,
			}
		}

		sources
	}

	pub fn total(&self) -> u32 {
		self.from_passages + self.from_summaries + self.from_facts
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
	pub results: Vec<Candidate>,
	pub retrieval_sources: RetrievalSources,
	/// Present only when the reranker ran.
	pub reranking_cost: Option<f64>,
	#[serde(with = "crate::time_serde")]
	pub timestamp: OffsetDateTime,
}
impl SearchResponse {
	fn empty() -> Self {
		Self {
			results: Vec::new(),
			retrieval_sources: RetrievalSources::default(),
			reranking_cost: None,
			timestamp: OffsetDateTime::now_utc(),
		}
	}
}

/// Validated request shape: requested kinds in fixed scan order with resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SearchPlan {
	pub(crate) branches: Vec<(CollectionKind, CollectionSearchConfig)>,
	pub(crate) total_top_k: u32,
	pub(crate) n_results_target: u32,
}
impl SearchPlan {
	pub(crate) fn new(
		collections: &[CollectionKind],
		per_collection: &PerCollectionConfig,
		n_results_target: u32,
	) -> Result<Self> {
		if n_results_target == 0 {
			return Err(Error::InvalidRequest {
				message: "n_results_target must be greater than zero.".to_string(),
			});
		}

		for (position, kind) in collections.iter().enumerate() {
			if collections[..position].contains(kind) {
				return Err(Error::InvalidRequest {
					message: format!("Search collections must not repeat {kind}."),
				});
			}
		}
		for kind in CollectionKind::ALL {
			if let Some(min_similarity) = per_collection.overrides(kind).min_similarity
				&& (!min_similarity.is_finite() || min_similarity < 0.0)
			{
				return Err(Error::InvalidRequest {
					message: format!(
						"{kind}.min_similarity must be a finite number of zero or greater."
					),
				});
			}
		}

		let branches = CollectionKind::ALL
			.into_iter()
			.filter(|kind| collections.contains(kind))
			.map(|kind| (kind, per_collection.resolve(kind)))
			.collect::<Vec<_>>();
		let total_top_k =
			branches.iter().fold(0_u32, |total, (_, cfg)| total.saturating_add(cfg.top_k));

		Ok(Self { branches, total_top_k, n_results_target: n_results_target.min(total_top_k) })
	}

	pub(crate) fn config(&self, kind: CollectionKind) -> Option<CollectionSearchConfig> {
		self.branches.iter().find(|(branch, _)| *branch == kind).map(|(_, cfg)| *cfg)
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.total_top_k == 0
	}

	/// Reranking only pays off when more candidates were fetched than will be returned.
	pub(crate) fn rerank_worthwhile(&self) -> bool {
		self.total_top_k > self.n_results_target
	}
}

/// Raw hits of one query, one list per collection kind.
pub(crate) struct BranchHits {
	pub(crate) passages: Vec<StoreHit>,
	pub(crate) summaries: Vec<StoreHit>,
	pub(crate) facts: Vec<StoreHit>,
}
impl BranchHits {
	pub(crate) fn counts(&self) -> [usize; 3] {
		[self.passages.len(), self.summaries.len(), self.facts.len()]
	}

	/// Folds every hit into `merger` in scan order: passages, summaries, facts.
	pub(crate) fn merge_into(self, merger: &mut Merger, plan: &SearchPlan) {
		for (kind, hits) in [
			(CollectionKind::Passage, self.passages),
			(CollectionKind::Summary, self.summaries),
			(CollectionKind::Fact, self.facts),
		] {
			if let Some(cfg) = plan.config(kind) {
				merger.absorb(kind, hits, cfg.min_similarity);
			}
		}
	}
}

impl MultiCollectionRetriever {
	/// Queries the requested collections concurrently, merges hits per passage, and returns
	/// the best `n_results_target` passages.
	pub async fn search(&self, req: &SearchRequest) -> Result<SearchResponse> {
		let plan = SearchPlan::new(&req.collections, &req.per_collection, req.n_results_target)?;
		let rerank = self.rerank_options(req.rerank)?;
		let mut trace = SearchTrace::new(&req.query, &plan);

		if plan.is_empty() {
			trace.emit(0);

			return Ok(SearchResponse::empty());
		}

		let branches = self.search_branches(&req.query, &plan).await?;
		let mut merger = Merger::default();

		trace.hits = branches.counts();

		branches.merge_into(&mut merger, &plan);

		trace.resolved = merger.len();

		if merger.is_empty() {
			trace.emit(0);

			return Ok(SearchResponse::empty());
		}

		let enriched = self.reconstruct(&merger.passage_ids()).await?;
		let mut candidates = into_candidates(merger.into_resolved(), &enriched);
		let mut reranking_cost = None;

		sort_by_vector_score(&mut candidates);

		if let Some(options) = rerank
			&& plan.rerank_worthwhile()
			&& !candidates.is_empty()
		{
			let (reranked, billed_units) = rerank_candidates(
				self.require_reranker()?,
				&req.query,
				candidates,
				plan.n_results_target as usize,
			)
			.await?;

			candidates = reranked;
			reranking_cost = Some(options.cost(billed_units));
			trace.reranked = true;
		}

		candidates.truncate(plan.n_results_target as usize);
		trace.emit(candidates.len());

		Ok(SearchResponse {
			retrieval_sources: RetrievalSources::count(&candidates),
			results: candidates,
			reranking_cost,
			timestamp: OffsetDateTime::now_utc(),
		})
	}

	/// Enabled options, after checking a reranker is available to honor them.
	pub(crate) fn rerank_options(
		&self,
		rerank: Option<RerankOptions>,
	) -> Result<Option<RerankOptions>> {
		let Some(options) = rerank.filter(|options| options.enabled) else {
			return Ok(None);
		};

		self.require_reranker()?;

		Ok(Some(options))
	}

	pub(crate) fn require_reranker(&self) -> Result<&dyn crate::Reranker> {
		self.reranker.as_deref().ok_or_else(|| Error::Configuration {
			message: "Reranking is enabled but no rerank provider credentials are configured."
				.to_string(),
		})
	}

	/// One embed plus nearest-neighbor query per requested kind, all in flight together.
	pub(crate) async fn search_branches(
		&self,
		query: &str,
		plan: &SearchPlan,
	) -> Result<BranchHits> {
		let branch = |kind: CollectionKind| async move {
			match plan.config(kind) {
				Some(cfg) => self.store(kind).search(query, cfg.top_k).await,
				None => Ok(Vec::new()),
			}
		};
		let (passages, summaries, facts) = tokio::try_join!(
			branch(CollectionKind::Passage),
			branch(CollectionKind::Summary),
			branch(CollectionKind::Fact),
		)?;

		Ok(BranchHits { passages, summaries, facts })
	}
}

/// Stable: equal scores keep discovery order.
pub(crate) fn sort_by_vector_score(candidates: &mut [Candidate]) {
	candidates.sort_by(|a, b| b.vector_score.total_cmp(&a.vector_score));
}

struct SearchTrace {
	query_len: usize,
	collections: String,
	hits: [usize; 3],
	resolved: usize,
	reranked: bool,
}
impl SearchTrace {
	fn new(query: &str, plan: &SearchPlan) -> Self {
		let collections = plan
			.branches
			.iter()
			.map(|(kind, _)| kind.as_str())
			.collect::<Vec<_>>()
			.join(",");

		Self {
			query_len: query.chars().count(),
			collections,
			hits: [0; 3],
			resolved: 0,
			reranked: false,
		}
	}

	fn emit(&self, results: usize) {
		tracing::info!(
			query_len = self.query_len,
			collections = self.collections.as_str(),
			passage_hits = self.hits[0],
			summary_hits = self.hits[1],
			fact_hits = self.hits[2],
			resolved = self.resolved,
			reranked = self.reranked,
			results,
			"Multi-collection search completed."
		);
	}
}
