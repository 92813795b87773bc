use std::collections::HashSet;

use futures::future;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use prism_domain::CollectionKind;

use crate::{
	Candidate, Error, MultiCollectionRetriever, PerCollectionConfig, RerankOptions, Result,
	RetrievalSources, TopicCandidates, TopicSatisfaction, allocate, allocate_quotas,
	search::{Merger, SearchPlan, into_candidates, rerank_candidates, sort_by_vector_score},
};

/// A named information need with one or more query reformulations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
	pub name: String,
	pub queries: Vec<String>,
}
impl Topic {
	fn usable_queries(&self) -> impl Iterator<Item = &str> {
		self.queries.iter().map(String::as_str).filter(|query| !query.trim().is_empty())
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicSearchRequest {
	pub topics: Vec<Topic>,
	pub collections: Vec<CollectionKind>,
	pub per_collection: PerCollectionConfig,
	pub rerank: Option<RerankOptions>,
	pub n_results_target: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSearchResponse {
	pub results: Vec<Candidate>,
	pub retrieval_sources: RetrievalSources,
	pub topics: Vec<TopicSatisfaction>,
	pub reranking_cost: Option<f64>,
	#[serde(with = "crate::time_serde")]
	pub timestamp: OffsetDateTime,
}

impl MultiCollectionRetriever {
	/// Searches every topic's queries concurrently, then allocates a shared result budget so
	/// each topic gets its quota where candidates allow.
	pub async fn search_topics(&self, req: &TopicSearchRequest) -> Result<TopicSearchResponse> {
		validate_topics(&req.topics)?;

		let plan = SearchPlan::new(&req.collections, &req.per_collection, req.n_results_target)?;
		let rerank = self.rerank_options(req.rerank)?;
		let cap = req.n_results_target as usize;
		let quotas = allocate_quotas(req.topics.len(), cap);

		if plan.is_empty() {
			return Ok(empty_response(&req.topics, &quotas));
		}

		let plan = &plan;
		let searches = req.topics.iter().enumerate().flat_map(|(position, topic)| {
			topic.usable_queries().map(move |query| async move {
				self.search_branches(query, plan).await.map(|hits| (position, hits))
			})
		});
		let outcomes = future::try_join_all(searches).await?;
		let mut mergers = req.topics.iter().map(|_| Merger::default()).collect::<Vec<_>>();

		for (position, hits) in outcomes {
			hits.merge_into(&mut mergers[position], plan);
		}

		let mut seen = HashSet::new();
		let passage_ids = mergers
			.iter()
			.flat_map(Merger::passage_ids)
			.filter(|id| seen.insert(id.clone()))
			.collect::<Vec<_>>();

		if passage_ids.is_empty() {
			return Ok(empty_response(&req.topics, &quotas));
		}

		let enriched = self.reconstruct(&passage_ids).await?;
		let ranked =
			req.topics.iter().zip(mergers).zip(&quotas).map(|((topic, merger), required)| {
				let candidates = into_candidates(merger.into_resolved(), &enriched);

				self.rank_topic(topic, *required, candidates, plan, rerank)
			});
		let ranked = future::try_join_all(ranked).await?;
		let mut billed = None;
		let mut topic_lists = Vec::with_capacity(ranked.len());

		for (candidates, billed_units) in ranked {
			if let Some(units) = billed_units {
				billed = Some(billed.unwrap_or(0) + units);
			}

			topic_lists.push(candidates);
		}

		let allocation = allocate(topic_lists, cap);
		let reranking_cost = rerank.zip(billed).map(|(options, units)| options.cost(units));

		tracing::info!(
			topics = req.topics.len(),
			resolved = passage_ids.len(),
			reranked = reranking_cost.is_some(),
			results = allocation.selected.len(),
			"Topic search completed."
		);

		Ok(TopicSearchResponse {
			retrieval_sources: RetrievalSources::count(&allocation.selected),
			results: allocation.selected,
			topics: allocation.satisfaction,
			reranking_cost,
			timestamp: OffsetDateTime::now_utc(),
		})
	}

	/// Orders one topic's candidates, reranking them against the topic's first query when
	/// the topic has a quota and more was fetched than that quota.
	async fn rank_topic(
		&self,
		topic: &Topic,
		required: usize,
		mut candidates: Vec<Candidate>,
		plan: &SearchPlan,
		rerank: Option<RerankOptions>,
	) -> Result<(TopicCandidates<Candidate>, Option<u64>)> {
		let fetched = (plan.total_top_k as usize).saturating_mul(topic.usable_queries().count());
		let mut billed_units = None;

		sort_by_vector_score(&mut candidates);

		if rerank.is_some() && required > 0 && fetched > required && !candidates.is_empty() {
			let canonical_query = topic.usable_queries().next().unwrap_or_default();
			let top_n = candidates.len();
			let (reranked, units) =
				rerank_candidates(self.require_reranker()?, canonical_query, candidates, top_n)
					.await?;

			candidates = reranked;
			billed_units = Some(units);
		}

		Ok((TopicCandidates { topic: topic.name.clone(), required, candidates }, billed_units))
	}
}

fn validate_topics(topics: &[Topic]) -> Result<()> {
	if topics.is_empty() {
		return Err(Error::InvalidRequest {
			message: "At least one topic is required.".to_string(),
		});
	}

	for topic in topics {
		if topic.usable_queries().next().is_none() {
			return Err(Error::InvalidRequest {
				message: format!("Topic {:?} has no non-blank query.", topic.name),
			});
		}
	}

	Ok(())
}

fn empty_response(topics: &[Topic], quotas: &[usize]) -> TopicSearchResponse {
	TopicSearchResponse {
		results: Vec::new(),
		retrieval_sources: RetrievalSources::default(),
		topics: topics
			.iter()
			.zip(quotas)
			.map(|(topic, required)| TopicSatisfaction {
				topic: topic.name.clone(),
				required: *required,
				satisfied: 0,
			})
			.collect(),
		reranking_cost: None,
		timestamp: OffsetDateTime::now_utc(),
	}
}
