use crate::{Candidate, Reranker, Result};

/// Reorders `candidates` by the reranker's relevance. Candidates it does not return are dropped.
///
/// Returns the reranked candidates and the billed search units.
pub(crate) async fn rerank_candidates(
	reranker: &dyn Reranker,
	query: &str,
	candidates: Vec<Candidate>,
	top_n: usize,
) -> Result<(Vec<Candidate>, u64)> {
	let docs = candidates
		.iter()
		.map(|candidate| candidate.passage.enriched_text())
		.collect::<Vec<_>>();
	let response = reranker.rerank(query, &docs, top_n).await?;
	let mut slots = candidates.into_iter().map(Some).collect::<Vec<_>>();
	let mut reranked = Vec::with_capacity(response.results.len());

	for result in &response.results {
		if !result.relevance_score.is_finite() {
			return Err(malformed(format!(
				"Rerank score for document {} is not finite.",
				result.index
			)));
		}

		let Some(slot) = slots.get_mut(result.index) else {
			return Err(malformed(format!(
				"Rerank index {} is out of range for {} documents.",
				result.index,
				docs.len()
			)));
		};
		let Some(mut candidate) = slot.take() else {
			return Err(malformed(format!("Rerank index {} was returned twice.", result.index)));
		};

		candidate.rerank_score = Some(result.relevance_score);

		reranked.push(candidate);
	}

	reranked.sort_by(|a, b| b.rank_score().total_cmp(&a.rank_score()));

	tracing::debug!(
		documents = docs.len(),
		returned = reranked.len(),
		billed_units = response.billed_units,
		"Candidates reranked."
	);

	Ok((reranked, response.billed_units))
}

fn malformed(message: String) -> crate::Error {
	prism_providers::Error::InvalidResponse { message }.into()
}
