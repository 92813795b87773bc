use std::collections::HashMap;

use prism_domain::{EnrichedPassage, Passage, summary_id};
use prism_storage::{Selector, StoredRecord};

use crate::{Candidate, MultiCollectionRetriever, Result, search::Resolved};

impl MultiCollectionRetriever {
	/// Fetches passages, summaries, and facts for `passage_ids` concurrently.
	pub(crate) async fn reconstruct(
		&self,
		passage_ids: &[String],
	) -> Result<HashMap<String, EnrichedPassage>> {
		let by_id = Selector::Ids(passage_ids.to_vec());
		let by_parent = Selector::ParentPassages(passage_ids.to_vec());
		let (passages, summaries, facts) = tokio::try_join!(
			self.passages.get(&by_id),
			self.summaries.get(&by_parent),
			self.facts.get(&by_parent),
		)?;

		Ok(assemble(passages, summaries, facts))
	}
}

/// Joins resolved hits with their reconstructed passages, keeping resolution order.
pub(crate) fn into_candidates(
	resolved: Vec<Resolved>,
	enriched: &HashMap<String, EnrichedPassage>,
) -> Vec<Candidate> {
	resolved
		.into_iter()
		.filter_map(|resolved| {
			let Some(passage) = enriched.get(&resolved.passage_id) else {
				tracing::warn!(
					passage_id = resolved.passage_id.as_str(),
					found_via = resolved.found_via.as_str(),
					"Resolved passage is missing from the passage collection."
				);

				return None;
			};

			Some(Candidate {
				passage: passage.clone(),
				vector_score: resolved.score,
				distance: resolved.distance,
				found_via: resolved.found_via,
				rerank_score: None,
				matched_fact_text: resolved.matched_fact_text,
			})
		})
		.collect()
}

pub(crate) fn assemble(
	passages: Vec<StoredRecord>,
	summaries: Vec<StoredRecord>,
	facts: Vec<StoredRecord>,
) -> HashMap<String, EnrichedPassage> {
	let mut summary_by_parent: HashMap<String, StoredRecord> = HashMap::new();

	for summary in summaries {
		let Some(parent) = summary.metadata.parent_passage_id.clone() else {
			continue;
		};
		let canonical = summary.id == summary_id(&parent);
		// Prefer the `{passage_id}_summary` record when several point at one passage.
		let keep_existing = summary_by_parent
			.get(&parent)
			.is_some_and(|existing| existing.id == summary_id(&parent) || !canonical);

		if !keep_existing {
			summary_by_parent.insert(parent, summary);
		}
	}

	let mut facts_by_parent: HashMap<String, Vec<StoredRecord>> = HashMap::new();

	for fact in facts {
		if let Some(parent) = fact.metadata.parent_passage_id.clone() {
			facts_by_parent.entry(parent).or_default().push(fact);
		}
	}

	passages
		.into_iter()
		.map(|record| {
			let summary = summary_by_parent.remove(&record.id).map(|summary| summary.document);
			let mut facts = facts_by_parent.remove(&record.id).unwrap_or_default();

			facts.sort_by(|a, b| {
				fact_number(&record.id, &a.id)
					.cmp(&fact_number(&record.id, &b.id))
					.then_with(|| a.id.cmp(&b.id))
			});

			let passage = Passage {
				parent_document_id: record.metadata.parent_document_id,
				index: record.metadata.index,
				text: record.document,
				metadata: record.metadata.document,
				id: record.id,
			};

			(
				passage.id.clone(),
				EnrichedPassage {
					passage,
					summary,
					facts: facts.into_iter().map(|fact| fact.document).collect(),
				},
			)
		})
		.collect()
}

/// Position parsed from `{passage_id}_fact_{n}`; unparseable ids sort last.
fn fact_number(passage_id: &str, fact_id: &str) -> usize {
	fact_id
		.strip_prefix(passage_id)
		.and_then(|rest| rest.strip_prefix("_fact_"))
		.and_then(|n| n.parse().ok())
		.unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
	use prism_domain::CollectionKind;
	use prism_storage::RecordMetadata;

	use super::*;

	fn record(id: &str, parent: Option<&str>, document: &str) -> StoredRecord {
		StoredRecord {
			id: id.to_string(),
			document: document.to_string(),
			metadata: RecordMetadata {
				parent_document_id: "doc".to_string(),
				parent_passage_id: parent.map(str::to_string),
				index: 2,
				..RecordMetadata::default()
			},
		}
	}

	#[test]
	fn attaches_summary_and_ordered_facts() {
		let enriched = assemble(
			vec![record("p1", None, "Body."), record("p2", None, "Other.")],
			vec![record("p1_summary", Some("p1"), "Sum.")],
			vec![
				record("p1_fact_10", Some("p1"), "Tenth."),
				record("p1_fact_2", Some("p1"), "Second."),
				record("p1_fact_0", Some("p1"), "First."),
			],
		);
		let p1 = &enriched["p1"];

		assert_eq!(p1.passage.text, "Body.");
		assert_eq!(p1.passage.index, 2);
		assert_eq!(p1.summary.as_deref(), Some("Sum."));
		assert_eq!(p1.facts, vec!["First.", "Second.", "Tenth."]);
		assert!(enriched["p2"].summary.is_none());
		assert!(enriched["p2"].facts.is_empty());
	}

	#[test]
	fn missing_passages_are_dropped_from_candidates() {
		let enriched = assemble(vec![record("p1", None, "Body.")], Vec::new(), Vec::new());
		let resolved = vec![
			Resolved {
				passage_id: "gone".to_string(),
				score: 0.9,
				distance: 0.1,
				found_via: CollectionKind::Summary,
				matched_fact_text: None,
			},
			Resolved {
				passage_id: "p1".to_string(),
				score: 0.5,
				distance: 0.5,
				found_via: CollectionKind::Passage,
				matched_fact_text: None,
			},
		];
		let candidates = into_candidates(resolved, &enriched);

		assert_eq!(candidates.len(), 1);
		assert_eq!(candidates[0].passage_id(), "p1");
	}
}
