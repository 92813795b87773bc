//! Greedy topic-quota selection over several ranked candidate lists.
//!
//! Each topic brings its own ranked list and a minimum number of entries it should
//! contribute. The selector repeatedly serves the topic furthest from its minimum, never emits
//! the same entity twice, and still credits a topic whose pick was already taken by another
//! topic.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::Candidate;

/// Anything the selector can rank and deduplicate.
pub trait Ranked {
	fn entity_id(&self) -> &str;

	/// Score used for the final output order, higher first.
	fn rank_score(&self) -> f32;
}
impl Ranked for Candidate {
	fn entity_id(&self) -> &str {
		self.passage_id()
	}

	fn rank_score(&self) -> f32 {
		Candidate::rank_score(self)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicCandidates<T> {
	pub topic: String,
	pub required: usize,
	/// Best first.
	pub candidates: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSatisfaction {
	pub topic: String,
	pub required: usize,
	pub satisfied: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Allocation<T> {
	/// Ordered by descending rank score.
	pub selected: Vec<T>,
	/// One entry per input topic, in input order.
	pub satisfaction: Vec<TopicSatisfaction>,
	/// Entity id to the topics that were credited with it, in crediting order.
	pub credited_by: HashMap<String, Vec<String>>,
}

/// Builds one duplicate-free output of at most `cap` entries that satisfies topic minimums
/// as far as the candidates allow.
pub fn allocate<T>(topics: Vec<TopicCandidates<T>>, cap: usize) -> Allocation<T>
where
	T: Ranked + Clone,
{
	let mut cursors = vec![0_usize; topics.len()];
	let mut satisfied = vec![0_usize; topics.len()];
	let mut seen = HashSet::new();
	let mut selected = Vec::new();
	let mut credited_by: HashMap<String, Vec<String>> = HashMap::new();

	while selected.len() < cap {
		let mut next: Option<(usize, usize)> = None;

		for (position, topic) in topics.iter().enumerate() {
			let deficit = topic.required.saturating_sub(satisfied[position]);

			if deficit == 0 || cursors[position] >= topic.candidates.len() {
				continue;
			}
			// Strictly greater: the first-listed topic wins a deficit tie.
			if next.is_none_or(|(_, best)| deficit > best) {
				next = Some((position, deficit));
			}
		}

		let Some((position, _)) = next else {
			break;
		};
		let topic = &topics[position];
		let candidate = &topic.candidates[cursors[position]];
		let entity_id = candidate.entity_id().to_string();

		cursors[position] += 1;
		satisfied[position] += 1;

		credited_by.entry(entity_id.clone()).or_default().push(topic.topic.clone());

		if seen.insert(entity_id) {
			selected.push(candidate.clone());
		}
	}

	selected.sort_by(|a, b| b.rank_score().total_cmp(&a.rank_score()));

	let satisfaction = topics
		.iter()
		.zip(satisfied)
		.map(|(topic, satisfied)| TopicSatisfaction {
			topic: topic.topic.clone(),
			required: topic.required,
			satisfied,
		})
		.collect();

	Allocation { selected, satisfaction, credited_by }
}

/// Splits `n_results_target` evenly; the first `n_results_target % topics` topics get one
/// extra. With more topics than the target the trailing topics get zero.
pub fn allocate_quotas(topic_count: usize, n_results_target: usize) -> Vec<usize> {
	if topic_count == 0 {
		return Vec::new();
	}

	let base = n_results_target / topic_count;
	let remainder = n_results_target % topic_count;

	(0..topic_count).map(|position| base + usize::from(position < remainder)).collect()
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	#[derive(Debug, Clone, PartialEq)]
	struct Item {
		id: String,
		score: f32,
	}
	impl Ranked for Item {
		fn entity_id(&self) -> &str {
			&self.id
		}

		fn rank_score(&self) -> f32 {
			self.score
		}
	}

	fn items(prefix: &str, scores: &[f32]) -> Vec<Item> {
		scores
			.iter()
			.enumerate()
			.map(|(n, score)| Item { id: format!("{prefix}{n}"), score: *score })
			.collect()
	}

	fn topic(name: &str, required: usize, candidates: Vec<Item>) -> TopicCandidates<Item> {
		TopicCandidates { topic: name.to_string(), required, candidates }
	}

	#[test]
	fn scarce_topic_contributes_everything_it_has() {
		let allocation = allocate(
			vec![
				topic("a", 2, items("a", &[0.9, 0.8, 0.7, 0.6, 0.5])),
				topic("b", 3, items("b", &[0.4, 0.3])),
			],
			6,
		);
		let ids = allocation.selected.iter().map(|item| item.id.as_str()).collect::<Vec<_>>();

		assert_eq!(ids, vec!["a0", "a1", "b0", "b1"]);
		assert_eq!(allocation.satisfaction[0].satisfied, 2);
		assert_eq!(allocation.satisfaction[1].satisfied, 2);
	}

	#[test]
	fn shared_entity_is_emitted_once_and_credits_both_topics() {
		let shared = Item { id: "shared".to_string(), score: 0.9 };
		let allocation = allocate(
			vec![
				topic("a", 1, vec![shared.clone()]),
				topic("b", 2, vec![shared, Item { id: "b1".to_string(), score: 0.2 }]),
			],
			10,
		);

		assert_eq!(allocation.selected.len(), 2);
		assert_eq!(allocation.credited_by["shared"], vec!["b".to_string(), "a".to_string()]);
		assert!(allocation.satisfaction.iter().all(|s| s.satisfied == s.required));
	}

	#[test]
	fn deficit_ties_go_to_the_first_topic() {
		let allocation = allocate(
			vec![topic("a", 1, items("a", &[0.1])), topic("b", 1, items("b", &[0.9]))],
			1,
		);

		assert_eq!(allocation.selected[0].id, "a0");
	}

	#[test]
	fn output_is_ordered_by_score_not_selection() {
		let allocation = allocate(
			vec![topic("a", 3, items("a", &[0.2, 0.1])), topic("b", 1, items("b", &[0.95]))],
			5,
		);
		let scores = allocation.selected.iter().map(|item| item.score).collect::<Vec<_>>();

		assert_eq!(scores, vec![0.95, 0.2, 0.1]);
	}

	#[test]
	fn quotas_split_evenly_with_leading_remainder() {
		assert_eq!(allocate_quotas(3, 10), vec![4, 3, 3]);
		assert_eq!(allocate_quotas(4, 2), vec![1, 1, 0, 0]);
		assert_eq!(allocate_quotas(2, 6), vec![3, 3]);
		assert!(allocate_quotas(0, 5).is_empty());
	}

	proptest! {
		#[test]
		fn allocation_is_bounded_and_duplicate_free(
			lists in prop::collection::vec(
				(0_usize..5, prop::collection::vec((0_u8..12, 0.0_f32..1.0), 0..8)),
				1..5,
			),
			cap in 0_usize..12,
		) {
			let topics = lists
				.into_iter()
				.enumerate()
				.map(|(n, (required, raw))| TopicCandidates {
					topic: format!("t{n}"),
					required,
					candidates: raw
						.into_iter()
						.map(|(id, score)| Item { id: format!("e{id}"), score })
						.collect(),
				})
				.collect::<Vec<_>>();
			let allocation = allocate(topics.clone(), cap);
			let ids = allocation.selected.iter().map(|item| item.id.clone()).collect::<HashSet<_>>();

			prop_assert!(allocation.selected.len() <= cap);
			prop_assert_eq!(ids.len(), allocation.selected.len());

			for (topic, satisfaction) in topics.iter().zip(&allocation.satisfaction) {
				prop_assert!(satisfaction.satisfied <= topic.required);
				prop_assert!(satisfaction.satisfied <= topic.candidates.len());
			}
			for pair in allocation.selected.windows(2) {
				prop_assert!(pair[0].score >= pair[1].score);
			}
		}

		#[test]
		fn quotas_always_sum_to_the_target(topics in 1_usize..20, target in 0_usize..100) {
			let quotas = allocate_quotas(topics, target);

			prop_assert_eq!(quotas.len(), topics);
			prop_assert_eq!(quotas.iter().sum::<usize>(), target);
		}
	}
}
