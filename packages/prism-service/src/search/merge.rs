use std::collections::HashMap;

use prism_domain::CollectionKind;

use crate::StoreHit;

/// Best evidence seen so far for one passage.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Resolved {
	pub(crate) passage_id: String,
	pub(crate) score: f32,
	pub(crate) distance: f32,
	pub(crate) found_via: CollectionKind,
	pub(crate) matched_fact_text: Option<String>,
}
impl Resolved {
	fn from_hit(kind: CollectionKind, hit: StoreHit) -> Option<Self> {
		let passage_id = match kind {
			CollectionKind::Passage => hit.record.id,
			CollectionKind::Summary | CollectionKind::Fact => {
				let Some(parent) = hit.record.metadata.parent_passage_id else {
					tracing::warn!(
						kind = kind.as_str(),
						record_id = hit.record.id.as_str(),
						"Hit without a parent passage skipped."
					);

					return None;
				};

				parent
			},
		};
		let matched_fact_text = (kind == CollectionKind::Fact).then_some(hit.record.document);

		Some(Self {
			passage_id,
			score: hit.score,
			distance: hit.distance,
			found_via: kind,
			matched_fact_text,
		})
	}

	fn beats(&self, other: &Self) -> bool {
		self.score > other.score
			|| (self.score == other.score
				&& self.found_via.tie_priority() > other.found_via.tie_priority())
	}
}

/// Keeps one entry per passage id, in first-discovery order, holding its best hit.
#[derive(Debug, Default)]
pub(crate) struct Merger {
	order: Vec<String>,
	best: HashMap<String, Resolved>,
}
impl Merger {
	/// Drops hits under `min_similarity`, then folds the rest in.
	pub(crate) fn absorb(
		&mut self,
		kind: CollectionKind,
		hits: Vec<StoreHit>,
		min_similarity: f32,
	) {
		for hit in hits {
			if hit.score < min_similarity {
				continue;
			}
			if let Some(resolved) = Resolved::from_hit(kind, hit) {
				self.offer(resolved);
			}
		}
	}

	pub(crate) fn offer(&mut self, resolved: Resolved) {
		match self.best.get_mut(&resolved.passage_id) {
			Some(existing) =>
				if resolved.beats(existing) {
					*existing = resolved;
				},
			None => {
				self.order.push(resolved.passage_id.clone());
				self.best.insert(resolved.passage_id.clone(), resolved);
			},
		}
	}

	pub(crate) fn len(&self) -> usize {
		self.order.len()
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.order.is_empty()
	}

	pub(crate) fn passage_ids(&self) -> Vec<String> {
		self.order.clone()
	}

	pub(crate) fn into_resolved(mut self) -> Vec<Resolved> {
		self.order.iter().filter_map(|id| self.best.remove(id)).collect()
	}
}
