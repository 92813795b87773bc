use prism_domain::{AnalyzedPassage, CollectionKind, DocumentMetadata, Segment};
use prism_storage::Selector;

use crate::{MultiCollectionRetriever, Result};

impl MultiCollectionRetriever {
	/// Ensures all three collections exist. Safe to call repeatedly.
	pub async fn initialize(&self) -> Result<()> {
		tokio::try_join!(
			self.passages.initialize(),
			self.summaries.initialize(),
			self.facts.initialize(),
		)?;

		Ok(())
	}

	/// Writes passages with their summaries and facts, one batch per collection.
	///
	/// Blank summaries and facts are skipped.
	pub async fn add_analyzed_passages(
		&self,
		analyzed: &[AnalyzedPassage],
		metadata: &DocumentMetadata,
	) -> Result<()> {
		if analyzed.is_empty() {
			return Ok(());
		}

		let segments = |kind: CollectionKind| {
			analyzed.iter().flat_map(|passage| passage.segments(kind)).collect::<Vec<Segment>>()
		};
		let (passages, summaries, facts) = (
			segments(CollectionKind::Passage),
			segments(CollectionKind::Summary),
			segments(CollectionKind::Fact),
		);

		tokio::try_join!(
			self.passages.add_segments(&passages, metadata),
			self.summaries.add_segments(&summaries, metadata),
			self.facts.add_segments(&facts, metadata),
		)?;

		tracing::info!(
			passages = passages.len(),
			summaries = summaries.len(),
			facts = facts.len(),
			"Analyzed passages written."
		);

		Ok(())
	}

	/// Deletes passages and every summary and fact that points at them.
	pub async fn delete_passages(&self, ids: &[String]) -> Result<()> {
		if ids.is_empty() {
			return Ok(());
		}

		let by_parent = Selector::ParentPassages(ids.to_vec());

		tokio::try_join!(
			self.passages.delete(ids),
			self.summaries.delete_where(&by_parent),
			self.facts.delete_where(&by_parent),
		)?;

		tracing::info!(passages = ids.len(), "Passages deleted with derived records.");

		Ok(())
	}

	/// Drops and recreates all three collections.
	pub async fn clear(&self) -> Result<()> {
		tokio::try_join!(self.passages.clear(), self.summaries.clear(), self.facts.clear())?;

		Ok(())
	}
}
