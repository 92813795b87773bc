use serde::{Deserialize, Serialize};

use crate::{CollectionKind, DocumentMetadata};

/// Generic embeddable unit written to one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
	pub id: String,
	pub parent_document_id: String,
	/// Set for summaries and facts; never for passages.
	pub parent_passage_id: Option<String>,
	pub index: u32,
	pub text: String,
}

/// Atomic retrieval unit. Exactly one per `(parent_document_id, index)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
	pub id: String,
	pub parent_document_id: String,
	pub index: u32,
	pub text: String,
	pub metadata: DocumentMetadata,
}

/// One passage together with the output of the analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedPassage {
	pub id: String,
	#[serde(alias = "parentDocId")]
	pub parent_document_id: String,
	#[serde(alias = "segmentIndex")]
	pub index: u32,
	#[serde(alias = "segment")]
	pub text: String,
	#[serde(default)]
	pub summary: String,
	#[serde(default, alias = "standaloneFacts")]
	pub facts: Vec<String>,
}
impl AnalyzedPassage {
	pub fn passage_segment(&self) -> Segment {
		Segment {
			id: self.id.clone(),
			parent_document_id: self.parent_document_id.clone(),
			parent_passage_id: None,
			index: self.index,
			text: self.text.clone(),
		}
	}

	/// `None` when the analysis produced no summary text.
	pub fn summary_segment(&self) -> Option<Segment> {
		if self.summary.trim().is_empty() {
			return None;
		}

		Some(Segment {
			id: summary_id(&self.id),
			parent_document_id: self.parent_document_id.clone(),
			parent_passage_id: Some(self.id.clone()),
			index: self.index,
			text: self.summary.clone(),
		})
	}

	/// Blank facts are skipped; fact numbering still follows the input positions.
	pub fn fact_segments(&self) -> Vec<Segment> {
		self.facts
			.iter()
			.enumerate()
			.filter(|(_, fact)| !fact.trim().is_empty())
			.map(|(n, fact)| Segment {
				id: fact_id(&self.id, n),
				parent_document_id: self.parent_document_id.clone(),
				parent_passage_id: Some(self.id.clone()),
				index: self.index,
				text: fact.clone(),
			})
			.collect()
	}

	pub fn segments(&self, kind: CollectionKind) -> Vec<Segment> {
		match kind {
			CollectionKind::Passage => vec![self.passage_segment()],
			CollectionKind::Summary => self.summary_segment().into_iter().collect(),
			CollectionKind::Fact => self.fact_segments(),
		}
	}
}

/// A passage with everything the analysis stage attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPassage {
	pub passage: Passage,
	pub summary: Option<String>,
	pub facts: Vec<String>,
}
impl EnrichedPassage {
	/// Passage text, then the summary and facts when present, separated by blank lines.
	pub fn enriched_text(&self) -> String {
		let mut sections = vec![self.passage.text.clone()];

		if let Some(summary) = self.summary.as_deref().filter(|summary| !summary.trim().is_empty())
		{
			sections.push(format!("Summary: {summary}"));
		}
		if !self.facts.is_empty() {
			let lines = self.facts.iter().map(|fact| format!("- {fact}")).collect::<Vec<_>>();

			sections.push(format!("Facts:\n{}", lines.join("\n")));
		}

		sections.join("\n\n")
	}
}

pub fn summary_id(passage_id: &str) -> String {
	format!("{passage_id}_summary")
}

pub fn fact_id(passage_id: &str, n: usize) -> String {
	format!("{passage_id}_fact_{n}")
}
