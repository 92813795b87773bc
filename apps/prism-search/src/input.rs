//! JSON payloads read by the `ingest` and `topics` commands.

use std::{fs, path::Path};

use color_eyre::eyre::WrapErr;
use serde::Deserialize;

use prism_domain::{AnalyzedPassage, DocumentMetadata};
use prism_service::Topic;

/// Analyzed passages of one source document.
#[derive(Debug, Deserialize)]
pub struct IngestBatch {
	#[serde(default)]
	pub metadata: DocumentMetadata,
	pub passages: Vec<AnalyzedPassage>,
}

pub fn read_ingest_batch(path: &Path) -> color_eyre::Result<IngestBatch> {
	let raw = fs::read_to_string(path)
		.wrap_err_with(|| format!("Failed to read {}.", path.display()))?;

	parse_ingest_batch(&raw).wrap_err_with(|| format!("Failed to parse {}.", path.display()))
}

pub fn read_topics(path: &Path) -> color_eyre::Result<Vec<Topic>> {
	let raw = fs::read_to_string(path)
		.wrap_err_with(|| format!("Failed to read {}.", path.display()))?;

	serde_json::from_str(&raw).wrap_err_with(|| format!("Failed to parse {}.", path.display()))
}

fn parse_ingest_batch(raw: &str) -> serde_json::Result<IngestBatch> {
	serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ingest_batch_accepts_camel_case_analysis_fields() {
		let batch = parse_ingest_batch(
			r#"{
				"metadata": { "title": "Grid report", "authors": ["A. Writer"] },
				"passages": [{
					"id": "doc1_0",
					"parentDocId": "doc1",
					"segmentIndex": 0,
					"segment": "Passage body.",
					"summary": "Short summary.",
					"standaloneFacts": ["One fact."]
				}]
			}"#,
		)
		.expect("Failed to parse ingest batch.");

		assert_eq!(batch.metadata.title.as_deref(), Some("Grid report"));
		assert_eq!(batch.passages[0].parent_document_id, "doc1");
		assert_eq!(batch.passages[0].text, "Passage body.");
		assert_eq!(batch.passages[0].facts, vec!["One fact.".to_string()]);
	}

	#[test]
	fn metadata_is_optional() {
		let batch = parse_ingest_batch(
			r#"{ "passages": [{ "id": "p", "parent_document_id": "d", "index": 2, "text": "t" }] }"#,
		)
		.expect("Failed to parse ingest batch.");

		assert_eq!(batch.metadata, DocumentMetadata::default());
		assert!(batch.passages[0].summary.is_empty());
	}
}
