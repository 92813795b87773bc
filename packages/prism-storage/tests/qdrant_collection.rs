use std::sync::Arc;

use prism_domain::DocumentMetadata;
use prism_storage::{
	CollectionRecord, RecordMetadata, Selector, VectorCollection,
	qdrant::{self, QdrantCollection},
};
use prism_testkit::{QdrantTestCollections, env_qdrant_url};

fn record(id: &str, parent: Option<&str>, vector: Vec<f32>) -> CollectionRecord {
	CollectionRecord {
		id: id.to_string(),
		document: format!("Text of {id}."),
		metadata: RecordMetadata {
			parent_document_id: "doc1".to_string(),
			parent_passage_id: parent.map(str::to_string),
			index: 0,
			document: DocumentMetadata::default(),
		},
		vector,
	}
}

#[tokio::test]
#[ignore = "Requires external Qdrant. Set PRISM_QDRANT_URL to run."]
async fn qdrant_collection_round_trip() {
	let Some(url) = env_qdrant_url() else {
		eprintln!("Skipping qdrant_collection_round_trip; set PRISM_QDRANT_URL to run.");

		return;
	};
	let collections = QdrantTestCollections::new(url, "prism_storage");
	let [passages, summaries, facts] = collections.names().clone();
	let cfg = prism_config::Qdrant {
		url: collections.url().to_string(),
		vector_dim: 3,
		collections: prism_config::Collections { passages, summaries, facts },
	};
	let client = qdrant::connect(&cfg).expect("Failed to build Qdrant client.");
	let facts = QdrantCollection::new(Arc::clone(&client), cfg.collections.facts.clone());

	facts.ensure(3).await.expect("Failed to create collection.");
	facts.ensure(3).await.expect("Second ensure should be a no-op.");
	facts
		.upsert(&[
			record("p1_fact_0", Some("p1"), vec![1.0, 0.0, 0.0]),
			record("p1_fact_1", Some("p1"), vec![0.0, 1.0, 0.0]),
			record("p2_fact_0", Some("p2"), vec![0.0, 0.0, 1.0]),
		])
		.await
		.expect("Failed to upsert records.");

	let hits = facts.query(&[1.0, 0.0, 0.0], 2).await.expect("Failed to query.");

	assert_eq!(hits.len(), 2);
	assert_eq!(hits[0].record.id, "p1_fact_0");
	assert!(hits[0].distance.abs() < 1e-4);

	let by_parent = facts
		.get(&Selector::ParentPassages(vec!["p1".to_string()]))
		.await
		.expect("Failed to get by parent.");

	assert_eq!(by_parent.len(), 2);

	facts
		.delete(&Selector::ParentPassages(vec!["p1".to_string()]))
		.await
		.expect("Failed to delete by parent.");

	let remaining = facts
		.get(&Selector::Ids(vec!["p1_fact_0".to_string(), "p2_fact_0".to_string()]))
		.await
		.expect("Failed to get by id.");

	assert_eq!(remaining.len(), 1);
	assert_eq!(remaining[0].id, "p2_fact_0");
	assert_eq!(remaining[0].metadata.parent_passage_id.as_deref(), Some("p2"));

	facts.drop_collection().await.expect("Failed to drop collection.");
	collections.cleanup().await.expect("Failed to clean up Qdrant collections.");
}
