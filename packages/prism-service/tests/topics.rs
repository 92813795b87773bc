use std::sync::Arc;

use prism_domain::{AnalyzedPassage, CollectionKind, DocumentMetadata};
use prism_service::{
	Error, MultiCollectionRetriever, PerCollectionConfig, RerankOptions, Reranker, Topic,
	TopicSearchRequest,
};
use prism_storage::VectorCollection;
use prism_testkit::{KeywordEmbedder, MemoryCollection, ScriptedReranker};

const VOCABULARY: [&str; 6] = ["solar", "wind", "battery", "storage", "grid", "coal"];

async fn retriever(reranker: Option<Arc<ScriptedReranker>>) -> MultiCollectionRetriever {
	let retriever = MultiCollectionRetriever::new(
		[
			Arc::new(MemoryCollection::new("passages")) as Arc<dyn VectorCollection>,
			Arc::new(MemoryCollection::new("summaries")),
			Arc::new(MemoryCollection::new("facts")),
		],
		Arc::new(KeywordEmbedder::new(&VOCABULARY)),
		reranker.map(|reranker| reranker as Arc<dyn Reranker>),
	);

	retriever.initialize().await.expect("Failed to initialize collections.");

	let corpus = [
		("p1", "solar wind"),
		("p2", "solar grid"),
		("p3", "battery storage"),
		("p4", "battery grid"),
	]
	.into_iter()
	.enumerate()
	.map(|(index, (id, text))| AnalyzedPassage {
		id: id.to_string(),
		parent_document_id: "doc1".to_string(),
		index: index as u32,
		text: text.to_string(),
		summary: String::new(),
		facts: Vec::new(),
	})
	.collect::<Vec<_>>();

	retriever
		.add_analyzed_passages(&corpus, &DocumentMetadata::default())
		.await
		.expect("Failed to seed corpus.");

	retriever
}

fn topic(name: &str, queries: &[&str]) -> Topic {
	Topic { name: name.to_string(), queries: queries.iter().map(|query| query.to_string()).collect() }
}

fn request(topics: Vec<Topic>, rerank: Option<RerankOptions>) -> TopicSearchRequest {
	TopicSearchRequest {
		topics,
		collections: vec![CollectionKind::Passage],
		per_collection: PerCollectionConfig::default(),
		rerank,
		n_results_target: 4,
	}
}

#[tokio::test]
async fn every_topic_receives_its_quota() {
	let retriever = retriever(None).await;
	let req = request(vec![topic("A", &["solar"]), topic("B", &["battery", "storage"])], None);
	let response = retriever.search_topics(&req).await.expect("Topic search failed.");
	let mut ids = response.results.iter().map(|result| result.passage_id()).collect::<Vec<_>>();

	ids.sort_unstable();

	assert_eq!(ids, vec!["p1", "p2", "p3", "p4"]);
	assert_eq!(response.topics.len(), 2);
	assert!(response.topics.iter().all(|topic| topic.required == 2 && topic.satisfied == 2));
	assert_eq!(response.retrieval_sources.from_passages, 4);
	assert!(response.reranking_cost.is_none());
}

#[tokio::test]
async fn topics_are_reranked_separately() {
	let reranker = Arc::new(ScriptedReranker::scoring(|_, doc| doc.len() as f32 / 100.0));
	let retriever = retriever(Some(reranker.clone())).await;
	let req = request(
		vec![topic("A", &["solar"]), topic("B", &["", "battery", "storage"])],
		Some(RerankOptions { enabled: true, price_per_thousand_units: 2.0 }),
	);
	let response = retriever.search_topics(&req).await.expect("Topic search failed.");

	assert_eq!(reranker.calls(), 2);
	assert_eq!(response.results.len(), 4);
	assert!(response.results.iter().all(|result| result.rerank_score.is_some()));

	let cost = response.reranking_cost.expect("Expected a reranking cost.");

	assert!((cost - 0.004).abs() < 1e-9);
}

#[tokio::test]
async fn topics_without_a_quota_are_not_reranked() {
	let reranker = Arc::new(ScriptedReranker::scoring(|_, doc| doc.len() as f32 / 100.0));
	let retriever = retriever(Some(reranker.clone())).await;
	let req = TopicSearchRequest {
		n_results_target: 2,
		..request(
			vec![topic("A", &["solar"]), topic("B", &["battery"]), topic("C", &["grid"])],
			Some(RerankOptions { enabled: true, price_per_thousand_units: 2.0 }),
		)
	};
	let response = retriever.search_topics(&req).await.expect("Topic search failed.");
	let quotas = response.topics.iter().map(|topic| topic.required).collect::<Vec<_>>();

	assert_eq!(quotas, vec![1, 1, 0]);
	assert_eq!(reranker.calls(), 2);
	assert_eq!(response.results.len(), 2);
	assert_eq!(response.topics[2].satisfied, 0);

	let cost = response.reranking_cost.expect("Expected a reranking cost.");

	assert!((cost - 0.004).abs() < 1e-9);
}

#[tokio::test]
async fn topic_without_matches_reports_an_unmet_quota() {
	let retriever = retriever(None).await;
	let req = request(vec![topic("A", &["solar"]), topic("B", &["coal"])], None);
	let response = retriever.search_topics(&req).await.expect("Topic search failed.");
	let ids = response.results.iter().map(|result| result.passage_id()).collect::<Vec<_>>();

	assert_eq!(ids.len(), 2);
	assert!(ids.contains(&"p1") && ids.contains(&"p2"));
	assert_eq!(response.topics[0].satisfied, 2);
	assert_eq!(response.topics[1].satisfied, 0);
}

#[tokio::test]
async fn topics_without_usable_queries_are_rejected() {
	let retriever = retriever(None).await;

	for topics in [Vec::new(), vec![topic("A", &["solar"]), topic("B", &["  "])]] {
		let err = retriever
			.search_topics(&request(topics, None))
			.await
			.expect_err("Expected an invalid request.");

		assert!(matches!(err, Error::InvalidRequest { .. }));
	}
}
