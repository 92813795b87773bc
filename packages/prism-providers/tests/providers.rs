use reqwest::header::{AUTHORIZATION, HeaderName};
use serde_json::{Map, Value};

#[test]
fn builds_bearer_auth_header() {
	let headers =
		prism_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn merges_default_headers() {
	let mut defaults = Map::new();

	defaults.insert("x-client-name".to_string(), Value::String("prism".to_string()));

	let headers =
		prism_providers::auth_headers("secret", &defaults).expect("Failed to build headers.");
	let name = HeaderName::from_static("x-client-name");

	assert_eq!(headers.get(name).expect("Missing default header."), "prism");
}

#[test]
fn rejects_non_string_default_headers() {
	let mut defaults = Map::new();

	defaults.insert("x-retries".to_string(), Value::from(3));

	let err = prism_providers::auth_headers("secret", &defaults)
		.expect_err("Expected invalid header config.");

	assert!(matches!(err, prism_providers::Error::InvalidConfig { .. }));
}

#[tokio::test]
async fn rerank_without_api_key_is_a_config_error() {
	let cfg = prism_config::RerankProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://127.0.0.1:1".to_string(),
		api_key: None,
		path: "/".to_string(),
		model: "test".to_string(),
		timeout_ms: 1_000,
		default_headers: Map::new(),
	};
	let err = prism_providers::rerank::rerank(&cfg, "query", &["doc".to_string()], 1)
		.await
		.expect_err("Expected config error.");

	assert!(matches!(err, prism_providers::Error::InvalidConfig { .. }));
}

#[tokio::test]
async fn empty_embedding_batch_makes_no_request() {
	let cfg = prism_config::EmbeddingProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://127.0.0.1:1".to_string(),
		api_key: "key".to_string(),
		path: "/".to_string(),
		model: "test".to_string(),
		dimensions: 3,
		timeout_ms: 1_000,
		default_headers: Map::new(),
	};
	let vectors =
		prism_providers::embedding::embed(&cfg, &[]).await.expect("Empty batch must succeed.");

	assert!(vectors.is_empty());
}
