// std
use std::time::Duration as StdDuration;

// crates.io
use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// One reranked document. `index` points into the submitted documents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankResult {
	pub index: usize,
	pub relevance_score: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RerankResponse {
	/// In provider order, most relevant first.
	pub results: Vec<RerankResult>,
	pub billed_units: u64,
}

pub async fn rerank(
	cfg: &prism_config::RerankProviderConfig,
	query: &str,
	docs: &[String],
	top_n: usize,
) -> Result<RerankResponse> {
	let Some(api_key) = cfg.api_key.as_deref() else {
		return Err(Error::InvalidConfig {
			message: "Rerank provider api_key is not configured.".to_string(),
		});
	};
	let client = Client::builder().timeout(StdDuration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"query": query,
		"documents": docs,
		"top_n": top_n,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let response = parse_rerank_response(json)?;

	tracing::debug!(
		provider_id = cfg.provider_id.as_str(),
		model = cfg.model.as_str(),
		documents = docs.len(),
		results = response.results.len(),
		billed_units = response.billed_units,
		"Rerank request completed."
	);

	Ok(response)
}

fn parse_rerank_response(json: Value) -> Result<RerankResponse> {
	let results = json
		.get("results")
		.or_else(|| json.get("data"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Rerank response is missing results array.".to_string(),
		})?;
	let mut out = Vec::with_capacity(results.len());

	for item in results {
		let index = item.get("index").and_then(|v| v.as_u64()).ok_or_else(|| {
			Error::InvalidResponse { message: "Rerank result missing index.".to_string() }
		})? as usize;
		let relevance_score = item
			.get("relevance_score")
			.or_else(|| item.get("score"))
			.and_then(|v| v.as_f64())
			.ok_or_else(|| Error::InvalidResponse {
				message: "Rerank result missing score.".to_string(),
			})? as f32;

		out.push(RerankResult { index, relevance_score });
	}

	let billed_units = json
		.get("meta")
		.and_then(|meta| meta.get("billed_units"))
		.and_then(|units| units.get("search_units"))
		.and_then(|v| v.as_f64())
		.map(|units| units.max(0.0).round() as u64)
		.unwrap_or(0);

	Ok(RerankResponse { results: out, billed_units })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keeps_provider_order_and_billing() {
		let json = serde_json::json!({
			"results": [
				{ "index": 1, "relevance_score": 0.9 },
				{ "index": 0, "relevance_score": 0.2 }
			],
			"meta": { "billed_units": { "search_units": 1 } }
		});
		let response = parse_rerank_response(json).expect("parse failed");

		assert_eq!(
			response.results,
			vec![
				RerankResult { index: 1, relevance_score: 0.9 },
				RerankResult { index: 0, relevance_score: 0.2 },
			]
		);
		assert_eq!(response.billed_units, 1);
	}

	#[test]
	fn missing_billing_counts_as_zero_units() {
		let json = serde_json::json!({ "data": [{ "index": 0, "score": 0.5 }] });
		let response = parse_rerank_response(json).expect("parse failed");

		assert_eq!(response.billed_units, 0);
		assert_eq!(response.results.len(), 1);
	}

	#[test]
	fn rejects_results_without_index() {
		let json = serde_json::json!({ "results": [{ "relevance_score": 0.5 }] });
		let err = parse_rerank_response(json).expect_err("Expected invalid response.");

		assert_eq!(err.to_string(), "Rerank result missing index.");
	}
}
