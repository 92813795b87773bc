mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	CollectionSearch, Collections, Config, EmbeddingProviderConfig, Providers, Qdrant, Rerank,
	RerankProviderConfig, Retrieval, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.storage.qdrant.url.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.url must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}

	let collections = &cfg.storage.qdrant.collections;

	for (label, name) in [
		("storage.qdrant.collections.passages", &collections.passages),
		("storage.qdrant.collections.summaries", &collections.summaries),
		("storage.qdrant.collections.facts", &collections.facts),
	] {
		if name.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if collections.passages == collections.summaries
		|| collections.passages == collections.facts
		|| collections.summaries == collections.facts
	{
		return Err(Error::Validation {
			message: "storage.qdrant.collections must name three distinct collections."
				.to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}

	for (label, timeout_ms) in [
		("providers.embedding.timeout_ms", cfg.providers.embedding.timeout_ms),
		("providers.rerank.timeout_ms", cfg.providers.rerank.timeout_ms),
	] {
		if timeout_ms == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if cfg.retrieval.n_results_target == 0 {
		return Err(Error::Validation {
			message: "retrieval.n_results_target must be greater than zero.".to_string(),
		});
	}

	for (label, search) in [
		("retrieval.passage", &cfg.retrieval.passage),
		("retrieval.summary", &cfg.retrieval.summary),
		("retrieval.fact", &cfg.retrieval.fact),
	] {
		if let Some(min_similarity) = search.min_similarity {
			if !min_similarity.is_finite() {
				return Err(Error::Validation {
					message: format!("{label}.min_similarity must be a finite number."),
				});
			}
			if !(0.0..=1.0).contains(&min_similarity) {
				return Err(Error::Validation {
					message: format!("{label}.min_similarity must be in the range 0.0-1.0."),
				});
			}
		}
	}

	if !cfg.rerank.price_per_thousand_units.is_finite() {
		return Err(Error::Validation {
			message: "rerank.price_per_thousand_units must be a finite number.".to_string(),
		});
	}
	if cfg.rerank.price_per_thousand_units < 0.0 {
		return Err(Error::Validation {
			message: "rerank.price_per_thousand_units must be zero or greater.".to_string(),
		});
	}
	if cfg.rerank.enabled && cfg.providers.rerank.api_key.is_none() {
		return Err(Error::Validation {
			message: "providers.rerank.api_key must be set when rerank.enabled is true."
				.to_string(),
		});
	}

	for (label, headers) in [
		("providers.embedding.default_headers", &cfg.providers.embedding.default_headers),
		("providers.rerank.default_headers", &cfg.providers.rerank.default_headers),
	] {
		if headers.values().any(|value| !value.is_string()) {
			return Err(Error::Validation {
				message: format!("{label} values must be strings."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.providers.rerank.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.providers.rerank.api_key = None;
	}
}
