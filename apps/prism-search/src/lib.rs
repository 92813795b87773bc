pub mod input;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use prism_config::Config;
use prism_domain::CollectionKind;
use prism_service::{
	MultiCollectionRetriever, PerCollectionConfig, RerankOptions, SearchRequest, Topic,
	TopicSearchRequest,
};

#[derive(Debug, Parser)]
#[command(
	version = prism_cli::VERSION,
	rename_all = "kebab",
	styles = prism_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Create the passage, summary, and fact collections when missing.
	Init,
	/// Write analyzed passages from a JSON file.
	Ingest {
		#[arg(long, short = 'f', value_name = "FILE")]
		file: PathBuf,
	},
	/// Search one query across the configured collections.
	Search {
		#[arg(long, short = 'q')]
		query: String,
		#[command(flatten)]
		options: SearchOptions,
	},
	/// Search several topics and share the result budget between them.
	Topics {
		/// JSON array of `{ "name": ..., "queries": [...] }`.
		#[arg(long, short = 'f', value_name = "FILE")]
		file: PathBuf,
		#[command(flatten)]
		options: SearchOptions,
	},
	/// Delete passages together with their summaries and facts.
	Delete {
		#[arg(long = "id", value_name = "ID", required = true)]
		ids: Vec<String>,
	},
	/// Drop and recreate all three collections.
	Clear {
		#[arg(long)]
		yes: bool,
	},
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct SearchOptions {
	/// Restrict the search to these collections. Repeatable.
	#[arg(long = "collection", value_name = "KIND")]
	pub collections: Vec<CollectionKind>,
	#[arg(long, value_name = "N")]
	pub n_results: Option<u32>,
	/// Force reranking on, overriding `[rerank].enabled`.
	#[arg(long, conflicts_with = "no_rerank")]
	pub rerank: bool,
	/// Force reranking off, overriding `[rerank].enabled`.
	#[arg(long)]
	pub no_rerank: bool,
}
impl SearchOptions {
	pub fn search_request(&self, query: String, cfg: &Config) -> SearchRequest {
		let mut req = SearchRequest::from_config(query, cfg);

		if !self.collections.is_empty() {
			req.collections = self.collections.clone();
		}
		if let Some(n_results) = self.n_results {
			req.n_results_target = n_results;
		}

		req.rerank = Some(self.rerank_options(cfg));

		req
	}

	pub fn topic_request(&self, topics: Vec<Topic>, cfg: &Config) -> TopicSearchRequest {
		TopicSearchRequest {
			topics,
			collections: if self.collections.is_empty() {
				CollectionKind::ALL.to_vec()
			} else {
				self.collections.clone()
			},
			per_collection: PerCollectionConfig::from(&cfg.retrieval),
			rerank: Some(self.rerank_options(cfg)),
			n_results_target: self.n_results.unwrap_or(cfg.retrieval.n_results_target),
		}
	}

	fn rerank_options(&self, cfg: &Config) -> RerankOptions {
		let mut options = RerankOptions::from(&cfg.rerank);

		if self.rerank {
			options.enabled = true;
		}
		if self.no_rerank {
			options.enabled = false;
		}

		options
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = prism_config::load(&args.config)?;

	init_tracing(&config)?;

	let retriever = MultiCollectionRetriever::from_config(&config)?;

	execute(&retriever, args.command, &config).await
}

/// Runs one command. Every command initializes the collections first.
pub async fn execute(
	retriever: &MultiCollectionRetriever,
	command: Command,
	config: &Config,
) -> color_eyre::Result<()> {
	if let Command::Clear { yes: false } = command {
		return Err(eyre::eyre!("Refusing to clear collections without --yes."));
	}

	retriever.initialize().await?;

	match command {
		Command::Init => tracing::info!("Collections ready."),
		Command::Ingest { file } => {
			let batch = input::read_ingest_batch(&file)?;

			retriever.add_analyzed_passages(&batch.passages, &batch.metadata).await?;

			tracing::info!(passages = batch.passages.len(), "Ingest finished.");
		},
		Command::Search { query, options } => {
			let response = retriever.search(&options.search_request(query, config)).await?;

			print_json(&response)?;
		},
		Command::Topics { file, options } => {
			let topics = input::read_topics(&file)?;
			let response = retriever.search_topics(&options.topic_request(topics, config)).await?;

			print_json(&response)?;
		},
		Command::Delete { ids } => retriever.delete_passages(&ids).await?,
		Command::Clear { .. } => {
			retriever.clear().await?;

			tracing::info!("Collections cleared.");
		},
	}

	Ok(())
}

fn print_json<T>(value: &T) -> color_eyre::Result<()>
where
	T: Serialize,
{
	println!("{}", serde_json::to_string_pretty(value)?);

	Ok(())
}

fn init_tracing(config: &Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	Ok(())
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use prism_domain::{AnalyzedPassage, DocumentMetadata};
	use prism_storage::VectorCollection;
	use prism_testkit::{KeywordEmbedder, MemoryCollection};

	use super::*;

	const SAMPLE_CONFIG_TOML: &str =
		include_str!("../../../packages/prism-config/tests/fixtures/sample_config.toml");

	fn config() -> Config {
		toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.")
	}

	fn parse(argv: &[&str]) -> Args {
		Args::try_parse_from(argv).expect("Failed to parse arguments.")
	}

	#[test]
	fn search_flags_override_config() {
		let args = parse(&[
			"prism-search",
			"-c",
			"prism.toml",
			"search",
			"-q",
			"solar tariffs",
			"--collection",
			"facts",
			"--collection",
			"passage",
			"--n-results",
			"3",
			"--no-rerank",
		]);
		let Command::Search { query, options } = args.command else {
			panic!("Expected the search command.");
		};
		let req = options.search_request(query, &config());

		assert_eq!(req.query, "solar tariffs");
		assert_eq!(req.collections, vec![CollectionKind::Fact, CollectionKind::Passage]);
		assert_eq!(req.n_results_target, 3);
		assert_eq!(req.per_collection.fact.min_similarity, Some(0.55));
		assert_eq!(req.rerank.map(|rerank| rerank.enabled), Some(false));
	}

	#[test]
	fn search_defaults_come_from_config() {
		let req = SearchOptions::default().search_request("q".to_string(), &config());

		assert_eq!(req.collections, CollectionKind::ALL.to_vec());
		assert_eq!(req.n_results_target, 10);
		assert_eq!(req.rerank.map(|rerank| rerank.enabled), Some(true));
	}

	#[test]
	fn rerank_flags_conflict() {
		let result = Args::try_parse_from([
			"prism-search",
			"-c",
			"prism.toml",
			"search",
			"-q",
			"x",
			"--rerank",
			"--no-rerank",
		]);

		assert!(result.is_err());
	}

	#[test]
	fn unknown_collection_is_rejected() {
		let result = Args::try_parse_from([
			"prism-search",
			"-c",
			"prism.toml",
			"search",
			"-q",
			"x",
			"--collection",
			"notes",
		]);

		assert!(result.is_err());
	}

	#[test]
	fn delete_requires_an_id() {
		assert!(Args::try_parse_from(["prism-search", "-c", "prism.toml", "delete"]).is_err());

		let args = parse(&["prism-search", "-c", "prism.toml", "delete", "--id", "a", "--id", "b"]);

		assert!(matches!(args.command, Command::Delete { ids } if ids == ["a", "b"]));
	}

	#[test]
	fn topic_requests_default_to_every_collection() {
		let topics = vec![Topic { name: "a".to_string(), queries: vec!["x".to_string()] }];
		let options = SearchOptions { n_results: Some(6), ..SearchOptions::default() };
		let req = options.topic_request(topics, &config());

		assert_eq!(req.collections, CollectionKind::ALL.to_vec());
		assert_eq!(req.n_results_target, 6);
		assert_eq!(req.topics.len(), 1);
	}

	fn memory_retriever(passages: Arc<MemoryCollection>) -> MultiCollectionRetriever {
		MultiCollectionRetriever::new(
			[
				passages as Arc<dyn VectorCollection>,
				Arc::new(MemoryCollection::new("summaries")),
				Arc::new(MemoryCollection::new("facts")),
			],
			Arc::new(KeywordEmbedder::new(&["solar", "wind"])),
			None,
		)
	}

	#[tokio::test]
	async fn clear_works_on_a_freshly_built_retriever() {
		let passages = Arc::new(MemoryCollection::new("passages"));
		let writer = memory_retriever(passages.clone());

		writer.initialize().await.expect("Initialize failed.");
		writer
			.add_analyzed_passages(
				&[AnalyzedPassage {
					id: "p1".to_string(),
					parent_document_id: "doc1".to_string(),
					index: 0,
					text: "solar wind".to_string(),
					summary: String::new(),
					facts: Vec::new(),
				}],
				&DocumentMetadata::default(),
			)
			.await
			.expect("Write failed.");

		// A new process builds its stores uninitialized over the same collections.
		let fresh = memory_retriever(passages.clone());

		execute(&fresh, Command::Clear { yes: true }, &config()).await.expect("Clear failed.");

		assert_eq!(passages.len().await, 0);
		assert!(passages.exists().await);
	}

	#[tokio::test]
	async fn clear_without_confirmation_touches_nothing() {
		let passages = Arc::new(MemoryCollection::new("passages"));
		let retriever = memory_retriever(passages.clone());

		assert!(execute(&retriever, Command::Clear { yes: false }, &config()).await.is_err());
		assert!(!passages.exists().await);
	}
}
