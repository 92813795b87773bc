mod error;
mod fakes;
mod memory;

pub use error::{Error, Result};
pub use fakes::{FailingEmbedder, KeywordEmbedder, ScriptedReranker};
pub use memory::{MemoryCollection, UnavailableCollection, cosine_similarity};

use std::{collections::HashSet, env, time::Duration};

use qdrant_client::Qdrant;
use tokio::time;
use uuid::Uuid;

pub fn env_qdrant_url() -> Option<String> {
	env::var("PRISM_QDRANT_URL").ok()
}

/// Uniquely named passage, summary, and fact collections on a live Qdrant.
pub struct QdrantTestCollections {
	url: String,
	names: [String; 3],
}
impl QdrantTestCollections {
	pub fn new(url: impl Into<String>, prefix: &str) -> Self {
		let suffix = Uuid::new_v4().simple();

		Self {
			url: url.into(),
			names: [
				format!("{prefix}_passages_{suffix}"),
				format!("{prefix}_summaries_{suffix}"),
				format!("{prefix}_facts_{suffix}"),
			],
		}
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	pub fn names(&self) -> &[String; 3] {
		&self.names
	}

	pub async fn cleanup(self) -> Result<()> {
		cleanup_qdrant_collections(&self.url, &self.names).await
	}
}

async fn cleanup_qdrant_collections(url: &str, collections: &[String]) -> Result<()> {
	let client = Qdrant::from_url(url)
		.build()
		.map_err(|err| Error::Message(format!("Failed to build Qdrant client: {err}.")))?;
	let max_attempts = 6;
	let mut remaining = collections.iter().cloned().collect::<HashSet<_>>();
	let mut backoff = Duration::from_millis(100);

	for attempt in 1..=max_attempts {
		let existing = time::timeout(Duration::from_secs(10), client.list_collections())
			.await
			.map_err(|_| Error::Message("Qdrant list_collections timed out.".to_string()))??;
		let existing = existing.collections.into_iter().map(|c| c.name).collect::<HashSet<_>>();

		remaining.retain(|collection| existing.contains(collection));

		if remaining.is_empty() {
			return Ok(());
		}

		for collection in remaining.iter().cloned().collect::<Vec<_>>() {
			if let Err(err) = client.delete_collection(collection.clone()).await
				&& attempt == max_attempts
			{
				return Err(Error::Message(format!(
					"Failed to delete Qdrant collection {collection:?} after {attempt} attempts: {err}."
				)));
			}
		}

		time::sleep(backoff).await;

		backoff = backoff.saturating_mul(2).min(Duration::from_secs(2));
	}

	Ok(())
}
