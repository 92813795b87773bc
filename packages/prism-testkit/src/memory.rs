use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use prism_storage::{
	BoxFuture, CollectionRecord, Error, QueryHit, Result, Selector, StoredRecord,
	VectorCollection,
};

#[derive(Debug, Default)]
struct MemoryState {
	dimension: Option<u32>,
	/// Insertion order, so equal similarities come back deterministically.
	records: Vec<(StoredRecord, Vec<f32>)>,
}

/// Cosine similarity collection held in memory.
#[derive(Debug)]
pub struct MemoryCollection {
	name: String,
	state: RwLock<MemoryState>,
	queries: AtomicUsize,
}
impl MemoryCollection {
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into(), state: RwLock::default(), queries: AtomicUsize::new(0) }
	}

	/// Number of nearest-neighbor queries served so far.
	pub fn query_count(&self) -> usize {
		self.queries.load(Ordering::SeqCst)
	}

	pub async fn len(&self) -> usize {
		self.state.read().await.records.len()
	}

	pub async fn ids(&self) -> Vec<String> {
		self.state.read().await.records.iter().map(|(record, _)| record.id.clone()).collect()
	}

	pub async fn exists(&self) -> bool {
		self.state.read().await.dimension.is_some()
	}

	fn missing(&self) -> Error {
		Error::Unavailable { message: format!("Collection {} does not exist.", self.name) }
	}
}

impl VectorCollection for MemoryCollection {
	fn name(&self) -> &str {
		&self.name
	}

	fn ensure(&self, dimension: u32) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			let mut state = self.state.write().await;

			state.dimension.get_or_insert(dimension);

			Ok(())
		})
	}

	fn drop_collection(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			let mut state = self.state.write().await;

			state.dimension = None;
			state.records.clear();

			Ok(())
		})
	}

	fn upsert<'a>(&'a self, records: &'a [CollectionRecord]) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut state = self.state.write().await;
			let dimension = state.dimension.ok_or_else(|| self.missing())?;

			for record in records {
				if record.vector.len() != dimension as usize {
					return Err(Error::InvalidRecord {
						message: format!(
							"Record {} has dimension {}, collection expects {dimension}.",
							record.id,
							record.vector.len()
						),
					});
				}

				let stored = StoredRecord {
					id: record.id.clone(),
					document: record.document.clone(),
					metadata: record.metadata.clone(),
				};

				match state.records.iter().position(|(existing, _)| existing.id == record.id) {
					Some(position) => state.records[position] = (stored, record.vector.clone()),
					None => state.records.push((stored, record.vector.clone())),
				}
			}

			Ok(())
		})
	}

	fn delete<'a>(&'a self, selector: &'a Selector) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut state = self.state.write().await;

			if state.dimension.is_none() {
				return Err(self.missing());
			}

			state.records.retain(|(record, _)| !selector.matches(record));

			Ok(())
		})
	}

	fn query<'a>(
		&'a self,
		vector: &'a [f32],
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<QueryHit>>> {
		Box::pin(async move {
			self.queries.fetch_add(1, Ordering::SeqCst);

			let state = self.state.read().await;

			if state.dimension.is_none() {
				return Err(self.missing());
			}

			let mut hits = state
				.records
				.iter()
				.map(|(record, stored)| QueryHit {
					record: record.clone(),
					distance: 1.0 - cosine_similarity(vector, stored),
				})
				.collect::<Vec<_>>();

			hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
			hits.truncate(top_k as usize);

			Ok(hits)
		})
	}

	fn get<'a>(&'a self, selector: &'a Selector) -> BoxFuture<'a, Result<Vec<StoredRecord>>> {
		Box::pin(async move {
			let state = self.state.read().await;

			if state.dimension.is_none() {
				return Err(self.missing());
			}

			Ok(state
				.records
				.iter()
				.filter(|(record, _)| selector.matches(record))
				.map(|(record, _)| record.clone())
				.collect())
		})
	}
}

/// Collection whose reads and writes always fail; creation succeeds.
#[derive(Debug)]
pub struct UnavailableCollection {
	name: String,
}
impl UnavailableCollection {
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into() }
	}

	fn fail<T>(&self) -> Result<T> {
		Err(Error::Unavailable { message: format!("Collection {} is unreachable.", self.name) })
	}
}

impl VectorCollection for UnavailableCollection {
	fn name(&self) -> &str {
		&self.name
	}

	fn ensure(&self, _dimension: u32) -> BoxFuture<'_, Result<()>> {
		Box::pin(async { Ok(()) })
	}

	fn drop_collection(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move { self.fail() })
	}

	fn upsert<'a>(&'a self, _records: &'a [CollectionRecord]) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { self.fail() })
	}

	fn delete<'a>(&'a self, _selector: &'a Selector) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { self.fail() })
	}

	fn query<'a>(
		&'a self,
		_vector: &'a [f32],
		_top_k: u32,
	) -> BoxFuture<'a, Result<Vec<QueryHit>>> {
		Box::pin(async move { self.fail() })
	}

	fn get<'a>(&'a self, _selector: &'a Selector) -> BoxFuture<'a, Result<Vec<StoredRecord>>> {
		Box::pin(async move { self.fail() })
	}
}

/// Returns `0.0` when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
	let dot = a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
	let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

	if norm_a == 0.0 || norm_b == 0.0 {
		return 0.0;
	}

	dot / (norm_a * norm_b)
}
