use std::{collections::HashMap, sync::Arc};

use qdrant_client::{
	Payload, Qdrant, QdrantError,
	qdrant::{
		Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
		DeleteCollectionBuilder, DeletePointsBuilder, Distance, FieldType, Filter,
		GetPointsBuilder, PointId, PointStruct, PointsIdsList, Query, QueryPointsBuilder,
		ScrollPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder, value::Kind,
	},
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use prism_domain::DocumentMetadata;

use crate::{
	BoxFuture, CollectionRecord, Error, QueryHit, RecordMetadata, Result, Selector, StoredRecord,
	VectorCollection,
};

pub const PARENT_PASSAGE_FIELD: &str = "parent_passage_id";

const SCROLL_PAGE_SIZE: u32 = 256;

pub fn connect(cfg: &prism_config::Qdrant) -> Result<Arc<Qdrant>> {
	let client = Qdrant::from_url(&cfg.url).build()?;

	Ok(Arc::new(client))
}

/// Qdrant point ids must be integers or UUIDs, so record ids are mapped through UUIDv5.
pub fn point_id(record_id: &str) -> String {
	Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes()).to_string()
}

pub struct QdrantCollection {
	client: Arc<Qdrant>,
	name: String,
}
impl QdrantCollection {
	pub fn new(client: Arc<Qdrant>, name: impl Into<String>) -> Self {
		Self { client, name: name.into() }
	}

	async fn ensure_collection(&self, dimension: u32) -> Result<()> {
		if self.client.collection_exists(self.name.clone()).await? {
			tracing::debug!(collection = self.name.as_str(), "Qdrant collection already exists.");

			return Ok(());
		}

		self.client
			.create_collection(
				CreateCollectionBuilder::new(self.name.clone())
					.vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
			)
			.await?;
		self.client
			.create_field_index(
				CreateFieldIndexCollectionBuilder::new(
					self.name.clone(),
					PARENT_PASSAGE_FIELD,
					FieldType::Keyword,
				)
				.wait(true),
			)
			.await?;

		tracing::info!(collection = self.name.as_str(), dimension, "Qdrant collection created.");

		Ok(())
	}

	async fn drop_existing(&self) -> Result<()> {
		if !self.client.collection_exists(self.name.clone()).await? {
			return Ok(());
		}

		self.client.delete_collection(DeleteCollectionBuilder::new(self.name.clone())).await?;

		tracing::info!(collection = self.name.as_str(), "Qdrant collection dropped.");

		Ok(())
	}

	async fn upsert_records(&self, records: &[CollectionRecord]) -> Result<()> {
		if records.is_empty() {
			return Ok(());
		}

		let points = records
			.iter()
			.map(|record| {
				PointStruct::new(point_id(&record.id), record.vector.clone(), encode_payload(record))
			})
			.collect::<Vec<_>>();

		self.client
			.upsert_points(UpsertPointsBuilder::new(self.name.clone(), points).wait(true))
			.await?;

		Ok(())
	}

	async fn delete_records(&self, selector: &Selector) -> Result<()> {
		if selector.is_empty() {
			return Ok(());
		}

		let delete = match selector {
			Selector::Ids(ids) =>
				DeletePointsBuilder::new(self.name.clone()).points(PointsIdsList { ids: point_ids(ids) }),
			Selector::ParentPassages(ids) =>
				DeletePointsBuilder::new(self.name.clone()).points(parent_filter(ids)),
		};

		match self.client.delete_points(delete.wait(true)).await {
			Ok(_) => {},
			Err(err) =>
				if is_not_found_error(&err) {
					tracing::info!(
						collection = self.name.as_str(),
						"Qdrant points missing during delete."
					);
				} else {
					return Err(err.into());
				},
		}

		Ok(())
	}

	async fn query_records(&self, vector: &[f32], top_k: u32) -> Result<Vec<QueryHit>> {
		if top_k == 0 {
			return Ok(Vec::new());
		}

		let search = QueryPointsBuilder::new(self.name.clone())
			.query(Query::new_nearest(vector.to_vec()))
			.limit(top_k as u64)
			.with_payload(true);
		let response = self.client.query(search).await?;
		let mut hits = Vec::with_capacity(response.result.len());

		for point in response.result {
			// Qdrant reports cosine similarity for cosine collections.
			hits.push(QueryHit { record: decode_record(&point.payload)?, distance: 1.0 - point.score });
		}

		Ok(hits)
	}

	async fn get_records(&self, selector: &Selector) -> Result<Vec<StoredRecord>> {
		if selector.is_empty() {
			return Ok(Vec::new());
		}

		match selector {
			Selector::Ids(ids) => {
				let response = self
					.client
					.get_points(
						GetPointsBuilder::new(self.name.clone(), point_ids(ids)).with_payload(true),
					)
					.await?;

				response.result.iter().map(|point| decode_record(&point.payload)).collect()
			},
			Selector::ParentPassages(ids) => self.scroll_records(parent_filter(ids)).await,
		}
	}

	async fn scroll_records(&self, filter: Filter) -> Result<Vec<StoredRecord>> {
		let mut records = Vec::new();
		let mut offset: Option<PointId> = None;

		loop {
			let mut scroll = ScrollPointsBuilder::new(self.name.clone())
				.filter(filter.clone())
				.limit(SCROLL_PAGE_SIZE)
				.with_payload(true);

			if let Some(offset) = offset.take() {
				scroll = scroll.offset(offset);
			}

			let page = self.client.scroll(scroll).await?;

			for point in &page.result {
				records.push(decode_record(&point.payload)?);
			}

			match page.next_page_offset {
				Some(next) => offset = Some(next),
				None => break,
			}
		}

		Ok(records)
	}
}

impl VectorCollection for QdrantCollection {
	fn name(&self) -> &str {
		&self.name
	}

	fn ensure(&self, dimension: u32) -> BoxFuture<'_, Result<()>> {
		Box::pin(self.ensure_collection(dimension))
	}

	fn drop_collection(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(self.drop_existing())
	}

	fn upsert<'a>(&'a self, records: &'a [CollectionRecord]) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.upsert_records(records))
	}

	fn delete<'a>(&'a self, selector: &'a Selector) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.delete_records(selector))
	}

	fn query<'a>(
		&'a self,
		vector: &'a [f32],
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<QueryHit>>> {
		Box::pin(self.query_records(vector, top_k))
	}

	fn get<'a>(&'a self, selector: &'a Selector) -> BoxFuture<'a, Result<Vec<StoredRecord>>> {
		Box::pin(self.get_records(selector))
	}
}

fn point_ids(ids: &[String]) -> Vec<PointId> {
	ids.iter().map(|id| PointId::from(point_id(id))).collect()
}

fn parent_filter(ids: &[String]) -> Filter {
	Filter::must([Condition::matches(PARENT_PASSAGE_FIELD, ids.to_vec())])
}

fn is_not_found_error(err: &QdrantError) -> bool {
	let message = err.to_string().to_lowercase();
	let point_not_found =
		(message.contains("not found") || message.contains("404")) && message.contains("point");
	let no_point_found = message.contains("no point") && message.contains("found");

	point_not_found || no_point_found
}

fn encode_payload(record: &CollectionRecord) -> Payload {
	let metadata = &record.metadata;
	let document = &metadata.document;
	let mut payload_map = HashMap::new();

	payload_map.insert("record_id".to_string(), Value::from(record.id.clone()));
	payload_map.insert("document".to_string(), Value::from(record.document.clone()));
	payload_map
		.insert("parent_document_id".to_string(), Value::from(metadata.parent_document_id.clone()));
	payload_map.insert("index".to_string(), Value::from(i64::from(metadata.index)));
	payload_map
		.insert("authors".to_string(), Value::from(JsonValue::from(document.authors.clone())));

	for (key, value) in [
		(PARENT_PASSAGE_FIELD, metadata.parent_passage_id.as_ref()),
		("source", document.source.as_ref()),
		("title", document.title.as_ref()),
		("link", document.link.as_ref()),
		("published_date", document.published_date.as_ref()),
		("created_at", document.created_at.as_ref()),
		("locale", document.locale.as_ref()),
	] {
		if let Some(value) = value {
			payload_map.insert(key.to_string(), Value::from(value.clone()));
		}
	}

	Payload::from(payload_map)
}

fn decode_record(payload: &HashMap<String, Value>) -> Result<StoredRecord> {
	let id = payload_string(payload, "record_id").ok_or_else(|| Error::InvalidRecord {
		message: "Qdrant payload is missing record_id.".to_string(),
	})?;
	let index = match payload.get("index").and_then(|value| value.kind.as_ref()) {
		Some(Kind::IntegerValue(raw)) => u32::try_from(*raw).map_err(|_| Error::InvalidRecord {
			message: format!("Record {id} has an out of range index."),
		})?,
		_ =>
			return Err(Error::InvalidRecord {
				message: format!("Record {id} is missing an integer index."),
			}),
	};

	Ok(StoredRecord {
		document: payload_string(payload, "document").unwrap_or_default(),
		metadata: RecordMetadata {
			parent_document_id: payload_string(payload, "parent_document_id").unwrap_or_default(),
			parent_passage_id: payload_string(payload, PARENT_PASSAGE_FIELD),
			index,
			document: DocumentMetadata {
				source: payload_string(payload, "source"),
				title: payload_string(payload, "title"),
				link: payload_string(payload, "link"),
				authors: payload_strings(payload, "authors"),
				published_date: payload_string(payload, "published_date"),
				created_at: payload_string(payload, "created_at"),
				locale: payload_string(payload, "locale"),
			},
		},
		id,
	})
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	match payload.get(key).and_then(|value| value.kind.as_ref()) {
		Some(Kind::StringValue(raw)) => Some(raw.clone()),
		_ => None,
	}
}

fn payload_strings(payload: &HashMap<String, Value>, key: &str) -> Vec<String> {
	match payload.get(key).and_then(|value| value.kind.as_ref()) {
		Some(Kind::ListValue(list)) => list
			.values
			.iter()
			.filter_map(|value| match value.kind.as_ref() {
				Some(Kind::StringValue(raw)) => Some(raw.clone()),
				_ => None,
			})
			.collect(),
		_ => Vec::new(),
	}
}
