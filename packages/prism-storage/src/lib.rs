pub mod collection;
pub mod qdrant;

mod error;

pub use collection::{
	BoxFuture, CollectionRecord, QueryHit, RecordMetadata, Selector, StoredRecord,
	VectorCollection,
};
pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
