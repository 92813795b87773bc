pub mod corpus;
pub mod kind;
pub mod metadata;

pub use corpus::{AnalyzedPassage, EnrichedPassage, Passage, Segment, fact_id, summary_id};
pub use kind::{CollectionKind, UnknownCollectionKind};
pub use metadata::DocumentMetadata;
