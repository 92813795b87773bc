use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Which index a record lives in, and therefore which index produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
	Passage,
	Summary,
	Fact,
}
impl CollectionKind {
	pub const ALL: [Self; 3] = [Self::Passage, Self::Summary, Self::Fact];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Passage => "passage",
			Self::Summary => "summary",
			Self::Fact => "fact",
		}
	}

	/// Winner of an exact score tie between two provenances; higher wins.
	pub fn tie_priority(self) -> u8 {
		match self {
			Self::Passage => 2,
			Self::Summary => 1,
			Self::Fact => 0,
		}
	}
}
impl fmt::Display for CollectionKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for CollectionKind {
	type Err = UnknownCollectionKind;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"passage" | "passages" | "segment" | "segments" => Ok(Self::Passage),
			"summary" | "summaries" => Ok(Self::Summary),
			"fact" | "facts" => Ok(Self::Fact),
			_ => Err(UnknownCollectionKind(raw.to_string())),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCollectionKind(pub String);
impl fmt::Display for UnknownCollectionKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Unknown collection kind {:?}; expected passage, summary, or fact.", self.0)
	}
}
impl std::error::Error for UnknownCollectionKind {}
