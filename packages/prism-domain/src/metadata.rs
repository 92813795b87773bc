use serde::{Deserialize, Serialize};

/// Metadata of one source document, shared by every embeddable unit cut from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentMetadata {
	pub source: Option<String>,
	pub title: Option<String>,
	pub link: Option<String>,
	pub authors: Vec<String>,
	#[serde(alias = "publishedDate")]
	pub published_date: Option<String>,
	#[serde(alias = "createdAt")]
	pub created_at: Option<String>,
	pub locale: Option<String>,
}
impl DocumentMetadata {
	/// Text fed to the embedder: a `Key: value` header of the non-empty descriptive fields,
	/// then a blank line, then the raw text. Without any such field the raw text is returned.
	pub fn embedding_text(&self, text: &str) -> String {
		let mut header = Vec::new();
		let authors = self.authors.join(", ");

		for (label, value) in [
			("Title", self.title.as_deref()),
			("Source", self.source.as_deref()),
			("Authors", Some(authors.as_str())),
			("Published", self.published_date.as_deref()),
			("Locale", self.locale.as_deref()),
		] {
			let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
				continue;
			};

			header.push(format!("{label}: {value}"));
		}

		if header.is_empty() {
			return text.to_string();
		}

		format!("{}\n\n{text}", header.join("\n"))
	}
}
