use crate::schema::SchemaMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
	/// At least one known field name occurs in the request text.
	Field,
	/// No field matched, but the collection name occurs in the request text.
	CollectionName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionMatch {
	pub collection: String,
	/// Fields found in the text for [`MatchKind::Field`], every known field otherwise.
	pub fields: Vec<String>,
	pub kind: MatchKind,
}

/// Picks the collection a request most likely targets.
///
/// Collections are scanned in schema order. The first one with a field name occurring in the text
/// (case-insensitively) wins; failing that, the first collection whose own name occurs in the text.
/// `None` means the prompt stays unconstrained, it is not an error.
pub fn match_collection(text: &str, schema: &SchemaMap) -> Option<CollectionMatch> {
	let haystack = text.to_lowercase();

	for entry in schema.iter() {
		let found: Vec<String> = entry
			.fields
			.iter()
			.filter(|field| !field.is_empty() && haystack.contains(&field.to_lowercase()))
			.cloned()
			.collect();

		if !found.is_empty() {
			return Some(CollectionMatch {
				collection: entry.name.clone(),
				fields: found,
				kind: MatchKind::Field,
			});
		}
	}

	schema
		.iter()
		.find(|entry| !entry.name.is_empty() && haystack.contains(&entry.name.to_lowercase()))
		.map(|entry| CollectionMatch {
			collection: entry.name.clone(),
			fields: entry.fields.clone(),
			kind: MatchKind::CollectionName,
		})
}
