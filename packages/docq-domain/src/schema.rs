use serde::{Serialize, Serializer, ser::SerializeMap};

/// Field names learned per collection from one sampled record each.
///
/// Iteration follows insertion order, which is the order the matcher scans in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaMap {
	collections: Vec<CollectionFields>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionFields {
	pub name: String,
	pub fields: Vec<String>,
}

impl SchemaMap {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts or replaces the field list for `name`. Duplicate field names are collapsed.
	pub fn insert(&mut self, name: impl Into<String>, fields: Vec<String>) {
		let name = name.into();
		let mut unique = Vec::with_capacity(fields.len());

		for field in fields {
			if !unique.contains(&field) {
				unique.push(field);
			}
		}

		match self.collections.iter_mut().find(|entry| entry.name == name) {
			Some(entry) => entry.fields = unique,
			None => self.collections.push(CollectionFields { name, fields: unique }),
		}
	}

	pub fn fields(&self, name: &str) -> Option<&[String]> {
		self.collections.iter().find(|entry| entry.name == name).map(|entry| entry.fields.as_slice())
	}

	pub fn contains(&self, name: &str) -> bool {
		self.fields(name).is_some()
	}

	pub fn iter(&self) -> impl Iterator<Item = &CollectionFields> {
		self.collections.iter()
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.collections.iter().map(|entry| entry.name.as_str())
	}

	pub fn len(&self) -> usize {
		self.collections.len()
	}

	pub fn is_empty(&self) -> bool {
		self.collections.is_empty()
	}
}
impl<N> FromIterator<(N, Vec<String>)> for SchemaMap
where
	N: Into<String>,
{
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = (N, Vec<String>)>,
	{
		let mut schema = Self::new();

		for (name, fields) in iter {
			schema.insert(name, fields);
		}

		schema
	}
}
impl Serialize for SchemaMap {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut map = serializer.serialize_map(Some(self.collections.len()))?;

		for entry in &self.collections {
			map.serialize_entry(&entry.name, &entry.fields)?;
		}

		map.end()
	}
}

/// Whether a filter key refers to a known field. Dotted paths are judged by their first segment.
pub fn is_known_field(fields: &[String], key: &str) -> bool {
	let root = key.split('.').next().unwrap_or(key);

	fields.iter().any(|field| field == key || field == root)
}
