use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{self, SchemaMap};

const LOGICAL_OPERATORS: [&str; 3] = ["$and", "$or", "$nor"];

/// Query as proposed by the completion endpoint, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub collection: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub operation: Option<String>,
	#[serde(default)]
	pub filter: Map<String, Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
	Find,
	Insert,
	Update,
	Delete,
}
impl OperationKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Find => "find",
			Self::Insert => "insert",
			Self::Update => "update",
			Self::Delete => "delete",
		}
	}

	pub fn is_write(self) -> bool {
		!matches!(self, Self::Find)
	}
}
impl fmt::Display for OperationKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for OperationKind {
	type Err = ValidationError;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"find" => Ok(Self::Find),
			"insert" => Ok(Self::Insert),
			"update" => Ok(Self::Update),
			"delete" => Ok(Self::Delete),
			_ => Err(ValidationError::UnsupportedOperation { operation: raw.to_string() }),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedOperation {
	Find,
	Insert { records: Vec<Map<String, Value>> },
	Update { set_fields: Map<String, Value> },
	Delete,
}
impl ValidatedOperation {
	pub fn kind(&self) -> OperationKind {
		match self {
			Self::Find => OperationKind::Find,
			Self::Insert { .. } => OperationKind::Insert,
			Self::Update { .. } => OperationKind::Update,
			Self::Delete => OperationKind::Delete,
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedQuery {
	pub collection: String,
	pub operation: ValidatedOperation,
	/// Filter restricted to the collection's known fields.
	pub filter: Map<String, Value>,
	/// Filter keys removed by the restriction, for logging.
	pub dropped_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
	#[error("Collection name is required in query.")]
	MissingCollection,
	#[error("Collection '{collection}' does not exist.")]
	UnknownCollection { collection: String },
	#[error("Operation '{operation}' is not supported.")]
	UnsupportedOperation { operation: String },
	#[error("Operation '{operation}' is not allowed; write operations are disabled.")]
	WritesDisabled { operation: OperationKind },
	#[error("Invalid data for {operation}: {message}")]
	InvalidData { operation: OperationKind, message: String },
	#[error("Filter for {operation} names unknown fields: {fields}.")]
	UnknownWriteFilterFields { operation: OperationKind, fields: String },
}

/// Checks a descriptor against the learned schema and normalizes it for execution.
///
/// Only collections present in `schema` are accepted. A missing operation means `find`. Filter keys
/// the collection has never shown are dropped from reads, so an invented field cannot silently turn
/// into a match against nothing. Updates and deletes carrying such keys are refused instead.
pub fn validate(
	descriptor: QueryDescriptor,
	schema: &SchemaMap,
	allow_writes: bool,
) -> Result<ValidatedQuery, ValidationError> {
	let QueryDescriptor { collection, operation, filter, data } = descriptor;
	let collection = collection
		.map(|name| name.trim().to_string())
		.filter(|name| !name.is_empty())
		.ok_or(ValidationError::MissingCollection)?;
	let Some(fields) = schema.fields(&collection) else {
		return Err(ValidationError::UnknownCollection { collection });
	};
	let kind = match operation.as_deref() {
		None => OperationKind::Find,
		Some(raw) => raw.parse()?,
	};

	if kind.is_write() && !allow_writes {
		return Err(ValidationError::WritesDisabled { operation: kind });
	}

	let operation = match kind {
		OperationKind::Find => ValidatedOperation::Find,
		OperationKind::Insert => ValidatedOperation::Insert { records: insert_records(data)? },
		OperationKind::Update => ValidatedOperation::Update { set_fields: update_fields(data)? },
		OperationKind::Delete => ValidatedOperation::Delete,
	};
	let (filter, dropped_fields) = restrict_filter(filter, fields);

	// Dropping a key from a write filter widens the set of records it touches.
	if matches!(kind, OperationKind::Update | OperationKind::Delete) && !dropped_fields.is_empty() {
		return Err(ValidationError::UnknownWriteFilterFields {
			operation: kind,
			fields: dropped_fields.join(", "),
		});
	}

	Ok(ValidatedQuery { collection, operation, filter, dropped_fields })
}

/// Keeps filter keys that name known fields, plus `$and`/`$or`/`$nor` whose clauses are restricted
/// the same way. Clauses left empty are removed, and so is a logical operator left with none.
pub fn restrict_filter(
	filter: Map<String, Value>,
	fields: &[String],
) -> (Map<String, Value>, Vec<String>) {
	let mut kept = Map::new();
	let mut dropped = Vec::new();

	for (key, value) in filter {
		if LOGICAL_OPERATORS.contains(&key.as_str()) {
			let Value::Array(clauses) = value else {
				dropped.push(key);

				continue;
			};
			let mut restricted = Vec::with_capacity(clauses.len());

			for clause in clauses {
				let Value::Object(clause) = clause else {
					continue;
				};
				let (clause, clause_dropped) = restrict_filter(clause, fields);

				dropped.extend(clause_dropped);

				if !clause.is_empty() {
					restricted.push(Value::Object(clause));
				}
			}

			if restricted.is_empty() {
				dropped.push(key);
			} else {
				kept.insert(key, Value::Array(restricted));
			}
		} else if !key.starts_with('$') && schema::is_known_field(fields, &key) {
			kept.insert(key, value);
		} else {
			dropped.push(key);
		}
	}

	(kept, dropped)
}

fn insert_records(data: Option<Value>) -> Result<Vec<Map<String, Value>>, ValidationError> {
	let invalid = |message: &str| ValidationError::InvalidData {
		operation: OperationKind::Insert,
		message: message.to_string(),
	};

	match data {
		Some(Value::Object(record)) => Ok(vec![record]),
		Some(Value::Array(items)) => {
			if items.is_empty() {
				return Err(invalid("expected at least one record."));
			}

			items
				.into_iter()
				.map(|item| match item {
					Value::Object(record) => Ok(record),
					_ => Err(invalid("every record must be a JSON object.")),
				})
				.collect()
		},
		Some(_) => Err(invalid("expected a record or a list of records.")),
		None => Err(invalid("data is required.")),
	}
}

fn update_fields(data: Option<Value>) -> Result<Map<String, Value>, ValidationError> {
	let invalid = |message: String| ValidationError::InvalidData {
		operation: OperationKind::Update,
		message,
	};
	let Some(Value::Object(mut data)) = data else {
		return Err(invalid("data must be a JSON object of fields to set.".to_string()));
	};
	let set_fields = match data.remove("$set") {
		Some(Value::Object(set_fields)) => {
			if let Some(key) = data.keys().next() {
				return Err(invalid(format!("'{key}' cannot be combined with $set.")));
			}

			set_fields
		},
		Some(_) => return Err(invalid("$set must be a JSON object.".to_string())),
		None => data,
	};

	if let Some(key) = set_fields.keys().find(|key| key.starts_with('$')) {
		return Err(invalid(format!("update operator '{key}' is not supported.")));
	}
	if set_fields.is_empty() {
		return Err(invalid("no fields to set.".to_string()));
	}

	Ok(set_fields)
}
