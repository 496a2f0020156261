use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::query::QueryDescriptor;

static REASONING_TAG: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)</?think>").expect("Reasoning tag pattern must compile.")
});
static JSON_FENCE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?s)```(?i:json)[ \t]*\r?\n(.*?)```").expect("JSON fence pattern must compile.")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
	#[error("Completion text has no ```json fenced block.")]
	MissingBlock,
	#[error("Fenced block is not valid JSON: {message}")]
	InvalidJson { message: String },
	#[error("Fenced block must contain a JSON object.")]
	NotAnObject,
	#[error("Query filter must be a JSON object: {message}")]
	InvalidFilter { message: String },
	#[error("Query object has an invalid shape: {message}")]
	InvalidShape { message: String },
}

/// Removes reasoning-trace delimiters while keeping the text between them.
pub fn strip_reasoning(text: &str) -> String {
	REASONING_TAG.replace_all(text, "").into_owned()
}

/// Body of the first ```json fenced block, trimmed.
pub fn find_json_block(text: &str) -> Option<&str> {
	JSON_FENCE.captures(text).and_then(|caps| caps.get(1)).map(|body| body.as_str().trim())
}

/// Parses the query descriptor embedded in raw completion text.
///
/// A string `filter` is parsed a second time as nested JSON. Any `filter` that does not end up an
/// object is an extraction failure.
pub fn extract(raw: &str) -> Result<QueryDescriptor, ExtractError> {
	let cleaned = strip_reasoning(raw);
	let block = find_json_block(&cleaned).ok_or(ExtractError::MissingBlock)?;
	let parsed: Value = serde_json::from_str(block)
		.map_err(|err| ExtractError::InvalidJson { message: err.to_string() })?;
	let Value::Object(mut object) = parsed else {
		return Err(ExtractError::NotAnObject);
	};

	if let Some(filter) = object.remove("filter") {
		object.insert("filter".to_string(), Value::Object(normalize_filter(filter)?));
	}

	serde_json::from_value(Value::Object(object))
		.map_err(|err| ExtractError::InvalidShape { message: err.to_string() })
}

fn normalize_filter(filter: Value) -> Result<serde_json::Map<String, Value>, ExtractError> {
	match filter {
		Value::Object(map) => Ok(map),
		Value::String(nested) => match serde_json::from_str::<Value>(&nested) {
			Ok(Value::Object(map)) => Ok(map),
			Ok(other) => Err(ExtractError::InvalidFilter {
				message: format!("nested filter parsed to {}", type_name(&other)),
			}),
			Err(err) => Err(ExtractError::InvalidFilter {
				message: format!("nested filter is not valid JSON ({err})"),
			}),
		},
		other => Err(ExtractError::InvalidFilter { message: format!("got {}", type_name(&other)) }),
	}
}

fn type_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}
