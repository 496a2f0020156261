//! MongoDB filter semantics evaluated over in-memory records.
//!
//! Covers implicit equality (with array membership), dotted paths, the comparison operators,
//! `$in`/`$nin`, `$exists`, `$regex`/`$options`, `$size`, `$not`, and `$and`/`$or`/`$nor`.
//! Anything else is rejected rather than silently matching.

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use crate::{Error, Result};

pub fn matches(record: &Map<String, Value>, filter: &Map<String, Value>) -> Result<bool> {
	for (key, condition) in filter {
		let matched = match key.as_str() {
			"$and" => {
				let mut all = true;

				for clause in clauses(key, condition)? {
					if !matches(record, clause)? {
						all = false;

						break;
					}
				}

				all
			},
			"$or" => {
				let mut any = false;

				for clause in clauses(key, condition)? {
					if matches(record, clause)? {
						any = true;

						break;
					}
				}

				any
			},
			"$nor" => {
				let mut none = true;

				for clause in clauses(key, condition)? {
					if matches(record, clause)? {
						none = false;

						break;
					}
				}

				none
			},
			other if other.starts_with('$') => {
				return Err(Error::InvalidArgument(format!(
					"Unsupported top-level operator {other}."
				)));
			},
			path => field_matches(resolve(record, path), condition)?,
		};

		if !matched {
			return Ok(false);
		}
	}

	Ok(true)
}

/// Looks up a dotted path. Numeric segments index into arrays.
pub fn resolve<'a>(record: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
	let mut segments = path.split('.');
	let mut current = record.get(segments.next()?)?;

	for segment in segments {
		current = match current {
			Value::Object(map) => map.get(segment)?,
			Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
			_ => return None,
		};
	}

	Some(current)
}

fn clauses<'a>(operator: &str, condition: &'a Value) -> Result<Vec<&'a Map<String, Value>>> {
	let Value::Array(items) = condition else {
		return Err(Error::InvalidArgument(format!("{operator} expects an array of filters.")));
	};

	items
		.iter()
		.map(|item| {
			item.as_object().ok_or_else(|| {
				Error::InvalidArgument(format!("{operator} clauses must be objects."))
			})
		})
		.collect()
}

fn field_matches(value: Option<&Value>, condition: &Value) -> Result<bool> {
	match condition {
		Value::Object(ops) if is_operator_document(ops) => operators_match(value, ops),
		_ => Ok(equals(value, condition)),
	}
}

fn is_operator_document(map: &Map<String, Value>) -> bool {
	!map.is_empty() && map.keys().all(|key| key.starts_with('$'))
}

fn operators_match(value: Option<&Value>, ops: &Map<String, Value>) -> Result<bool> {
	for (op, operand) in ops {
		let matched = match op.as_str() {
			"$eq" => equals(value, operand),
			"$ne" => !equals(value, operand),
			"$gt" => compares(value, operand, Ordering::is_gt),
			"$gte" => compares(value, operand, Ordering::is_ge),
			"$lt" => compares(value, operand, Ordering::is_lt),
			"$lte" => compares(value, operand, Ordering::is_le),
			"$in" => in_list(value, op, operand)?,
			"$nin" => !in_list(value, op, operand)?,
			"$exists" => value.is_some() == truthy(operand),
			"$regex" => {
				let options = ops.get("$options").and_then(Value::as_str).unwrap_or("");

				regex_matches(value, &build_regex(operand, options)?)
			},
			"$options" => true,
			"$size" => match (value, operand.as_u64()) {
				(Some(Value::Array(items)), Some(size)) => items.len() as u64 == size,
				(_, None) => {
					return Err(Error::InvalidArgument(
						"$size expects a non-negative integer.".to_string(),
					));
				},
				_ => false,
			},
			"$not" => match operand {
				Value::Object(inner) if is_operator_document(inner) => !operators_match(value, inner)?,
				_ => {
					return Err(Error::InvalidArgument(
						"$not expects an operator document.".to_string(),
					));
				},
			},
			other => {
				return Err(Error::InvalidArgument(format!("Unsupported operator {other}.")));
			},
		};

		if !matched {
			return Ok(false);
		}
	}

	Ok(true)
}

/// Equality as a query sees it: a missing field equals `null`, and an array field equals any of
/// its elements as well as itself.
fn equals(value: Option<&Value>, target: &Value) -> bool {
	match value {
		None => target.is_null(),
		Some(value) =>
			same(value, target)
				|| matches!(value, Value::Array(items) if items.iter().any(|item| same(item, target))),
	}
}

fn same(left: &Value, right: &Value) -> bool {
	match (left, right) {
		(Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
		_ => left == right,
	}
}

fn compares(value: Option<&Value>, target: &Value, accept: fn(Ordering) -> bool) -> bool {
	match value {
		None => false,
		Some(Value::Array(items)) =>
			items.iter().any(|item| order(item, target).map(accept).unwrap_or(false)),
		Some(value) => order(value, target).map(accept).unwrap_or(false),
	}
}

fn order(left: &Value, right: &Value) -> Option<Ordering> {
	match (left, right) {
		(Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
		(Value::String(a), Value::String(b)) => Some(a.cmp(b)),
		(Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
		_ => None,
	}
}

fn in_list(value: Option<&Value>, op: &str, operand: &Value) -> Result<bool> {
	let Value::Array(candidates) = operand else {
		return Err(Error::InvalidArgument(format!("{op} expects an array.")));
	};

	Ok(candidates.iter().any(|candidate| equals(value, candidate)))
}

fn truthy(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::Bool(flag) => *flag,
		Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
		_ => true,
	}
}

fn build_regex(pattern: &Value, options: &str) -> Result<Regex> {
	let Some(pattern) = pattern.as_str() else {
		return Err(Error::InvalidArgument("$regex expects a string pattern.".to_string()));
	};

	RegexBuilder::new(pattern)
		.case_insensitive(options.contains('i'))
		.multi_line(options.contains('m'))
		.dot_matches_new_line(options.contains('s'))
		.ignore_whitespace(options.contains('x'))
		.build()
		.map_err(|err| Error::InvalidArgument(format!("Invalid $regex pattern: {err}.")))
}

fn regex_matches(value: Option<&Value>, regex: &Regex) -> bool {
	match value {
		Some(Value::String(text)) => regex.is_match(text),
		Some(Value::Array(items)) =>
			items.iter().any(|item| item.as_str().map(|text| regex.is_match(text)).unwrap_or(false)),
		_ => false,
	}
}
