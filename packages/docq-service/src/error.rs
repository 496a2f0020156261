use serde::Serialize;

use docq_domain::{ExtractError, ValidationError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures reported to callers as tagged values rather than raised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("Transport error: {message}")]
	Transport { message: String },
	#[error("Extraction error: {message}")]
	Extraction { message: String },
	#[error("Validation error: {message}")]
	Validation { message: String },
	#[error("Execution error: {message}")]
	Execution { message: String },
}
impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Transport { .. } => ErrorKind::TransportError,
			Self::Extraction { .. } => ErrorKind::ExtractionError,
			Self::Validation { .. } => ErrorKind::ValidationError,
			Self::Execution { .. } => ErrorKind::ExecutionError,
		}
	}

	pub fn message(&self) -> &str {
		match self {
			Self::Transport { message }
			| Self::Extraction { message }
			| Self::Validation { message }
			| Self::Execution { message } => message,
		}
	}
}
impl From<docq_providers::Error> for Error {
	fn from(err: docq_providers::Error) -> Self {
		Self::Transport { message: err.to_string() }
	}
}
impl From<ExtractError> for Error {
	fn from(err: ExtractError) -> Self {
		Self::Extraction { message: err.to_string() }
	}
}
impl From<ValidationError> for Error {
	fn from(err: ValidationError) -> Self {
		Self::Validation { message: err.to_string() }
	}
}
impl From<docq_storage::Error> for Error {
	fn from(err: docq_storage::Error) -> Self {
		match err {
			docq_storage::Error::Mongo(_) =>
				Self::Execution { message: "Database operation failed.".to_string() },
			other => Self::Execution { message: other.to_string() },
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	TransportError,
	ExtractionError,
	ValidationError,
	ExecutionError,
}
