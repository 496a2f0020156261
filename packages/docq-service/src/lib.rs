//! The request-to-query agent: schema inspection, prompt, completion, extraction, validation and
//! execution wired into one pipeline.

pub mod ask;
pub mod execute;
pub mod inspect;

mod error;

pub use error::{Error, ErrorKind, Result};
pub use execute::QueryResult;

use std::{future::Future, pin::Pin, sync::Arc};

use serde::Serialize;

use docq_config::{CompletionProviderConfig, Config};
use docq_domain::{ChatMessage, Conversation, SchemaMap};
use docq_providers::completion;
use docq_storage::{DocumentStore, MongoStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait CompletionProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a CompletionProviderConfig,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, docq_providers::Result<String>>;
}

#[derive(Clone)]
pub struct Providers {
	pub completion: Arc<dyn CompletionProvider>,
}
impl Providers {
	pub fn new(completion: Arc<dyn CompletionProvider>) -> Self {
		Self { completion }
	}
}
impl Default for Providers {
	fn default() -> Self {
		Self { completion: Arc::new(DefaultProviders) }
	}
}

struct DefaultProviders;
impl CompletionProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a CompletionProviderConfig,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, docq_providers::Result<String>> {
		Box::pin(completion::complete(cfg, messages))
	}
}

/// Either a result or a tagged error, serialized as `{"result": ..}` or `{"error": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOutcome {
	Result(QueryResult),
	Error(ErrorBody),
}
impl QueryOutcome {
	pub fn is_ok(&self) -> bool {
		matches!(self, Self::Result(_))
	}

	pub fn into_result(self) -> std::result::Result<QueryResult, ErrorBody> {
		match self {
			Self::Result(result) => Ok(result),
			Self::Error(body) => Err(body),
		}
	}
}
impl From<Result<QueryResult>> for QueryOutcome {
	fn from(result: Result<QueryResult>) -> Self {
		match result {
			Ok(result) => Self::Result(result),
			Err(err) => Self::Error(err.into()),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
	pub kind: ErrorKind,
	pub message: String,
}
impl From<Error> for ErrorBody {
	fn from(err: Error) -> Self {
		Self { kind: err.kind(), message: err.message().to_string() }
	}
}

/// Owns the database handle and the schema learned when it was opened.
///
/// The agent itself holds no conversation. Callers keep one [`Conversation`] per logical session
/// and pass it to [`Agent::ask`].
pub struct Agent {
	pub cfg: Config,
	store: Arc<dyn DocumentStore>,
	providers: Providers,
	collections: Vec<String>,
	schema: SchemaMap,
}
impl Agent {
	/// Connects to MongoDB and inspects it.
	pub async fn open(cfg: Config) -> Result<Self> {
		let store = MongoStore::connect(&cfg.storage.mongo).await.map_err(|err| {
			tracing::error!(error = %err, "Failed to connect to MongoDB.");

			Error::Execution { message: format!("Failed to connect to the database: {err}") }
		})?;

		Self::with_store(cfg, Arc::new(store), Providers::default()).await
	}

	/// Inspects `store` and builds an agent over it.
	pub async fn with_store(
		cfg: Config,
		store: Arc<dyn DocumentStore>,
		providers: Providers,
	) -> Result<Self> {
		let (collections, schema) = inspect::inspect(store.as_ref()).await?;

		tracing::info!(
			collections = collections.len(),
			inspected = schema.len(),
			"Schema inspection finished."
		);

		Ok(Self { cfg, store, providers, collections, schema })
	}

	pub fn schema(&self) -> &SchemaMap {
		&self.schema
	}

	/// Every collection name the database reported at open, including empty ones.
	pub fn collections(&self) -> &[String] {
		&self.collections
	}

	pub fn store(&self) -> &Arc<dyn DocumentStore> {
		&self.store
	}

	/// A fresh conversation sized by `agent.history_max_entries`.
	pub fn new_conversation(&self) -> Conversation {
		Conversation::new(self.cfg.agent.history_max_entries)
	}

	pub async fn close(&self) {
		self.store.close().await;
	}
}
