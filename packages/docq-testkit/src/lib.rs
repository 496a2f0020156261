mod error;

pub use error::{Error, Result};

use std::{env, future::Future, thread, time::Duration};

use mongodb::{Client, Database, bson::Document, options::ClientOptions};
use tokio::{runtime::Builder, time};
use uuid::Uuid;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A uniquely named MongoDB database that is dropped when the test is done.
pub struct TestDatabase {
	name: String,
	uri: String,
	client: Client,
	cleaned: bool,
}
impl TestDatabase {
	pub async fn new(base_uri: &str) -> Result<Self> {
		let client = connect(base_uri).await?;
		let name = format!("docq_test_{}", Uuid::new_v4().simple());

		Ok(Self { name, uri: base_uri.to_string(), client, cleaned: false })
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn uri(&self) -> &str {
		&self.uri
	}

	pub fn database(&self) -> Database {
		self.client.database(&self.name)
	}

	/// Storage settings pointing at this database.
	pub fn mongo_config(&self) -> docq_config::Mongo {
		docq_config::Mongo {
			uri: self.uri.clone(),
			uri_env: None,
			database: self.name.clone(),
		}
	}

	pub async fn seed(&self, collection: &str, documents: Vec<Document>) -> Result<()> {
		if documents.is_empty() {
			self.database().create_collection(collection).await?;

			return Ok(());
		}

		self.database().collection::<Document>(collection).insert_many(documents).await?;

		Ok(())
	}

	pub async fn cleanup(mut self) -> Result<()> {
		self.cleanup_inner().await
	}

	async fn cleanup_inner(&mut self) -> Result<()> {
		if self.cleaned {
			return Ok(());
		}

		drop_database(&self.client, &self.name).await?;

		self.cleaned = true;

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.cleaned {
			return;
		}

		let name = self.name.clone();
		let uri = self.uri.clone();
		let cleanup_thread = thread::spawn(move || {
			let runtime = match Builder::new_current_thread().enable_all().build() {
				Ok(runtime) => runtime,
				Err(err) => {
					eprintln!("Test database cleanup failed: {err}.");

					return;
				},
			};

			// The test runtime may be blocked on this thread, so use a client owned by this one.
			let result = runtime.block_on(async {
				let client = connect(&uri).await?;

				drop_database(&client, &name).await
			});

			if let Err(err) = result {
				eprintln!("Test database cleanup failed: {err}.");
			}
		});
		let _ = cleanup_thread.join();
	}
}

pub fn env_uri() -> Option<String> {
	env::var("DOCQ_MONGO_URI").ok()
}

pub async fn with_test_db<F, Fut, T>(base_uri: &str, f: F) -> Result<T>
where
	F: FnOnce(&TestDatabase) -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let db = TestDatabase::new(base_uri).await?;
	let result = f(&db).await;
	let mut db = db;

	if let Err(err) = db.cleanup_inner().await {
		eprintln!("Test database cleanup warning: {err}.");

		if result.is_ok() {
			return Err(err);
		}
	}

	result
}

async fn connect(uri: &str) -> Result<Client> {
	let mut options = ClientOptions::parse(uri)
		.await
		.map_err(|err| Error::Message(format!("Failed to parse DOCQ_MONGO_URI: {err}.")))?;

	options.server_selection_timeout = Some(CONNECT_TIMEOUT);

	Ok(Client::with_options(options)?)
}

async fn drop_database(client: &Client, name: &str) -> Result<()> {
	time::timeout(Duration::from_secs(10), client.database(name).drop())
		.await
		.map_err(|_| Error::Message(format!("Timed out dropping test database {name}.")))?
		.map_err(|err| Error::Message(format!("Failed to drop test database {name}: {err}.")))
}
