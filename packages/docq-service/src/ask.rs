use docq_domain::{Conversation, QueryDescriptor, extract, prompt, query};

use crate::{Agent, QueryOutcome, QueryResult, Result, execute};

impl Agent {
	/// Runs one request through the whole pipeline.
	///
	/// Failures come back as [`QueryOutcome::Error`]. The conversation only records the round trip
	/// when the database operation succeeded.
	pub async fn ask(&self, conversation: &mut Conversation, text: &str) -> QueryOutcome {
		let result = self.run(conversation, text).await;

		if let Err(err) = &result {
			tracing::info!(kind = ?err.kind(), error = %err, "Request failed.");
		}

		result.into()
	}

	/// Prompt, completion and extraction only. Nothing is validated or executed.
	pub async fn translate(
		&self,
		conversation: &Conversation,
		text: &str,
	) -> Result<QueryDescriptor> {
		self.complete_and_extract(conversation, text).await
	}

	async fn run(&self, conversation: &mut Conversation, text: &str) -> Result<QueryResult> {
		let descriptor = self.complete_and_extract(conversation, text).await?;
		let assistant_turn = assistant_turn(&descriptor);
		let query = query::validate(descriptor, &self.schema, self.cfg.agent.allow_writes)?;

		if !query.dropped_fields.is_empty() {
			tracing::debug!(
				collection = %query.collection,
				dropped = ?query.dropped_fields,
				"Dropped filter keys outside the collection schema."
			);
		}

		let result = execute::execute(self.store.as_ref(), &query).await?;

		conversation.record_turn(text, assistant_turn);

		Ok(result)
	}

	async fn complete_and_extract(
		&self,
		conversation: &Conversation,
		text: &str,
	) -> Result<QueryDescriptor> {
		let prompt =
			prompt::build(text, &self.schema, &self.collections, self.cfg.agent.allow_writes);

		match prompt.focus.as_ref() {
			Some(focus) => tracing::debug!(
				collection = %focus.collection,
				fields = ?focus.fields,
				"Narrowed prompt to one collection."
			),
			None => tracing::debug!("No collection matched; prompt lists every collection."),
		}

		let messages = prompt.messages(conversation);
		let raw = self
			.providers
			.completion
			.complete(&self.cfg.providers.completion, &messages)
			.await?;

		tracing::debug!(completion = %raw, "Raw completion text.");

		Ok(extract::extract(&raw)?)
	}
}

/// The assistant side of a recorded turn: the extracted query as a fenced block, without any
/// reasoning text the model produced around it.
fn assistant_turn(descriptor: &QueryDescriptor) -> String {
	let body = serde_json::to_string(descriptor).unwrap_or_else(|_| "{}".to_string());

	format!("```json\n{body}\n```")
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn assistant_turn_is_a_fenced_descriptor() {
		let descriptor: QueryDescriptor =
			serde_json::from_value(json!({ "collection": "users", "filter": { "age": 3 } }))
				.expect("descriptor");
		let turn = assistant_turn(&descriptor);

		assert_eq!(extract::extract(&turn), Ok(descriptor));
	}
}
