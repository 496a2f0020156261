use crate::{
	conversation::{ChatMessage, Conversation},
	matcher::{self, CollectionMatch},
	schema::SchemaMap,
};

/// System/user message pair for one completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
	pub system: String,
	pub user: String,
	/// Collection the field list was narrowed to, if the matcher found one.
	pub focus: Option<CollectionMatch>,
}
impl Prompt {
	/// Orders the request as system message, prior history, then the new user message.
	pub fn messages(&self, history: &Conversation) -> Vec<ChatMessage> {
		let mut messages = Vec::with_capacity(history.len() + 2);

		messages.push(ChatMessage::system(self.system.as_str()));
		messages.extend(history.entries().cloned());
		messages.push(ChatMessage::user(self.user.as_str()));

		messages
	}
}

pub fn build(
	user_text: &str,
	schema: &SchemaMap,
	available_collections: &[String],
	allow_writes: bool,
) -> Prompt {
	let focus = matcher::match_collection(user_text, schema);
	let mut system = String::from(
		"You are a database assistant that translates requests into MongoDB queries. \
Reply with one JSON object inside a ```json fenced code block and nothing else. \
The object must have the keys \"collection\" (a collection name) and \"filter\" \
(a JSON object using MongoDB query operators, {} to match every record).",
	);

	if allow_writes {
		system.push_str(
			" It may also have \"operation\", one of find, insert, update or delete (default find), \
and \"data\": the record or list of records to insert, or the fields to set for update.",
		);
	} else {
		system.push_str(" Only read queries are allowed; omit \"operation\" or set it to \"find\".");
	}

	system.push_str(" Ensure that the collection name exists in the database.");
	system.push_str(&format!(" Available collections: {}.", quoted_list(available_collections)));

	if let Some(focus) = focus.as_ref()
		&& let Some(fields) = schema.fields(&focus.collection)
	{
		system.push_str(&format!(
			" Use only these fields for \"{}\": {}.",
			focus.collection,
			quoted_list(fields)
		));
	}

	system.push_str(" Do not include explanations.");

	Prompt { system, user: user_text.to_string(), focus }
}

fn quoted_list(items: &[String]) -> String {
	if items.is_empty() {
		return "none".to_string();
	}

	items.iter().map(|item| format!("\"{item}\"")).collect::<Vec<_>>().join(", ")
}
