use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORY_MAX_ENTRIES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	System,
	User,
	Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
	pub role: Role,
	pub content: String,
}
impl ChatMessage {
	pub fn system(content: impl Into<String>) -> Self {
		Self { role: Role::System, content: content.into() }
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self { role: Role::User, content: content.into() }
	}

	pub fn assistant(content: impl Into<String>) -> Self {
		Self { role: Role::Assistant, content: content.into() }
	}
}

/// Bounded log of prior user/assistant entries, oldest dropped first.
///
/// One conversation belongs to one logical session. Sharing it between unrelated callers
/// interleaves their histories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
	entries: VecDeque<ChatMessage>,
	max_entries: usize,
}
impl Conversation {
	pub fn new(max_entries: usize) -> Self {
		let max_entries = max_entries.max(1);

		Self { entries: VecDeque::with_capacity(max_entries), max_entries }
	}

	/// Appends one completed round trip.
	pub fn record_turn(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
		self.push(ChatMessage::user(user));
		self.push(ChatMessage::assistant(assistant));
	}

	pub fn entries(&self) -> impl ExactSizeIterator<Item = &ChatMessage> {
		self.entries.iter()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn max_entries(&self) -> usize {
		self.max_entries
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}

	fn push(&mut self, message: ChatMessage) {
		self.entries.push_back(message);

		while self.entries.len() > self.max_entries {
			self.entries.pop_front();
		}
	}
}
impl Default for Conversation {
	fn default() -> Self {
		Self::new(DEFAULT_HISTORY_MAX_ENTRIES)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn roles_serialize_lowercase() {
		let json = serde_json::to_value(ChatMessage::assistant("ok")).expect("serialize failed");

		assert_eq!(json, serde_json::json!({ "role": "assistant", "content": "ok" }));
	}

	#[test]
	fn zero_bound_keeps_one_entry() {
		let mut conversation = Conversation::new(0);

		conversation.record_turn("q", "a");

		assert_eq!(conversation.len(), 1);
		assert_eq!(conversation.entries().next(), Some(&ChatMessage::assistant("a")));
	}
}
