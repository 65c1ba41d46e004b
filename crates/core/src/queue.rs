//! Outbound messages produced before the session is ready.

use std::collections::VecDeque;

/// A serialized message waiting for the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QueuedMessage {
	pub(crate) id: String,
	pub(crate) text: String,
}

/// FIFO buffer flushed once per handshake.
#[derive(Debug, Default)]
pub(crate) struct SendQueue {
	pending: VecDeque<QueuedMessage>,
}

impl SendQueue {
	pub(crate) fn push(&mut self, id: String, text: String) {
		self.pending.push_back(QueuedMessage { id, text });
	}

	/// Writes queued messages in push order until `write` fails.
	///
	/// The failed message and everything after it stay queued.
	pub(crate) fn flush<E>(&mut self, mut write: impl FnMut(&str) -> Result<(), E>) -> Result<usize, E> {
		let mut sent = 0;
		while let Some(message) = self.pending.front() {
			write(&message.text)?;
			self.pending.pop_front();
			sent += 1;
		}
		Ok(sent)
	}

	#[cfg(test)]
	fn drain(&mut self) -> Vec<QueuedMessage> {
		self.pending.drain(..).collect()
	}

	/// Drops queued messages whose ids are listed.
	pub(crate) fn discard(&mut self, ids: &[String]) -> usize {
		let before = self.pending.len();
		self.pending.retain(|msg| !ids.contains(&msg.id));
		before - self.pending.len()
	}

	pub(crate) fn len(&self) -> usize {
		self.pending.len()
	}
}
