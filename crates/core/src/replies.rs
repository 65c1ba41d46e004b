//! Reply correlation.
//!
//! Every request awaiting a reply owns one entry keyed by its message id.
//! An entry is settled exactly once: by the matching reply, by its timer, or
//! by teardown. Settling removes the entry under the table lock, so whichever
//! path gets there first wins and the others find nothing to do.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bridge_protocol::Envelope;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::error::{Error, Result};

pub(crate) type ReplyReceiver = oneshot::Receiver<Result<Envelope>>;

struct PendingReply {
	tx: oneshot::Sender<Result<Envelope>>,
	timer: Option<AbortHandle>,
}

impl PendingReply {
	fn finish(self, result: Result<Envelope>) {
		if let Some(timer) = self.timer {
			timer.abort();
		}
		// the caller may have stopped waiting
		let _ = self.tx.send(result);
	}
}

/// Table of requests awaiting replies.
#[derive(Clone, Default)]
pub(crate) struct ReplyCorrelator {
	entries: Arc<Mutex<HashMap<String, PendingReply>>>,
}

impl ReplyCorrelator {
	/// Registers a pending reply for `id` that times out after `timeout`.
	///
	/// Must be called from within a tokio runtime; the timer is a spawned task.
	pub(crate) fn register(&self, id: &str, timeout: Duration) -> ReplyReceiver {
		let (tx, rx) = oneshot::channel();
		self.entries.lock().insert(
			id.to_string(),
			PendingReply { tx, timer: None },
		);

		let timer = tokio::spawn({
			let this = self.clone();
			let id = id.to_string();
			async move {
				tokio::time::sleep(timeout).await;
				if this.settle(&id, Err(Error::Timeout)) {
					debug!(target = "bridge.replies", %id, ?timeout, "reply timed out");
				}
			}
		});

		match self.entries.lock().get_mut(id) {
			Some(entry) => entry.timer = Some(timer.abort_handle()),
			// settled before the timer was attached
			None => timer.abort(),
		}
		rx
	}

	/// Settles the entry for `id`. Returns `false` if no such entry is pending.
	pub(crate) fn settle(&self, id: &str, result: Result<Envelope>) -> bool {
		let entry = self.entries.lock().remove(id);
		match entry {
			Some(entry) => {
				entry.finish(result);
				true
			}
			None => false,
		}
	}

	/// Settles every pending entry with the error produced by `make_error`.
	/// Returns the ids that were rejected.
	pub(crate) fn reject_all(&self, make_error: impl Fn() -> Error) -> Vec<String> {
		let drained: Vec<(String, PendingReply)> = self.entries.lock().drain().collect();
		drained
			.into_iter()
			.map(|(id, entry)| {
				entry.finish(Err(make_error()));
				id
			})
			.collect()
	}

	#[cfg(test)]
	fn contains(&self, id: &str) -> bool {
		self.entries.lock().contains_key(id)
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.lock().len()
	}
}
