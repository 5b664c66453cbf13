//! Per-procedure call serialization.
//!
//! Each serialized call owns a completion token. The lock table maps a
//! procedure name to the token of the most recently queued call, so a new
//! call only has to wait on the entry it replaces. Waiting calls therefore
//! form a chain in arrival order without a separate queue.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

type LockTable = Arc<Mutex<HashMap<String, InFlightLock>>>;

#[derive(Clone)]
struct InFlightLock {
	ticket: u64,
	completion: CancellationToken,
}

/// Runs serialized procedures one at a time per name.
#[derive(Default)]
pub struct CallSerializer {
	locks: LockTable,
	next_ticket: AtomicU64,
}

impl fmt::Debug for CallSerializer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CallSerializer")
			.field("locked", &self.locks.lock().len())
			.finish()
	}
}

impl CallSerializer {
	/// Creates an empty serializer.
	pub fn new() -> Self {
		Self::default()
	}

	/// Runs `work` once every earlier call for `name` has completed.
	///
	/// The lock is released when `work` finishes or when this future is
	/// dropped mid-run. A call dropped while still queued hands its place to
	/// the next caller only after the call ahead of it completes.
	pub async fn run<F: Future>(&self, name: &str, work: F) -> F::Output {
		let mut slot = self.enqueue(name);
		if let Some(prior) = slot.prior.clone() {
			tracing::debug!(procedure = name, "queued behind in-flight call");
			prior.cancelled().await;
			tracing::debug!(procedure = name, "running from queue");
		}
		slot.started = true;
		work.await
	}

	/// Returns `true` while a call for `name` is running or queued.
	pub fn is_locked(&self, name: &str) -> bool {
		self.locks.lock().contains_key(name)
	}

	fn enqueue(&self, name: &str) -> Slot {
		let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
		let completion = CancellationToken::new();
		let prior = self
			.locks
			.lock()
			.insert(
				name.to_owned(),
				InFlightLock {
					ticket,
					completion: completion.clone(),
				},
			)
			.map(|lock| lock.completion);

		Slot {
			locks: Arc::clone(&self.locks),
			name: name.to_owned(),
			ticket,
			completion,
			prior,
			started: false,
		}
	}
}

struct Slot {
	locks: LockTable,
	name: String,
	ticket: u64,
	completion: CancellationToken,
	prior: Option<CancellationToken>,
	started: bool,
}

impl Drop for Slot {
	fn drop(&mut self) {
		let pending_prior = self
			.prior
			.take()
			.filter(|prior| !self.started && !prior.is_cancelled());

		let Some(prior) = pending_prior else {
			release(&self.locks, &self.name, self.ticket, &self.completion);
			return;
		};

		let Ok(runtime) = tokio::runtime::Handle::try_current() else {
			release(&self.locks, &self.name, self.ticket, &self.completion);
			return;
		};

		let locks = Arc::clone(&self.locks);
		let name = std::mem::take(&mut self.name);
		let ticket = self.ticket;
		let completion = self.completion.clone();
		runtime.spawn(async move {
			prior.cancelled().await;
			release(&locks, &name, ticket, &completion);
		});
	}
}

/// Removes the table entry if it still belongs to `ticket`, then wakes the
/// next call in the chain.
fn release(locks: &LockTable, name: &str, ticket: u64, completion: &CancellationToken) {
	{
		let mut table = locks.lock();
		if table.get(name).is_some_and(|lock| lock.ticket == ticket) {
			table.remove(name);
		}
	}
	completion.cancel();
}
