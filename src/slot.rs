use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::snapshot::Snapshot;

/// Atomically swappable holder of the current snapshot.
///
/// The single source of truth for "who is subscribed now". Readers pin an
/// `Arc` and never block a writer's CAS attempt; writers publish
/// replacements with compare-and-swap and rebuild from the latest snapshot
/// when they lose the race. A superseded snapshot stays alive while any
/// reader still holds its `Arc`.
pub struct SnapshotSlot<T: 'static> {
	current: ArcSwap<Snapshot<T>>,
}

impl<T: 'static> SnapshotSlot<T> {
	pub fn new(initial: Arc<Snapshot<T>>) -> Self {
		Self {
			current: ArcSwap::from(initial),
		}
	}

	/// Returns the installed snapshot, pinned.
	pub fn load(&self) -> Arc<Snapshot<T>> {
		self.current.load_full()
	}

	/// Whether `snapshot` is still the installed snapshot.
	pub fn ptr_eq(&self, snapshot: &Arc<Snapshot<T>>) -> bool {
		Arc::ptr_eq(&self.current.load(), snapshot)
	}

	/// Unconditionally replaces the installed snapshot.
	pub fn store(&self, next: Arc<Snapshot<T>>) {
		self.current.store(next);
	}

	/// Publishes `next` only while `current` is still installed.
	///
	/// On failure returns the actually installed snapshot so the caller
	/// can rebuild against it and retry.
	pub fn compare_exchange(
		&self,
		current: &Arc<Snapshot<T>>,
		next: Arc<Snapshot<T>>,
	) -> Result<(), Arc<Snapshot<T>>> {
		let previous = self.current.compare_and_swap(current, next);
		if Arc::ptr_eq(&previous, current) {
			Ok(())
		} else {
			Err(Arc::clone(&previous))
		}
	}
}
