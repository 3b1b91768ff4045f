use std::sync::Arc;

use crate::event::EventCore;
use crate::listener::Listener;
use crate::snapshot::Snapshot;

/// Live window over one snapshot, used for safe iteration.
///
/// Holding a view pins its snapshot: no mutation's reclamation barrier can
/// complete while the view is alive, so the entries it iterates are never
/// freed underneath it. Views may be sent across threads. Dropping the
/// view releases the pin and wakes any mutator waiting in its barrier.
#[must_use = "a held view blocks unsubscription; drop it to release the snapshot"]
pub struct View<T: 'static> {
	snapshot: Arc<Snapshot<T>>,
	core: Arc<EventCore<T>>,
}

impl<T: 'static> View<T> {
	/// The snapshot must already be view-registered; see
	/// [`EventCore::view_lock`] for the registration protocol.
	pub(crate) fn new(snapshot: Arc<Snapshot<T>>, core: Arc<EventCore<T>>) -> Self {
		Self { snapshot, core }
	}

	pub fn len(&self) -> usize {
		self.snapshot.len()
	}

	pub fn is_empty(&self) -> bool {
		self.snapshot.is_empty()
	}

	/// Generation of the pinned snapshot.
	pub fn generation(&self) -> u64 {
		self.snapshot.generation()
	}

	/// Iterates the pinned entries in snapshot order.
	pub fn iter(&self) -> impl Iterator<Item = &Listener<T>> {
		self.snapshot.entries().iter().map(|entry| &**entry)
	}
}

impl<T: 'static> Drop for View<T> {
	fn drop(&mut self) {
		// Unpin before signalling so a woken mutator re-samples a view
		// count that already reflects this release.
		self.snapshot.release_view();
		self.core.retire_view();
	}
}
