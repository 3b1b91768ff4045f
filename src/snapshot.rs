//! Immutable listener snapshots and the factory that copies them.
//!
//! Readers pin an `Arc<Snapshot>` and iterate it without locks; writers
//! never mutate in place. Every mutation of the registry is a full copy
//! built here, tagged with the next generation, and published elsewhere
//! through the slot's compare-and-swap.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::AllocError;
use crate::listener::Listener;

/// Backing-storage capability consulted for every non-empty snapshot copy.
///
/// The default [`HeapAlloc`] hands out plain heap vectors and never
/// refuses. Implementations may pool or cap storage; a refusal makes the
/// requesting mutation fail atomically, leaving the prior snapshot
/// installed. Storage is released when the snapshot's last reference
/// drops.
pub trait ArrayAlloc<T: 'static>: Send + Sync {
	/// Returns storage with room for exactly `entries` listener references.
	fn allocate(&self, entries: usize) -> Result<Vec<Arc<Listener<T>>>, AllocError>;
}

/// Process-heap allocation; never refuses.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAlloc;

impl<T: 'static> ArrayAlloc<T> for HeapAlloc {
	fn allocate(&self, entries: usize) -> Result<Vec<Arc<Listener<T>>>, AllocError> {
		Ok(Vec::with_capacity(entries))
	}
}

/// Immutable ordered set of listener references plus a generation tag.
///
/// Lifetime is the longest holder among the slot, any live view, and any
/// in-flight mutation that pinned it mid-CAS. The view count is the
/// observable external reference count the reclamation barrier compares
/// against zero.
pub struct Snapshot<T: 'static> {
	entries: Box<[Arc<Listener<T>>]>,
	generation: u64,
	views: AtomicUsize,
}

impl<T: 'static> Snapshot<T> {
	fn new(entries: Box<[Arc<Listener<T>>]>, generation: u64) -> Self {
		Self {
			entries,
			generation,
			views: AtomicUsize::new(0),
		}
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Version id assigned when this snapshot was built to replace the
	/// slot's contents. Strictly increases by one per replacement.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub(crate) fn entries(&self) -> &[Arc<Listener<T>>] {
		&self.entries
	}

	pub(crate) fn contains(&self, listener: &Arc<Listener<T>>) -> bool {
		self.entries.iter().any(|entry| Arc::ptr_eq(entry, listener))
	}

	pub(crate) fn register_view(&self) {
		self.views.fetch_add(1, Ordering::SeqCst);
	}

	pub(crate) fn release_view(&self) {
		let prior = self.views.fetch_sub(1, Ordering::SeqCst);
		debug_assert!(prior > 0, "view released twice");
	}

	pub(crate) fn view_count(&self) -> usize {
		self.views.load(Ordering::SeqCst)
	}
}

impl<T: 'static> std::fmt::Debug for Snapshot<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Snapshot")
			.field("len", &self.len())
			.field("generation", &self.generation)
			.field("views", &self.view_count())
			.finish()
	}
}

/// Builds immutable snapshots through the injected allocation capability.
///
/// All operations are pure: nothing shared is mutated beyond allocating
/// the new snapshot. Zero-length snapshots are valid and bypass the
/// capability entirely, so [`empty`](SnapshotFactory::empty) and
/// [`cleared`](SnapshotFactory::cleared) cannot fail.
pub struct SnapshotFactory<T: 'static> {
	alloc: Arc<dyn ArrayAlloc<T>>,
}

impl<T: 'static> SnapshotFactory<T> {
	pub fn new(alloc: Arc<dyn ArrayAlloc<T>>) -> Self {
		Self { alloc }
	}

	/// Size 0, generation 0. The dispatcher's initial snapshot.
	pub fn empty(&self) -> Arc<Snapshot<T>> {
		Arc::new(Snapshot::new(Box::default(), 0))
	}

	/// Size 1, generation 1.
	pub fn singleton(&self, listener: Arc<Listener<T>>) -> Result<Arc<Snapshot<T>>, AllocError> {
		let mut entries = self.alloc.allocate(1)?;
		entries.push(listener);
		Ok(Arc::new(Snapshot::new(entries.into_boxed_slice(), 1)))
	}

	/// Copy of all entries plus `listener` appended; generation advances
	/// by one. O(n) in the prior size.
	pub fn push_back(
		&self,
		prior: &Snapshot<T>,
		listener: Arc<Listener<T>>,
	) -> Result<Arc<Snapshot<T>>, AllocError> {
		debug_assert!(!prior.contains(&listener), "listener already present in snapshot");

		let mut entries = self.alloc.allocate(prior.len() + 1)?;
		entries.extend(prior.entries().iter().cloned());
		entries.push(listener);
		Ok(Arc::new(Snapshot::new(
			entries.into_boxed_slice(),
			prior.generation() + 1,
		)))
	}

	/// Copy with the first occurrence of `listener` removed; generation
	/// advances by one.
	///
	/// Returns `Ok(None)` without allocating when the listener does not
	/// occur; a concurrent wipe of the registry already superseded every
	/// snapshot that contained it.
	pub fn remove(
		&self,
		prior: &Snapshot<T>,
		listener: &Arc<Listener<T>>,
	) -> Result<Option<Arc<Snapshot<T>>>, AllocError> {
		let Some(position) = prior
			.entries()
			.iter()
			.position(|entry| Arc::ptr_eq(entry, listener))
		else {
			return Ok(None);
		};

		let mut entries = self.alloc.allocate(prior.len() - 1)?;
		entries.extend(
			prior
				.entries()
				.iter()
				.enumerate()
				.filter(|(index, _)| *index != position)
				.map(|(_, entry)| entry.clone()),
		);
		Ok(Some(Arc::new(Snapshot::new(
			entries.into_boxed_slice(),
			prior.generation() + 1,
		))))
	}

	/// Size 0, generation advanced by one. Used by the dispatcher's wipe
	/// so it participates in the generation chain like any other
	/// replacement.
	pub fn cleared(&self, prior: &Snapshot<T>) -> Arc<Snapshot<T>> {
		Arc::new(Snapshot::new(Box::default(), prior.generation() + 1))
	}
}

impl<T: 'static> Default for SnapshotFactory<T> {
	fn default() -> Self {
		Self::new(Arc::new(HeapAlloc))
	}
}

#[cfg(test)]
mod tests;
