//! Dispatcher core: the listener registry and synchronous fan-out engine.
//!
//! # Mental model
//!
//! * Readers pin the current snapshot through a [`View`] and fan out
//!   against that immutable state.
//! * Mutators build a replacement snapshot, publish it with CAS (a failed
//!   CAS means "someone else won first"; rebuild and retry), then wait out
//!   the reclamation barrier before returning.
//! * The barrier first waits until no view still pins the superseded
//!   snapshot, then until every earlier replacement has finished its own
//!   barrier, and finally records the superseded generation as free.
//!
//! The barrier chain is what makes unsubscription a hard guarantee: once
//! `repudiate` returns, no invocation, in-flight or future, can call the
//! removed listener. The cost is that every mutating operation may block
//! behind outstanding views, bounded only by callback execution. There is
//! no timeout and no cancellation; a stalled callback stalls mutators
//! indefinitely. That trade-off is deliberate and load-bearing.
//!
//! Callbacks must not subscribe, unsubscribe, clear, or invoke the same
//! dispatcher: the mutating half would wait on the view their own
//! invocation still holds.

use std::sync::Arc;
use std::sync::atomic::{Ordering, fence};

use tracing::{debug, error, trace};

use crate::counter::WaitCounter;
use crate::error::AllocError;
use crate::listener::Listener;
use crate::slot::SnapshotSlot;
use crate::snapshot::{ArrayAlloc, HeapAlloc, Snapshot, SnapshotFactory};
use crate::view::View;

/// Shared dispatcher state; owned jointly by the [`Event`] handle, every
/// [`Subscription`], and every live [`View`].
pub(crate) struct EventCore<T: 'static> {
	slot: SnapshotSlot<T>,
	factory: SnapshotFactory<T>,
	/// Released views and finished invocations; the wake channel for the
	/// view-count wait.
	calls_retired: WaitCounter,
	/// Count of snapshot generations whose reclamation barrier has
	/// completed, advancing strictly in generation order.
	free_generation: WaitCounter,
}

impl<T: 'static> EventCore<T> {
	fn new(factory: SnapshotFactory<T>) -> Self {
		let initial = factory.empty();
		Self {
			slot: SnapshotSlot::new(initial),
			factory,
			calls_retired: WaitCounter::new(0),
			free_generation: WaitCounter::new(0),
		}
	}

	/// Pins the current snapshot behind a view.
	///
	/// Registration is validated against the slot: register, re-check the
	/// snapshot is still installed, otherwise undo and retry. A mutator
	/// that swapped the snapshot out concurrently therefore either sees
	/// the registration when it samples the view count after its CAS, or
	/// the registration is rolled back and re-taken on the successor.
	pub(crate) fn view_lock(self: &Arc<Self>) -> View<T> {
		loop {
			let snapshot = self.slot.load();
			snapshot.register_view();
			// Pairs with the fence in await_reclaimed: either the barrier
			// observes this registration, or this re-check observes the
			// replacement and rolls the registration back.
			fence(Ordering::SeqCst);
			if self.slot.ptr_eq(&snapshot) {
				return View::new(snapshot, Arc::clone(self));
			}
			// Superseded between load and registration; a barrier may have
			// sampled the transient count, so route the undo through the
			// wake channel.
			snapshot.release_view();
			self.retire_view();
		}
	}

	/// Completion bookkeeping run by every view release.
	pub(crate) fn retire_view(&self) {
		self.calls_retired.increment();
		self.calls_retired.notify_all();
	}

	pub(crate) fn invoke(self: &Arc<Self>, args: &T) {
		let view = self.view_lock();
		for listener in view.iter() {
			if listener.is_attached() {
				listener.invoke(args);
			}
		}
		// The view's drop retires the call even when a callback panics.
	}

	pub(crate) fn subscribe(&self, listener: Arc<Listener<T>>) -> Result<(), AllocError> {
		let mut current = self.slot.load();
		loop {
			let next = self.factory.push_back(&current, Arc::clone(&listener))?;
			match self.slot.compare_exchange(&current, next) {
				Ok(()) => {
					trace!(
						generation = current.generation() + 1,
						listeners = current.len() + 1,
						"subscribed listener"
					);
					self.await_reclaimed(current);
					return Ok(());
				}
				Err(actual) => {
					trace!("subscribe lost publication race; rebuilding");
					current = actual;
				}
			}
		}
	}

	/// Removes the listener and blocks until nothing can call it anymore.
	pub(crate) fn repudiate(&self, listener: &Arc<Listener<T>>) -> Result<(), AllocError> {
		let mut current = self.slot.load();
		loop {
			let Some(next) = self.factory.remove(&current, listener)? else {
				// A concurrent clear() wiped the registry. Its barrier
				// covers every snapshot that still contained the listener,
				// so waiting for the wiped generation gives the same
				// guarantee without publishing a no-op copy.
				let generation = current.generation();
				drop(current);
				self.await_generation_free(generation);
				return Ok(());
			};
			match self.slot.compare_exchange(&current, next) {
				Ok(()) => {
					trace!(
						generation = current.generation() + 1,
						listeners = current.len() - 1,
						"repudiated listener"
					);
					self.await_reclaimed(current);
					return Ok(());
				}
				Err(actual) => {
					trace!("repudiate lost publication race; rebuilding");
					current = actual;
				}
			}
		}
	}

	/// Detaches every subscribed listener and wipes the registry.
	pub(crate) fn clear(&self) {
		let mut current = self.slot.load();
		let mut detached = 0usize;
		loop {
			for listener in current.entries() {
				if listener.detach() {
					detached += 1;
				}
			}
			let next = self.factory.cleared(&current);
			match self.slot.compare_exchange(&current, next) {
				Ok(()) => {
					debug!(
						detached,
						generation = current.generation() + 1,
						"cleared listener registry"
					);
					self.await_reclaimed(current);
					return;
				}
				// A racing subscribe won; its listener must be detached
				// too. Detach is idempotent, so re-walking the overlap is
				// harmless.
				Err(actual) => current = actual,
			}
		}
	}

	pub(crate) fn len(&self) -> usize {
		self.slot.load().len()
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.slot.load().is_empty()
	}

	/// Reclamation barrier shared by every successful replacement.
	///
	/// Waits until the superseded snapshot is unpinned, then until every
	/// earlier replacement has retired its own superseded snapshot, and
	/// finally records this generation as free. The chaining is why a
	/// single long-lived view blocks *all* later mutations: the oldest
	/// barrier cannot complete, so no younger one can either.
	fn await_reclaimed(&self, superseded: Arc<Snapshot<T>>) {
		// Pairs with the fence in view_lock; ordered after this mutation's
		// winning CAS.
		fence(Ordering::SeqCst);
		loop {
			let observed = self.calls_retired.load();
			if superseded.view_count() == 0 {
				break;
			}
			self.calls_retired.wait(observed);
		}

		let generation = superseded.generation();
		drop(superseded);

		self.await_generation_free(generation);
		self.free_generation.increment();
		self.free_generation.notify_all();
	}

	/// Blocks until at least `generation` superseded snapshots have been
	/// observed free.
	fn await_generation_free(&self, generation: u64) {
		loop {
			let observed = self.free_generation.load();
			if observed >= generation {
				break;
			}
			self.free_generation.wait(observed);
		}
	}
}

/// The listener registry and synchronous fan-out engine.
///
/// Many threads may subscribe, unsubscribe, and invoke concurrently.
/// Dispatch never blocks on a held lock; each invocation fans out over one
/// consistent snapshot of the registry in subscription order. Dropping the
/// event clears the registry first, so no listener outlives a dispatcher
/// that might still be asked to call it.
pub struct Event<T: 'static> {
	core: Arc<EventCore<T>>,
}

impl<T: 'static> Event<T> {
	/// Dispatcher backed by process-heap snapshot storage.
	pub fn new() -> Self {
		Self::with_alloc(Arc::new(HeapAlloc))
	}

	/// Dispatcher with an injected allocation capability, consulted for
	/// every snapshot copy.
	pub fn with_alloc(alloc: Arc<dyn ArrayAlloc<T>>) -> Self {
		Self {
			core: Arc::new(EventCore::new(SnapshotFactory::new(alloc))),
		}
	}

	/// Registers a callback; it may be invoked from the moment this
	/// returns. Dropping the returned handle unsubscribes.
	///
	/// Fails atomically when the allocation capability refuses the
	/// snapshot copy; the registry is left untouched.
	pub fn subscribe<F>(&self, callback: F) -> Result<Subscription<T>, AllocError>
	where
		F: Fn(&T) + Send + Sync + 'static,
	{
		let listener = Arc::new(Listener::new(Box::new(callback)));
		self.core.subscribe(Arc::clone(&listener))?;
		Ok(Subscription {
			listener,
			core: Arc::clone(&self.core),
		})
	}

	/// Calls every currently subscribed listener synchronously with
	/// `args`, in subscription order, against one consistent snapshot.
	///
	/// A panicking callback aborts the remainder of this fan-out and
	/// propagates; the completion bookkeeping still runs.
	pub fn invoke(&self, args: &T) {
		self.core.invoke(args);
	}

	/// Detaches every subscribed listener exactly once and wipes the
	/// registry, then blocks until no in-flight invocation still holds a
	/// snapshot referencing them.
	pub fn clear(&self) {
		self.core.clear();
	}

	/// Number of currently subscribed listeners.
	pub fn len(&self) -> usize {
		self.core.len()
	}

	pub fn is_empty(&self) -> bool {
		self.core.is_empty()
	}

	/// Pins the current snapshot behind a [`View`]; safe to send across
	/// threads. While the view lives, every mutating operation on this
	/// dispatcher blocks in its reclamation barrier.
	pub fn view_lock(&self) -> View<T> {
		self.core.view_lock()
	}
}

impl<T: 'static> Default for Event<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: 'static> Drop for Event<T> {
	fn drop(&mut self) {
		self.core.clear();
	}
}

/// RAII handle for one subscribed listener; dropping it unsubscribes.
///
/// The drop blocks until no in-flight invocation can still call the
/// listener. If a dispatcher [`clear`](Event::clear) detached the listener
/// first, drop is a no-op beyond releasing the handle's references.
#[must_use = "dropping a subscription immediately unsubscribes the listener"]
pub struct Subscription<T: 'static> {
	listener: Arc<Listener<T>>,
	core: Arc<EventCore<T>>,
}

impl<T: 'static> std::fmt::Debug for Subscription<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription")
			.field("attached", &self.is_attached())
			.finish_non_exhaustive()
	}
}

impl<T: 'static> Subscription<T> {
	/// Whether the listener is still attached to its dispatcher.
	pub fn is_attached(&self) -> bool {
		self.listener.is_attached()
	}

	/// Detaches and removes the listener, surfacing an allocation refusal
	/// the drop path could only log.
	pub fn unsubscribe(self) -> Result<(), AllocError> {
		if self.listener.detach() {
			return self.core.repudiate(&self.listener);
		}
		Ok(())
	}
}

impl<T: 'static> Drop for Subscription<T> {
	fn drop(&mut self) {
		if !self.listener.detach() {
			return;
		}
		if let Err(refusal) = self.core.repudiate(&self.listener) {
			// The listener stays detached, so invocations skip it even
			// though the registry copy could not be rebuilt.
			error!(error = %refusal, "listener removal failed; detached entry left in registry");
		}
	}
}
