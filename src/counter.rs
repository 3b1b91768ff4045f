use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};

/// Monotonic counter with blocking-wait semantics.
///
/// Readers call [`wait`](WaitCounter::wait) with the last value they
/// observed and sleep until the value changes; writers bump the counter
/// and [`notify_all`](WaitCounter::notify_all). Loads and increments stay
/// lock-free; the mutex is touched only around the sleep/wake edge so a
/// notify issued after a store can never be missed by a thread that began
/// waiting before the store.
pub struct WaitCounter {
	value: AtomicU64,
	gate: Mutex<()>,
	changed: Condvar,
}

impl WaitCounter {
	pub fn new(initial: u64) -> Self {
		Self {
			value: AtomicU64::new(initial),
			gate: Mutex::new(()),
			changed: Condvar::new(),
		}
	}

	pub fn load(&self) -> u64 {
		self.value.load(Ordering::SeqCst)
	}

	pub fn store(&self, value: u64) {
		self.value.store(value, Ordering::SeqCst);
	}

	/// Adds one, wrapping at `u64::MAX`, and returns the prior value.
	pub fn increment(&self) -> u64 {
		self.value.fetch_add(1, Ordering::SeqCst)
	}

	/// Blocks until the counter no longer reads `old`.
	///
	/// Fast path returns without locking. Spurious wakeups are absorbed by
	/// re-checking the predicate under the gate.
	pub fn wait(&self, old: u64) {
		if self.value.load(Ordering::SeqCst) != old {
			return;
		}
		let mut guard = self.gate.lock();
		while self.value.load(Ordering::SeqCst) == old {
			self.changed.wait(&mut guard);
		}
	}

	/// Wakes every waiter.
	///
	/// Acquires and releases the gate first, so a waiter that has checked
	/// the predicate but not yet gone to sleep still observes the wake.
	pub fn notify_all(&self) {
		drop(self.gate.lock());
		self.changed.notify_all();
	}
}

#[cfg(test)]
mod tests;
