use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Callback capability invoked once per dispatch.
pub(crate) type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

/// A subscriber's registered callback plus its one-shot detach flag.
///
/// Snapshots reference listeners, they never own them: the `Arc` around a
/// `Listener` is shared between the subscriber's handle and every snapshot
/// generation that includes it, so the storage outlives any in-flight
/// invocation that might still call into it.
pub struct Listener<T: 'static> {
	callback: Callback<T>,
	attached: AtomicBool,
}

impl<T: 'static> Listener<T> {
	pub(crate) fn new(callback: Callback<T>) -> Self {
		Self {
			callback,
			attached: AtomicBool::new(true),
		}
	}

	/// Runs the callback with the dispatched arguments.
	pub(crate) fn invoke(&self, args: &T) {
		(self.callback)(args);
	}

	/// Claims the one-shot detach. Only the first caller gets `true`;
	/// whichever of handle drop or dispatcher clear comes second becomes a
	/// no-op.
	pub(crate) fn detach(&self) -> bool {
		self.attached.swap(false, Ordering::SeqCst)
	}

	/// Whether the listener is still attached to its dispatcher.
	pub fn is_attached(&self) -> bool {
		self.attached.load(Ordering::SeqCst)
	}
}

impl<T: 'static> fmt::Debug for Listener<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Listener")
			.field("attached", &self.is_attached())
			.finish_non_exhaustive()
	}
}
