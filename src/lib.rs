//! Thread-safe synchronous publish/subscribe with copy-on-write listener
//! snapshots.
//!
//! An [`Event`] fans out to its subscribers synchronously, on the calling
//! thread, against one immutable snapshot of the registry per invocation.
//! Mutations (subscribe, unsubscribe, clear) publish a replacement
//! snapshot with compare-and-swap and then wait until the superseded
//! snapshot is provably unreferenced, so unsubscription is a hard
//! guarantee: once it returns, the listener can no longer be called, and
//! its storage was never freed while an in-flight invocation could still
//! reach it.
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicI64, Ordering};
//!
//! use fanout::Event;
//!
//! let clicks = Event::<i32>::new();
//! let total = Arc::new(AtomicI64::new(0));
//!
//! let sum = Arc::clone(&total);
//! let sub = clicks.subscribe(move |delta| {
//! 	sum.fetch_add(i64::from(*delta), Ordering::SeqCst);
//! })?;
//!
//! clicks.invoke(&3);
//! clicks.invoke(&4);
//! assert_eq!(total.load(Ordering::SeqCst), 7);
//!
//! drop(sub);
//! clicks.invoke(&5);
//! assert_eq!(total.load(Ordering::SeqCst), 7);
//! # Ok::<(), fanout::AllocError>(())
//! ```

/// Blocking-wait monotonic counters.
pub mod counter;
/// Allocation-refusal error type.
pub mod error;
/// The dispatcher and its subscription handle.
pub mod event;
/// Listener capability: callback plus one-shot detach.
pub mod listener;
/// Atomically swappable current-snapshot holder.
pub mod slot;
/// Immutable listener snapshots and their factory.
pub mod snapshot;
/// Pinned, iterable windows over one snapshot.
pub mod view;

pub use counter::WaitCounter;
pub use error::AllocError;
pub use event::{Event, Subscription};
pub use listener::Listener;
pub use slot::SnapshotSlot;
pub use snapshot::{ArrayAlloc, HeapAlloc, Snapshot, SnapshotFactory};
pub use view::View;
