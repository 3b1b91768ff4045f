use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;

use super::{ArrayAlloc, Snapshot, SnapshotFactory};
use crate::error::AllocError;
use crate::listener::Listener;

fn noop_listener() -> Arc<Listener<()>> {
	Arc::new(Listener::new(Box::new(|_: &()| {})))
}

/// Capability that refuses any request above a fixed entry count.
struct QuotaAlloc {
	max_entries: usize,
	calls: AtomicUsize,
}

impl QuotaAlloc {
	fn new(max_entries: usize) -> Self {
		Self {
			max_entries,
			calls: AtomicUsize::new(0),
		}
	}
}

impl ArrayAlloc<()> for QuotaAlloc {
	fn allocate(&self, entries: usize) -> Result<Vec<Arc<Listener<()>>>, AllocError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		if entries > self.max_entries {
			return Err(AllocError { requested: entries });
		}
		Ok(Vec::with_capacity(entries))
	}
}

#[test]
fn empty_is_generation_zero() {
	let factory = SnapshotFactory::<()>::default();
	let snap = factory.empty();

	assert_eq!(snap.len(), 0);
	assert!(snap.is_empty());
	assert_eq!(snap.generation(), 0);
}

#[test]
fn singleton_is_generation_one() {
	let factory = SnapshotFactory::<()>::default();
	let listener = noop_listener();
	let snap = factory.singleton(Arc::clone(&listener)).expect("heap alloc");

	assert_eq!(snap.len(), 1);
	assert_eq!(snap.generation(), 1);
	assert!(snap.contains(&listener));
}

#[test]
fn push_back_appends_and_advances_generation() {
	let factory = SnapshotFactory::<()>::default();
	let first = noop_listener();
	let second = noop_listener();

	let base = factory.empty();
	let one = factory.push_back(&base, Arc::clone(&first)).expect("heap alloc");
	let two = factory.push_back(&one, Arc::clone(&second)).expect("heap alloc");

	assert_eq!(two.len(), 2);
	assert_eq!(two.generation(), 2);
	// Subscription order is snapshot order.
	assert!(Arc::ptr_eq(&two.entries()[0], &first));
	assert!(Arc::ptr_eq(&two.entries()[1], &second));
	// The prior snapshot is untouched.
	assert_eq!(one.len(), 1);
	assert_eq!(one.generation(), 1);
}

#[test]
fn remove_first_occurrence_keeps_order() {
	let factory = SnapshotFactory::<()>::default();
	let listeners: Vec<_> = (0..3).map(|_| noop_listener()).collect();

	let mut snap = factory.empty();
	for listener in &listeners {
		snap = factory.push_back(&snap, Arc::clone(listener)).expect("heap alloc");
	}

	let removed = factory
		.remove(&snap, &listeners[1])
		.expect("heap alloc")
		.expect("listener present");

	assert_eq!(removed.len(), 2);
	assert_eq!(removed.generation(), 4);
	assert!(Arc::ptr_eq(&removed.entries()[0], &listeners[0]));
	assert!(Arc::ptr_eq(&removed.entries()[1], &listeners[2]));
}

/// Removing the last entry yields a valid zero-length snapshot, not a
/// sentinel; size and emptiness stay consistent.
#[test]
fn remove_last_entry_yields_empty_snapshot() {
	let factory = SnapshotFactory::<()>::default();
	let listener = noop_listener();

	let base = factory.empty();
	let one = factory.push_back(&base, Arc::clone(&listener)).expect("heap alloc");
	let emptied = factory
		.remove(&one, &listener)
		.expect("heap alloc")
		.expect("listener present");

	assert_eq!(emptied.len(), 0);
	assert!(emptied.is_empty());
	assert_eq!(emptied.generation(), 2);
}

#[test]
fn remove_absent_listener_reports_not_present() {
	let factory = SnapshotFactory::<()>::default();
	let present = noop_listener();
	let absent = noop_listener();

	let base = factory.empty();
	let one = factory.push_back(&base, present).expect("heap alloc");

	assert!(factory.remove(&one, &absent).expect("heap alloc").is_none());
}

#[test]
fn remove_absent_listener_allocates_nothing() {
	let alloc = Arc::new(QuotaAlloc::new(8));
	let factory = SnapshotFactory::new(Arc::clone(&alloc) as Arc<dyn ArrayAlloc<()>>);
	let present = noop_listener();
	let absent = noop_listener();

	let base = factory.empty();
	let one = factory.push_back(&base, present).expect("within quota");
	let calls_before = alloc.calls.load(Ordering::SeqCst);

	assert!(factory.remove(&one, &absent).expect("no allocation needed").is_none());
	assert_eq!(alloc.calls.load(Ordering::SeqCst), calls_before);
}

#[test]
fn cleared_is_empty_with_next_generation() {
	let factory = SnapshotFactory::<()>::default();
	let base = factory.empty();
	let one = factory.push_back(&base, noop_listener()).expect("heap alloc");
	let wiped = factory.cleared(&one);

	assert!(wiped.is_empty());
	assert_eq!(wiped.generation(), 2);
}

#[test]
fn quota_refusal_fails_atomically() {
	let factory = SnapshotFactory::new(Arc::new(QuotaAlloc::new(1)) as Arc<dyn ArrayAlloc<()>>);
	let base = factory.empty();
	let one = factory.push_back(&base, noop_listener()).expect("within quota");

	let err = factory
		.push_back(&one, noop_listener())
		.expect_err("quota exceeded");
	assert_eq!(err.requested, 2);
	// Prior snapshot is untouched by the refused copy.
	assert_eq!(one.len(), 1);
	assert_eq!(one.generation(), 1);
}

#[test]
fn view_registration_is_counted() {
	let snap = Snapshot::<()>::new(Box::default(), 0);
	assert_eq!(snap.view_count(), 0);

	snap.register_view();
	snap.register_view();
	assert_eq!(snap.view_count(), 2);

	snap.release_view();
	snap.release_view();
	assert_eq!(snap.view_count(), 0);
}

proptest! {
	/// Any push/remove sequence keeps generations advancing by exactly one
	/// per copy, never duplicates a listener, and matches a plain vector
	/// model of the registry.
	#[test]
	fn push_remove_sequences_match_model(ops in prop::collection::vec((any::<bool>(), 0usize..16), 1..32)) {
		let factory = SnapshotFactory::<()>::default();
		let mut snap = factory.empty();
		let mut model: Vec<Arc<Listener<()>>> = Vec::new();

		for (push, index) in ops {
			let prior_generation = snap.generation();
			if push || model.is_empty() {
				let listener = noop_listener();
				model.push(Arc::clone(&listener));
				snap = factory.push_back(&snap, listener).expect("heap alloc");
			} else {
				let victim = model.remove(index % model.len());
				snap = factory
					.remove(&snap, &victim)
					.expect("heap alloc")
					.expect("model tracked listener");
			}

			prop_assert_eq!(snap.generation(), prior_generation + 1);
			prop_assert_eq!(snap.len(), model.len());
			for (entry, expected) in snap.entries().iter().zip(&model) {
				prop_assert!(Arc::ptr_eq(entry, expected));
			}
			for (index, entry) in snap.entries().iter().enumerate() {
				let duplicated = snap.entries()[index + 1..]
					.iter()
					.any(|other| Arc::ptr_eq(other, entry));
				prop_assert!(!duplicated, "listener appears twice in one snapshot");
			}
		}
	}
}
