use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use super::WaitCounter;

#[test]
fn load_store_increment() {
	let counter = WaitCounter::new(7);
	assert_eq!(counter.load(), 7);

	counter.store(42);
	assert_eq!(counter.load(), 42);

	assert_eq!(counter.increment(), 42);
	assert_eq!(counter.load(), 43);
}

#[test]
fn increment_wraps_at_width() {
	let counter = WaitCounter::new(u64::MAX);
	assert_eq!(counter.increment(), u64::MAX);
	assert_eq!(counter.load(), 0);
}

#[test]
fn wait_returns_immediately_on_stale_observation() {
	let counter = WaitCounter::new(0);
	counter.increment();
	// Observed value is already stale; must not block.
	counter.wait(0);
}

/// A waiter parked before the store still wakes: the notifier serializes
/// with the waiter's predicate check through the internal gate.
#[test]
fn waiter_wakes_on_change() {
	let counter = Arc::new(WaitCounter::new(0));
	let woke = Arc::new(AtomicBool::new(false));

	let handle = {
		let counter = Arc::clone(&counter);
		let woke = Arc::clone(&woke);
		thread::spawn(move || {
			counter.wait(0);
			woke.store(true, Ordering::SeqCst);
		})
	};

	// Give the waiter time to park.
	thread::sleep(Duration::from_millis(10));
	assert!(!woke.load(Ordering::SeqCst));

	counter.increment();
	counter.notify_all();

	handle.join().expect("waiter thread panicked");
	assert!(woke.load(Ordering::SeqCst));
}

#[test]
fn notify_after_store_is_not_missed() {
	let counter = Arc::new(WaitCounter::new(0));

	let waiters: Vec<_> = (0..4)
		.map(|_| {
			let counter = Arc::clone(&counter);
			thread::spawn(move || {
				let start = Instant::now();
				counter.wait(0);
				start.elapsed()
			})
		})
		.collect();

	thread::sleep(Duration::from_millis(5));
	counter.store(1);
	counter.notify_all();

	for waiter in waiters {
		// Bounded only by scheduling; a missed wake would hang the join.
		waiter.join().expect("waiter thread panicked");
	}
}
