//! Loom-based concurrency tests for the slot buffer.
//!
//! Run with: `cargo test --features loom --test loom_tests --release`
//!
//! With the `loom` feature the buffer is built on loom's mutex, so these
//! models explore every interleaving of the real `produce`/`consume`/
//! termination code, not a copy of it.

#![cfg(feature = "loom")]

use loom::sync::Arc;
use loom::thread;
use slotring::{SlotBuffer, WorkerId};

/// One producer and one consumer racing on a three-slot buffer.
#[test]
fn loom_produce_consume_pair() {
    loom::model(|| {
        let buffer = Arc::new(SlotBuffer::new(3).unwrap());

        let b = Arc::clone(&buffer);
        let producer = thread::spawn(move || {
            let id = WorkerId::producer(0);
            (0..3).filter(|_| b.produce(id).unwrap().is_success()).count()
        });

        let b = Arc::clone(&buffer);
        let consumer = thread::spawn(move || {
            let id = WorkerId::consumer(0);
            (0..2).filter(|_| b.consume(id).unwrap().is_success()).count()
        });

        let produced = producer.join().unwrap();
        let consumed = consumer.join().unwrap();

        let snap = buffer.snapshot(WorkerId::monitor()).unwrap();
        assert!(snap.is_consistent(), "inconsistent: {snap}");
        assert!(produced >= 2, "the first two produces always find room");
        assert_eq!(produced - consumed, snap.occupied());
    });
}

/// Two producers contending for the same slot never both win it.
#[test]
fn loom_two_producers_one_slot() {
    loom::model(|| {
        let buffer = Arc::new(SlotBuffer::new(2).unwrap());

        let handles: Vec<_> = (0..2)
            .map(|i| {
                let b = Arc::clone(&buffer);
                thread::spawn(move || b.produce(WorkerId::producer(i)).unwrap().is_success())
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(wins, 1);
        let snap = buffer.snapshot(WorkerId::monitor()).unwrap();
        assert_eq!(snap.to_string(), "in 1 out 0 [1 0]");
    });
}

/// A polling worker always exits once termination is requested, and the
/// second request reports that the flag was already set.
#[test]
fn loom_terminate_is_observed() {
    loom::model(|| {
        let buffer = Arc::new(SlotBuffer::new(2).unwrap());

        let b = Arc::clone(&buffer);
        let worker = thread::spawn(move || {
            let id = WorkerId::consumer(0);
            let mut polls = 0;
            // yield_now lets loom schedule the trigger thread
            while !b.should_terminate(id).unwrap() {
                b.consume(id).unwrap();
                polls += 1;
                thread::yield_now();
            }
            polls
        });

        let b = Arc::clone(&buffer);
        let trigger = thread::spawn(move || {
            b.request_terminate();
            b.request_terminate()
        });

        let second = trigger.join().unwrap();
        assert!(!second);
        let _polls = worker.join().unwrap();
        assert!(buffer.should_terminate(WorkerId::controller()).unwrap());
    });
}
